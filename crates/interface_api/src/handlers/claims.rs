//! Claims read handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;

use core_kernel::ClaimId;

use crate::auth::{permissions, require, SessionClaims};
use crate::dto::claims::*;
use crate::{error::ApiError, AppState};

fn authorize(session: &SessionClaims, permission: &str) -> Result<(), ApiError> {
    require(session, permission).map_err(|_| ApiError::Unauthorized)
}

fn claim_id(raw: &str) -> Result<ClaimId, ApiError> {
    ClaimId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Gets a claim by ID
pub async fn get_claim(
    State(state): State<AppState>,
    Extension(session): Extension<SessionClaims>,
    Path(id): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    authorize(&session, permissions::CLAIM_READ)?;
    let id = claim_id(&id)?;

    let claim = state
        .service
        .claim(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Claim {} not found", id)))?;

    Ok(Json(claim.into()))
}

/// Committed audit entries of a claim, oldest first
pub async fn get_audit_trail(
    State(state): State<AppState>,
    Extension(session): Extension<SessionClaims>,
    Path(id): Path<String>,
) -> Result<Json<AuditTrailResponse>, ApiError> {
    authorize(&session, permissions::AUDIT_READ)?;
    let id = claim_id(&id)?;

    let entries = state.service.audit_trail(&id).await?;
    Ok(Json(AuditTrailResponse {
        claim_id: id.to_string(),
        entries,
    }))
}

/// Display timeline of a claim
pub async fn get_timeline(
    State(state): State<AppState>,
    Extension(session): Extension<SessionClaims>,
    Path(id): Path<String>,
) -> Result<Json<TimelineResponse>, ApiError> {
    authorize(&session, permissions::CLAIM_READ)?;
    let id = claim_id(&id)?;

    let items = state.service.timeline(&id, Utc::now()).await?;
    Ok(Json(TimelineResponse {
        claim_id: id.to_string(),
        items,
    }))
}
