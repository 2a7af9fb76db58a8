//! Webhook DTOs

use serde::{Deserialize, Serialize};

/// Query of a sender's endpoint verification request
#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub challenge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}
