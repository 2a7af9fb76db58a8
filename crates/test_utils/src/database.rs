//! Disposable PostgreSQL for adapter tests
//!
//! Each [`TestDatabase`] owns its own container with the claims schema
//! applied. Tests using it need a Docker daemon and are marked `#[ignore]`.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const IMAGE: (&str, &str) = ("postgres", "16-alpine");
const USER: &str = "claims";
const PASSWORD: &str = "claims";
const DATABASE: &str = "claims_test";

const SCHEMA: &str = include_str!("../../../migrations/20240601000001_claims_webhooks.sql");

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A running container and a pool connected to it
///
/// The container stops when this is dropped.
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pool: PgPool,
}

impl TestDatabase {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Starts a fresh container and applies the migrations
pub async fn create_isolated_test_database() -> Result<TestDatabase, BoxError> {
    let container = GenericImage::new(IMAGE.0, IMAGE.1)
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
        .with_env_var("POSTGRES_USER", USER)
        .with_env_var("POSTGRES_PASSWORD", PASSWORD)
        .with_env_var("POSTGRES_DB", DATABASE)
        .start()
        .await?;

    let host = container.get_host().await?.to_string();
    let port = container.get_host_port_ipv4(5432).await?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&connection_url(&host, port))
        .await?;
    sqlx::raw_sql(SCHEMA).execute(&pool).await?;

    Ok(TestDatabase { _container: container, pool })
}

fn connection_url(host: &str, port: u16) -> String {
    format!("postgres://{USER}:{PASSWORD}@{host}:{port}/{DATABASE}")
}
