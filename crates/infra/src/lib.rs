//! Infrastructure layer: Postgres storage, configuration, wiring.

pub mod config;
pub mod postgres;


use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use rbacload_rbac::{Keyring, PolicyLoader};

pub use config::{ConfigError, RbacConfig};
pub use postgres::PostgresRbacStore;

/// Policy loader over Postgres, as wired by [`connect`].
pub type PgPolicyLoader = PolicyLoader<PostgresRbacStore, Keyring>;

/// Open a connection pool from `config` and build a policy loader over it.
pub async fn connect(config: &RbacConfig) -> anyhow::Result<PgPolicyLoader> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to connect to RBAC storage")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("failed to connect to RBAC storage")?;

    tracing::info!(
        signing_keys = config.keyring.len(),
        strategy = %config.strategy,
        "rbac policy loader connected"
    );
    Ok(PolicyLoader::new(
        PostgresRbacStore::new(pool),
        config.keyring.clone(),
    ))
}
