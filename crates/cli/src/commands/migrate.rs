//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! shopfloor migrate
//! ```
//!
//! Migrations live in `crates/engine/migrations/`.

use shopfloor_engine::config::EngineConfig;
use shopfloor_engine::db;

use super::CliError;

/// Apply pending engine migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or
/// a migration fails.
pub async fn run(config: &EngineConfig) -> Result<(), CliError> {
    let url = config.require_database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(url, config.max_connections).await?;

    tracing::info!("Running migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
