//! Command implementations.

pub mod address;
pub mod cart;
pub mod migrate;
pub mod seed;
pub mod user;

use shopfloor_engine::config::{ConfigError, EngineConfig};
use shopfloor_engine::engine::ConnectError;
use shopfloor_engine::{CoreError, Engine, PgDocumentStore, StoreError};
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Seed file has {0} validation errors")]
    InvalidSeed(usize),

    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect to the configured database and wire an engine.
pub async fn connect(config: &EngineConfig) -> Result<Engine<PgDocumentStore>, CliError> {
    tracing::info!("Connecting to database...");
    Ok(Engine::connect(config).await?)
}
