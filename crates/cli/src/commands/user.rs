//! User commands.

use shopfloor_engine::config::EngineConfig;

use super::{CliError, connect};

/// Create an empty user document and print its id.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn create(config: &EngineConfig) -> Result<(), CliError> {
    let engine = connect(config).await?;
    let id = engine.create_user().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{id}");
    }
    Ok(())
}
