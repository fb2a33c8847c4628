//! Cart and order commands.

use shopfloor_engine::config::EngineConfig;
use shopfloor_engine::gateway::CartOperation;

use super::{CliError, connect};

/// Dispatch a cart mutation through the gateway.
///
/// # Errors
///
/// Returns the gateway's error; nothing is committed on failure.
pub async fn mutate(
    config: &EngineConfig,
    operation: CartOperation,
    user: &str,
    product: Option<&str>,
) -> Result<(), CliError> {
    let engine = connect(config).await?;
    engine
        .gateway()
        .mutate_cart(operation, Some(user), product)
        .await?;
    tracing::info!(%operation, "Done");
    Ok(())
}

/// Print the cart total and lines as JSON.
///
/// # Errors
///
/// Returns an error for an unknown user.
pub async fn total(config: &EngineConfig, user: &str) -> Result<(), CliError> {
    let engine = connect(config).await?;
    let summary = engine.carts().compute_cart_total(user).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Print the order history as JSON.
///
/// # Errors
///
/// Returns an error for an unknown user.
pub async fn orders(config: &EngineConfig, user: &str) -> Result<(), CliError> {
    let engine = connect(config).await?;
    let orders = engine.carts().list_orders(user).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&orders)?);
    }
    Ok(())
}
