//! Address commands.
//!
//! # Usage
//!
//! ```bash
//! shopfloor address add -u <user> --house 4B --street "Park St" --city Kolkata --pincode 700016
//! shopfloor address edit -u <user> -s work \
//!     --house 1 --street "Ring Rd" --city Delhi --pincode 110001
//! shopfloor address count -u <user>
//! shopfloor address clear -u <user>
//! ```

use shopfloor_core::{AddressFields, AddressSlot};
use shopfloor_engine::config::EngineConfig;

use super::{CliError, connect};

/// Add an address, failing once the user holds the maximum.
///
/// # Errors
///
/// Returns `CoreError::QuotaExceeded` when both slots are taken.
pub async fn add(config: &EngineConfig, user: &str, fields: AddressFields) -> Result<(), CliError> {
    let engine = connect(config).await?;
    let slot = engine.addresses().try_add_address(user, fields).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Added {slot} address");
    }
    Ok(())
}

/// Replace the address in `slot`.
///
/// # Errors
///
/// Returns `CoreError::NotFound` when the slot is empty.
pub async fn edit(
    config: &EngineConfig,
    user: &str,
    slot: AddressSlot,
    fields: AddressFields,
) -> Result<(), CliError> {
    let engine = connect(config).await?;
    engine.addresses().edit_address(user, slot, fields).await?;
    tracing::info!(%slot, "Address updated");
    Ok(())
}

/// Remove every address.
///
/// # Errors
///
/// Returns an error for an unknown user.
pub async fn clear(config: &EngineConfig, user: &str) -> Result<(), CliError> {
    let engine = connect(config).await?;
    engine.addresses().clear_addresses(user).await?;
    tracing::info!("Addresses cleared");
    Ok(())
}

/// Print the address count.
///
/// # Errors
///
/// Returns an error for an unknown user.
pub async fn count(config: &EngineConfig, user: &str) -> Result<(), CliError> {
    let engine = connect(config).await?;
    let count = engine.addresses().address_count(user).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{count}");
    }
    Ok(())
}

/// Print the user's addresses as JSON.
///
/// # Errors
///
/// Returns an error for an unknown user.
pub async fn list(config: &EngineConfig, user: &str) -> Result<(), CliError> {
    let engine = connect(config).await?;
    let addresses = engine.addresses().list_addresses(user).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&addresses)?);
    }
    Ok(())
}
