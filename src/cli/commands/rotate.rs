//! `hostvault rotate`: re-encrypt a secret under a fresh data key.
//!
//! The value does not change; only the DEK and its wrapping do.

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `rotate` command.
pub fn execute(cli: &Cli, name: &str) -> Result<()> {
    let vault = open_vault(cli)?;

    let meta = vault
        .rotate(name, &cli.actor)?
        .ok_or_else(|| VaultError::CommandFailed(format!("secret '{name}' not found")))?;

    output::success(&format!(
        "Rotated data key for '{}' (rotated at {})",
        meta.name,
        meta.rotated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    Ok(())
}
