//! `hostvault get`: retrieve and print a single secret's value.

use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `get` command.
pub fn execute(cli: &Cli, name: &str) -> Result<()> {
    let vault = open_vault(cli)?;

    // Decrypt and print the secret value to stdout.
    match vault.read(name, &cli.actor)? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => Err(VaultError::CommandFailed(format!(
            "secret '{name}' not found"
        ))),
    }
}
