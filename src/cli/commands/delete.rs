//! `hostvault delete`: remove a secret from the vault.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, name: &str, force: bool) -> Result<()> {
    let vault = open_vault(cli)?;

    if !vault.contains(name) {
        return Err(VaultError::CommandFailed(format!(
            "secret '{name}' not found"
        )));
    }

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete secret '{name}'?"))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    if vault.delete(name, &cli.actor)? {
        output::success(&format!("Deleted secret '{name}'"));
    } else {
        output::warning(&format!("Secret '{name}' was already gone"));
    }

    Ok(())
}
