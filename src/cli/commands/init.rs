//! `hostvault init`: create the vault directory and host master key.

use crate::cli::output;
use crate::cli::{init_vault, Cli};
use crate::errors::Result;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let existed = crate::vault::format::host_key_path(&cli.base_dir).exists();

    let vault = init_vault(cli)?;
    let stats = vault.stats()?;

    if existed {
        output::info(&format!(
            "Vault already initialized at {} ({} secrets)",
            vault.base_dir().display(),
            stats.secret_count
        ));
        return Ok(());
    }

    output::success(&format!(
        "Vault created for host '{}' at {}",
        stats.host_id,
        vault.base_dir().display()
    ));
    output::warning(&format!(
        "Back up {}: without it no secret in this vault can be decrypted.",
        vault.host_key_path().display()
    ));
    output::tip("Run `hostvault set <NAME>` to add a secret.");
    output::tip("Run `hostvault list` to see all secrets.");

    Ok(())
}
