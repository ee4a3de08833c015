//! `hostvault stats`: secret count and host id.

use crate::cli::{open_vault, Cli};
use crate::errors::Result;

/// Execute the `stats` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let vault = open_vault(cli)?;
    let stats = vault.stats()?;
    let audit = vault.audit()?;

    println!("host_id:         {}", stats.host_id);
    println!("secrets:         {}", stats.secret_count);
    println!(
        "audit mirror:    {}",
        if audit.is_mirrored() { "sqlite" } else { "memory only" }
    );

    Ok(())
}
