//! `hostvault import`: import another host's export bundle.
//!
//! Needs the bundle and the exporting host's `host.key`.  Every secret is
//! re-encrypted under this host's key, so the source key is only needed
//! once.

use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::{load_key_file, ExportBundle};

/// Execute the `import` command.
pub fn execute(cli: &Cli, bundle_path: &Path, source_key: &Path) -> Result<()> {
    if !bundle_path.exists() {
        return Err(VaultError::CommandFailed(format!(
            "bundle file not found: {}",
            bundle_path.display()
        )));
    }

    let bundle = ExportBundle::from_json(&fs::read_to_string(bundle_path)?)?;
    let source_hmk = load_key_file(source_key)?;

    let vault = open_vault(cli)?;
    let imported = vault.import(&bundle, &source_hmk, &cli.actor)?;

    let skipped = bundle.secrets.len() - imported;
    if skipped > 0 {
        output::warning(&format!(
            "{skipped} secret(s) could not be decrypted with {} and were skipped",
            source_key.display()
        ));
    }

    output::success(&format!(
        "Imported {imported} secrets from host '{}'",
        bundle.host_id
    ));

    Ok(())
}
