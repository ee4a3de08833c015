//! `hostvault list`: display all secrets in a table.

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;
use crate::vault::SecretScope;

/// Execute the `list` command.
pub fn execute(cli: &Cli, scope: Option<SecretScope>) -> Result<()> {
    let vault = open_vault(cli)?;

    let secrets = match scope {
        Some(scope) => vault.list_scope(scope)?,
        None => vault.list()?,
    };

    output::info(&format!(
        "{}: {} secret(s)",
        vault.host_id(),
        secrets.len()
    ));

    output::print_secrets_table(&secrets);

    Ok(())
}
