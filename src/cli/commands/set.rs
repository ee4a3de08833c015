//! `hostvault set`: create (or replace) a secret.

use std::io::{self, IsTerminal, Read};

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::SecretScope;

/// Execute the `set` command.
pub fn execute(cli: &Cli, name: &str, value: Option<&str>, scope: SecretScope) -> Result<()> {
    let vault = open_vault(cli)?;

    // Determine the secret value from one of three sources.
    let secret_value = if let Some(v) = value {
        // Source 1: Inline value on the command line.
        output::warning("Value provided on command line: it may appear in shell history.");
        v.to_string()
    } else if !io::stdin().is_terminal() {
        // Source 2: Piped input.  Only the final line break is dropped,
        // so multi-line values such as PEM keys keep their shape.
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        strip_final_newline(buf)
    } else {
        // Source 3: Interactive secure prompt (default).
        dialoguer::Password::new()
            .with_prompt(format!("Enter value for {name}"))
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("input prompt: {e}")))?
    };

    let existed = vault.contains(name);
    let meta = vault.create(name, &secret_value, scope, &cli.actor)?;
    let total = vault.stats()?.secret_count;

    let verb = if existed { "replaced" } else { "added" };
    output::success(&format!(
        "Secret '{}' {verb} ({} scope, {total} total)",
        meta.name, meta.scope
    ));

    Ok(())
}

fn strip_final_newline(mut s: String) -> String {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
    s
}
