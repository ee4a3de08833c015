//! `hostvault audit`: display the durable audit log.
//!
//! Usage:
//!   hostvault audit               # show last 50 entries
//!   hostvault audit --last 20     # show last 20
//!   hostvault audit --since 7d    # entries from last 7 days

use chrono::{TimeDelta, Utc};

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `audit` command.
#[cfg(feature = "audit-log")]
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let vault = open_vault(cli)?;

    let since_dt = match since {
        Some(s) => Some(parse_duration(s)?),
        None => None,
    };

    let entries = vault.audit()?.query_durable(last, since_dt)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    output::print_audit_table(&entries);

    Ok(())
}

/// Without the durable mirror there is no history beyond this process.
#[cfg(not(feature = "audit-log"))]
pub fn execute(cli: &Cli, _last: usize, since: Option<&str>) -> Result<()> {
    let _ = open_vault(cli)?;
    if let Some(s) = since {
        parse_duration(s)?;
    }
    Err(VaultError::AuditError(
        "built without the `audit-log` feature; no durable history".into(),
    ))
}

/// Parse a human-friendly duration string like "7d", "24h", "30m".
fn parse_duration(input: &str) -> Result<chrono::DateTime<Utc>> {
    let input = input.trim();

    let (num_str, unit) = if let Some(s) = input.strip_suffix('d') {
        (s, 'd')
    } else if let Some(s) = input.strip_suffix('h') {
        (s, 'h')
    } else if let Some(s) = input.strip_suffix('m') {
        (s, 'm')
    } else {
        return Err(VaultError::CommandFailed(format!(
            "invalid duration '{input}': use format like 7d, 24h, or 30m"
        )));
    };

    let num: i64 = num_str.parse().map_err(|_| {
        VaultError::CommandFailed(format!(
            "invalid duration '{input}': number part is not valid"
        ))
    })?;

    let duration = match unit {
        'd' => TimeDelta::try_days(num),
        'h' => TimeDelta::try_hours(num),
        _ => TimeDelta::try_minutes(num),
    };

    duration
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .ok_or_else(|| VaultError::CommandFailed(format!("duration '{input}' is out of range")))
}
