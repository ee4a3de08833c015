//! CLI module: Clap argument parser, output helpers, and command implementations.
//!
//! The CLI is a thin local operator surface over `SecretVault`; every
//! command opens the vault, performs one operation and exits.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;
use crate::errors::{Result, VaultError};
use crate::vault::{SecretScope, SecretVault};

/// HostVault CLI: host-local encrypted secret vault.
#[derive(Parser)]
#[command(
    name = "hostvault",
    about = "Host-local encrypted secret vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault base directory (holds secrets/ and hostvault.toml)
    #[arg(
        long,
        env = "HOSTVAULT_BASE_DIR",
        default_value = ".hostvault",
        global = true
    )]
    pub base_dir: PathBuf,

    /// Host id stamped on audit entries and bundles (overrides hostvault.toml)
    #[arg(long, env = "HOSTVAULT_HOST_ID", global = true)]
    pub host_id: Option<String>,

    /// Name recorded as the actor in the audit log
    #[arg(long, env = "HOSTVAULT_ACTOR", default_value = "operator", global = true)]
    pub actor: String,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Initialize the vault (generates the host master key)
    Init,

    /// Create a secret (replaces an existing one of the same name)
    Set {
        /// Secret name (e.g. GITHUB_APP_ID)
        name: String,
        /// Secret value (omit to read from stdin or an interactive prompt)
        value: Option<String>,
        /// Scope: host, agent, or project
        #[arg(short, long, default_value = "host")]
        scope: SecretScope,
    },

    /// Print a secret's value
    Get {
        /// Secret name
        name: String,
    },

    /// List secrets (names and timestamps only)
    List {
        /// Only show secrets of this scope
        #[arg(short, long)]
        scope: Option<SecretScope>,
    },

    /// Delete a secret
    Delete {
        /// Secret name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Re-encrypt a secret under a new data key
    Rotate {
        /// Secret name
        name: String,
    },

    /// Write an encrypted export bundle
    Export {
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import an export bundle from another host
    Import {
        /// Path to the bundle JSON
        bundle: PathBuf,
        /// The exporting host's `host.key` file
        #[arg(long)]
        source_key: PathBuf,
    },

    /// View the durable audit log
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Show secret count and host id
    Stats,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve settings: `hostvault.toml` under the base dir, then CLI flags.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(&cli.base_dir)?;
    if let Some(host_id) = &cli.host_id {
        settings.host_id = host_id.clone();
    }
    settings.validate()?;
    Ok(settings)
}

/// Open the vault, creating the host key if this is the first use.
pub fn init_vault(cli: &Cli) -> Result<SecretVault> {
    let vault = SecretVault::with_settings(&cli.base_dir, load_settings(cli)?);
    vault.init()?;
    Ok(vault)
}

/// Open an existing vault.  Fails instead of minting a new host key
/// when `init` has never been run here.
pub fn open_vault(cli: &Cli) -> Result<SecretVault> {
    let vault = SecretVault::with_settings(&cli.base_dir, load_settings(cli)?);
    if !vault.host_key_path().exists() {
        output::tip("Run `hostvault init` to create a vault here.");
        return Err(VaultError::CommandFailed(format!(
            "no vault found at {}",
            cli.base_dir.display()
        )));
    }
    vault.init()?;
    Ok(vault)
}
