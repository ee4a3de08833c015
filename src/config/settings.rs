use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audit::{DEFAULT_CAPACITY, DEFAULT_QUEUE_CAPACITY};
use crate::errors::{Result, VaultError};

/// Vault configuration, loaded from `<base_dir>/hostvault.toml`.
///
/// Every field has a sensible default so HostVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Identifier stamped on audit entries and export bundles.
    #[serde(default = "default_host_id")]
    pub host_id: String,

    /// Number of audit entries kept in memory.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,

    /// Depth of the queue feeding the durable audit mirror.
    #[serde(default = "default_audit_queue_capacity")]
    pub audit_queue_capacity: usize,

    /// Mirror audit entries to `secrets/audit.db`.
    #[serde(default = "default_audit_mirror")]
    pub audit_mirror: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_host_id() -> String {
    "local".to_string()
}

fn default_audit_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_audit_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_audit_mirror() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            host_id: default_host_id(),
            audit_capacity: default_audit_capacity(),
            audit_queue_capacity: default_audit_queue_capacity(),
            audit_mirror: default_audit_mirror(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the base directory.
    pub const FILE_NAME: &'static str = "hostvault.toml";

    /// Load settings from `<base_dir>/hostvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let config_path = base_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the vault cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host_id.trim().is_empty() {
            return Err(VaultError::ConfigError("host_id cannot be empty".into()));
        }
        if self.audit_capacity == 0 {
            return Err(VaultError::ConfigError(
                "audit_capacity must be at least 1".into(),
            ));
        }
        if self.audit_queue_capacity == 0 {
            return Err(VaultError::ConfigError(
                "audit_queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
