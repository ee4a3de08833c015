//! GitHub App credentials, as read by the platform's GitHub identity
//! provider.
//!
//! The provider keeps three secrets in the vault: the App's PEM private
//! key, its App ID and the Installation ID.  It signs a short-lived JWT
//! with the key and exchanges it for an installation token; that part
//! lives outside this crate.  The PEM must come back byte-for-byte, so
//! nothing here trims or re-encodes values.

use std::fmt;

use crate::errors::{Result, VaultError};
use crate::vault::{SecretScope, SecretVault};

/// Vault name of the App's PEM-encoded private key.
pub const PRIVATE_KEY_SECRET: &str = "GITHUB_APP_PRIVATE_KEY";

/// Vault name of the numeric App ID.
pub const APP_ID_SECRET: &str = "GITHUB_APP_ID";

/// Vault name of the numeric Installation ID.
pub const INSTALLATION_ID_SECRET: &str = "GITHUB_APP_INSTALLATION_ID";

/// Everything needed to mint an installation token.
#[derive(Clone, PartialEq, Eq)]
pub struct GithubAppCredentials {
    pub app_id: u64,
    pub installation_id: u64,
    pub private_key_pem: String,
}

impl GithubAppCredentials {
    /// Read the three secrets.  `None` if any of them is not configured.
    pub fn load(vault: &SecretVault, actor: &str) -> Result<Option<Self>> {
        let Some(private_key_pem) = vault.read(PRIVATE_KEY_SECRET, actor)? else {
            return Ok(None);
        };
        let Some(app_id) = vault.read(APP_ID_SECRET, actor)? else {
            return Ok(None);
        };
        let Some(installation_id) = vault.read(INSTALLATION_ID_SECRET, actor)? else {
            return Ok(None);
        };

        Ok(Some(Self {
            app_id: parse_id(APP_ID_SECRET, &app_id)?,
            installation_id: parse_id(INSTALLATION_ID_SECRET, &installation_id)?,
            private_key_pem,
        }))
    }

    /// Store all three secrets at host scope.
    pub fn store(&self, vault: &SecretVault, actor: &str) -> Result<()> {
        vault.create(PRIVATE_KEY_SECRET, &self.private_key_pem, SecretScope::Host, actor)?;
        vault.create(APP_ID_SECRET, &self.app_id.to_string(), SecretScope::Host, actor)?;
        vault.create(
            INSTALLATION_ID_SECRET,
            &self.installation_id.to_string(),
            SecretScope::Host,
            actor,
        )?;
        Ok(())
    }
}

fn parse_id(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        VaultError::SerializationError(format!("secret '{name}' is not a numeric id"))
    })
}

impl fmt::Debug for GithubAppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubAppCredentials")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key_pem", &"[REDACTED]")
            .finish()
    }
}
