//! Secret record and metadata types stored inside a vault.
//!
//! A `SecretRecord` is the persisted unit: the wrapped DEK and the
//! value ciphertext, both as raw bytes that serialize to base64 strings
//! in JSON.  `SecretMetadata` is what leaves the vault: it has no field
//! that could carry key or value material.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-use the base64 serde helpers from format.rs (no duplication).
use super::format::{base64_decode, base64_encode};
use crate::errors::VaultError;

/// Who or what a secret belongs to.  Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretScope {
    Host,
    Agent,
    Project,
}

impl SecretScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Agent => "agent",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for SecretScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretScope {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "agent" => Ok(Self::Agent),
            "project" => Ok(Self::Project),
            other => Err(VaultError::CommandFailed(format!(
                "unknown scope '{other}': use host, agent, or project"
            ))),
        }
    }
}

/// A single envelope-encrypted secret as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretRecord {
    /// Unique, case-sensitive name (e.g. "GITHUB_APP_PRIVATE_KEY").
    pub name: String,

    pub scope: SecretScope,

    /// Insertion sequence.  `list` orders by it; rotation keeps it.
    #[serde(default)]
    pub seq: u64,

    /// The per-secret DEK, encrypted under the host master key.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub wrapped_dek: Vec<u8>,

    /// The value encrypted under the DEK (nonce + ciphertext + tag).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    pub created_at: DateTime<Utc>,

    /// Equal to `created_at` until the first rotation.
    pub rotated_at: DateTime<Utc>,
}

impl SecretRecord {
    pub fn metadata(&self) -> SecretMetadata {
        SecretMetadata {
            name: self.name.clone(),
            scope: self.scope,
            created_at: self.created_at,
            rotated_at: self.rotated_at,
        }
    }
}

/// Non-secret description of a secret.
///
/// Returned by `create`, `rotate` and `list` so callers can display
/// names and timestamps without touching any ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub name: String,
    pub scope: SecretScope,
    pub created_at: DateTime<Utc>,
    pub rotated_at: DateTime<Utc>,
}
