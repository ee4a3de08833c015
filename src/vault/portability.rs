//! Moving secrets between hosts without exposing plaintext.
//!
//! An `ExportBundle` carries each record's wrapped DEK and ciphertext
//! exactly as stored, still under the *exporting* host's master key.  To
//! import it, the destination must also be handed that host's key file
//! out-of-band; each value is then unwrapped, decrypted in memory, and
//! re-created locally under a fresh DEK wrapped by the local key.  After
//! the import the source key is no longer needed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::{base64_decode, base64_encode};
use super::secret::{SecretRecord, SecretScope};
use super::store::{open_value, sorted_records, validate_secret_name, SecretVault};
use crate::audit::AuditAction;
use crate::crypto::HostMasterKey;
use crate::errors::{Result, VaultError};

/// Current bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

/// A portable, fully encrypted snapshot of a vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportBundle {
    pub version: u32,
    /// Host whose master key wraps every `wrapped_dek` below.
    pub host_id: String,
    pub secrets: Vec<BundleEntry>,
}

/// One secret inside a bundle.  Same fields as the stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleEntry {
    pub name: String,
    pub scope: SecretScope,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub wrapped_dek: Vec<u8>,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub rotated_at: DateTime<Utc>,
}

impl From<&SecretRecord> for BundleEntry {
    fn from(record: &SecretRecord) -> Self {
        Self {
            name: record.name.clone(),
            scope: record.scope,
            wrapped_dek: record.wrapped_dek.clone(),
            ciphertext: record.ciphertext.clone(),
            created_at: record.created_at,
            rotated_at: record.rotated_at,
        }
    }
}

impl ExportBundle {
    /// Parse a bundle from JSON.  Missing or unknown fields are a
    /// `Validation` error.
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(json)
            .map_err(|e| VaultError::Validation(format!("malformed bundle: {e}")))?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::SerializationError(format!("bundle: {e}")))
    }

    /// Structural checks done before any decryption is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.version != BUNDLE_VERSION {
            return Err(VaultError::Validation(format!(
                "unsupported bundle version {}, expected {BUNDLE_VERSION}",
                self.version
            )));
        }
        if self.host_id.trim().is_empty() {
            return Err(VaultError::Validation("bundle host_id is empty".into()));
        }
        let mut seen = HashSet::new();
        for entry in &self.secrets {
            validate_secret_name(&entry.name)
                .map_err(|e| VaultError::Validation(e.to_string()))?;
            if !seen.insert(entry.name.as_str()) {
                return Err(VaultError::Validation(format!(
                    "secret '{}' appears more than once",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

impl SecretVault {
    /// Snapshot every secret into a bundle.  One audit entry for the
    /// whole export.
    pub fn export(&self, actor: &str) -> Result<ExportBundle> {
        let unlocked = self.unlocked()?;

        let secrets: Vec<BundleEntry> = {
            let records = self.read_guard();
            sorted_records(&records)
                .into_iter()
                .map(BundleEntry::from)
                .collect()
        };

        let details = format!("{} secrets", secrets.len());
        unlocked
            .audit
            .record(actor, AuditAction::Export, None, Some(&details));
        tracing::info!(actor, count = secrets.len(), "Vault exported");

        Ok(ExportBundle {
            version: BUNDLE_VERSION,
            host_id: self.host_id().to_string(),
            secrets,
        })
    }

    /// Re-create every secret in `bundle` locally.
    ///
    /// `source_hmk` must be the exporting host's master key.  Entries
    /// that do not decrypt under it are skipped and not counted; a
    /// structurally invalid bundle is rejected before anything is
    /// decrypted.  A local write failure stops the import; secrets
    /// already written stay, and the summary audit entry is still
    /// recorded.  Returns the number of secrets imported.
    pub fn import(
        &self,
        bundle: &ExportBundle,
        source_hmk: &HostMasterKey,
        actor: &str,
    ) -> Result<usize> {
        let unlocked = self.unlocked()?;
        bundle.validate()?;

        let mut imported = 0;
        let outcome = {
            let mut records = self.write_guard();
            bundle.secrets.iter().try_for_each(|entry| -> Result<()> {
                let plaintext = match open_value(source_hmk, &entry.wrapped_dek, &entry.ciphertext)
                {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        tracing::warn!(
                            secret = %entry.name,
                            source_host = %bundle.host_id,
                            error = %e,
                            "Skipping bundle entry that failed to decrypt"
                        );
                        return Ok(());
                    }
                };
                if std::str::from_utf8(&plaintext).is_err() {
                    tracing::warn!(
                        secret = %entry.name,
                        "Skipping bundle entry whose value is not UTF-8"
                    );
                    return Ok(());
                }

                self.insert_locked(
                    &mut records,
                    &unlocked.hmk,
                    &entry.name,
                    &plaintext,
                    entry.scope,
                )?;
                imported += 1;
                Ok(())
            })
        };

        // Whatever was written so far is on disk, so the summary entry is
        // recorded even when the import stops early.
        let summary = format!(
            "{imported} of {} imported from {}",
            bundle.secrets.len(),
            bundle.host_id
        );
        let details = match &outcome {
            Ok(()) => summary,
            Err(e) => format!("{summary}; aborted: {e}"),
        };
        unlocked
            .audit
            .record(actor, AuditAction::Import, None, Some(&details));

        if let Err(e) = outcome {
            tracing::error!(
                actor,
                source_host = %bundle.host_id,
                imported,
                error = %e,
                "Bundle import aborted"
            );
            return Err(e);
        }

        tracing::info!(
            actor,
            source_host = %bundle.host_id,
            imported,
            skipped = bundle.secrets.len() - imported,
            "Bundle imported"
        );

        Ok(imported)
    }
}
