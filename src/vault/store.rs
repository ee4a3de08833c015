//! The secret catalog: high-level vault operations.
//!
//! `SecretVault` wraps the on-disk format, the host key and the crypto
//! layer so the rest of the platform can work with simple method calls
//! like `vault.read("GITHUB_APP_ID", "identity-provider")`.
//!
//! Every secret is envelope-encrypted: a fresh random DEK encrypts the
//! value and is itself wrapped under the host master key.  Rotation swaps
//! the DEK and leaves the value untouched.
//!
//! All catalog state sits behind one `RwLock`.  Reads share it; writes
//! hold it across the file write and the in-memory swap, so a reader
//! sees a record either entirely before or entirely after a rotation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::{Zeroize, Zeroizing};

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::config::Settings;
use crate::crypto::{decrypt, encrypt, generate_key, unwrap_key, wrap_key, HostMasterKey};
use crate::errors::{Result, VaultError};

use super::format;
use super::host_key::HostKeyManager;
use super::secret::{SecretMetadata, SecretRecord, SecretScope};

/// Longest accepted secret name, in bytes.
const MAX_NAME_LEN: usize = 256;

/// Cheap aggregate returned by `SecretVault::stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub secret_count: usize,
    pub host_id: String,
}

/// State that only exists once `init` has succeeded.
pub(super) struct Unlocked {
    pub(super) hmk: HostMasterKey,
    pub(super) audit: AuditLog,
}

/// The main vault handle.  Construct one per process with
/// `SecretVault::new` + `init` (or `SecretVault::open`) and share it by
/// reference.
pub struct SecretVault {
    base_dir: PathBuf,
    settings: Settings,
    unlocked: OnceLock<Unlocked>,
    init_lock: Mutex<()>,
    records: RwLock<HashMap<String, SecretRecord>>,
}

impl SecretVault {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a handle for the vault under `base_dir`.  Touches nothing
    /// on disk until `init` is called.
    pub fn new(base_dir: impl Into<PathBuf>, host_id: &str) -> Self {
        let settings = Settings {
            host_id: host_id.to_string(),
            ..Settings::default()
        };
        Self::with_settings(base_dir, settings)
    }

    /// Like `new`, with explicit settings (host id, audit sizing).
    pub fn with_settings(base_dir: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            base_dir: base_dir.into(),
            settings,
            unlocked: OnceLock::new(),
            init_lock: Mutex::new(()),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// `new` followed by `init`.
    pub fn open(base_dir: impl Into<PathBuf>, host_id: &str) -> Result<Self> {
        let vault = Self::new(base_dir, host_id);
        vault.init()?;
        Ok(vault)
    }

    /// Load (or on first use, generate) the host master key and load
    /// every persisted record.
    ///
    /// Idempotent.  Fails with `Initialization` if the key file or a
    /// record file exists but is unreadable; the vault then stays
    /// uninitialized rather than minting a second key.
    pub fn init(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_initialized() {
            return Ok(());
        }

        self.settings.validate()?;

        let (hmk, created) = HostKeyManager::new(&self.base_dir).load_or_create()?;
        let loaded = format::read_records(&self.base_dir)?;
        let count = loaded.len();

        {
            let mut records = self.write_guard();
            records.clear();
            records.extend(loaded.into_iter().map(|r| (r.name.clone(), r)));
        }

        let audit = self.build_audit_log();
        let _ = self.unlocked.set(Unlocked { hmk, audit });

        tracing::info!(
            base_dir = %self.base_dir.display(),
            host_id = %self.settings.host_id,
            secrets = count,
            new_host_key = created,
            "Vault initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.unlocked.get().is_some()
    }

    #[cfg(feature = "audit-log")]
    fn build_audit_log(&self) -> AuditLog {
        let s = &self.settings;
        if s.audit_mirror {
            let db_path = format::secrets_dir(&self.base_dir).join(crate::audit::sqlite::DB_FILE);
            AuditLog::with_mirror(&s.host_id, s.audit_capacity, &db_path, s.audit_queue_capacity)
        } else {
            AuditLog::in_memory(&s.host_id, s.audit_capacity)
        }
    }

    #[cfg(not(feature = "audit-log"))]
    fn build_audit_log(&self) -> AuditLog {
        AuditLog::in_memory(&self.settings.host_id, self.settings.audit_capacity)
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Add a secret, replacing any existing secret of the same name.
    ///
    /// A replaced secret is a brand-new record: new DEK, new timestamps.
    pub fn create(
        &self,
        name: &str,
        value: &str,
        scope: SecretScope,
        actor: &str,
    ) -> Result<SecretMetadata> {
        let unlocked = self.unlocked()?;
        validate_secret_name(name)?;

        let meta = {
            let mut records = self.write_guard();
            self.insert_locked(&mut records, &unlocked.hmk, name, value.as_bytes(), scope)?
        };

        unlocked.audit.record(actor, AuditAction::Create, Some(name), None);
        tracing::info!(secret = name, scope = %scope, actor, "Secret created");
        Ok(meta)
    }

    /// Decrypt and return a secret's value, or `None` if it does not
    /// exist.
    ///
    /// Every call is audited, misses included.  A stored record that
    /// fails to decrypt is an integrity failure and is returned as
    /// `DecryptionFailed`.
    pub fn read(&self, name: &str, actor: &str) -> Result<Option<String>> {
        let unlocked = self.unlocked()?;

        let result = {
            let records = self.read_guard();
            records
                .get(name)
                .map(|record| {
                    open_value(&unlocked.hmk, &record.wrapped_dek, &record.ciphertext)
                        .and_then(into_utf8)
                })
                .transpose()
        };

        let details = match &result {
            Ok(Some(_)) => None,
            Ok(None) => Some("miss"),
            Err(_) => Some("decryption failed"),
        };
        unlocked.audit.record(actor, AuditAction::Read, Some(name), details);

        match &result {
            Ok(found) => tracing::debug!(secret = name, actor, hit = found.is_some(), "Secret read"),
            Err(e) => tracing::error!(secret = name, error = %e, "Stored secret failed to decrypt"),
        }
        result
    }

    /// Metadata for every secret, in insertion order.
    pub fn list(&self) -> Result<Vec<SecretMetadata>> {
        self.unlocked()?;
        let records = self.read_guard();
        Ok(sorted_records(&records)
            .into_iter()
            .map(SecretRecord::metadata)
            .collect())
    }

    /// `list` restricted to one scope.
    pub fn list_scope(&self, scope: SecretScope) -> Result<Vec<SecretMetadata>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|m| m.scope == scope)
            .collect())
    }

    /// Remove a secret.  Returns `false` if it did not exist; only an
    /// actual deletion is audited.
    pub fn delete(&self, name: &str, actor: &str) -> Result<bool> {
        let unlocked = self.unlocked()?;

        let removed = {
            let mut records = self.write_guard();
            if records.contains_key(name) {
                format::remove_record(&self.base_dir, name)?;
                records.remove(name);
                true
            } else {
                false
            }
        };

        if removed {
            unlocked.audit.record(actor, AuditAction::Delete, Some(name), None);
            tracing::info!(secret = name, actor, "Secret deleted");
        }
        Ok(removed)
    }

    /// Re-encrypt a secret under a brand-new DEK.
    ///
    /// The value is unchanged and `rotated_at` never moves backwards.
    /// Returns `None` if the secret does not exist.
    pub fn rotate(&self, name: &str, actor: &str) -> Result<Option<SecretMetadata>> {
        let unlocked = self.unlocked()?;

        let meta = {
            let mut records = self.write_guard();
            let Some(current) = records.get(name) else {
                return Ok(None);
            };

            let plaintext = open_value(&unlocked.hmk, &current.wrapped_dek, &current.ciphertext)
                .map_err(|e| {
                    tracing::error!(secret = name, error = %e, "Cannot rotate: stored secret failed to decrypt");
                    e
                })?;
            let rotated_at = Utc::now().max(current.rotated_at);
            let record = seal(
                &unlocked.hmk,
                name,
                current.scope,
                current.seq,
                &plaintext,
                current.created_at,
                rotated_at,
            )?;

            // Disk first: if the write fails the old record stays valid.
            format::write_record(&self.base_dir, &record)?;
            let meta = record.metadata();
            records.insert(name.to_string(), record);
            meta
        };

        unlocked.audit.record(actor, AuditAction::Rotate, Some(name), None);
        tracing::info!(secret = name, actor, "Secret DEK rotated");
        Ok(Some(meta))
    }

    /// Secret count and host id.  No decryption.
    pub fn stats(&self) -> Result<VaultStats> {
        self.unlocked()?;
        Ok(VaultStats {
            secret_count: self.read_guard().len(),
            host_id: self.settings.host_id.clone(),
        })
    }

    /// Metadata-only existence check.
    pub fn contains(&self, name: &str) -> bool {
        self.read_guard().contains_key(name)
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Retained audit entries, oldest first.  Empty before `init`.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.unlocked
            .get()
            .map(|u| u.audit.entries())
            .unwrap_or_default()
    }

    /// The audit log itself (flush, failure counters, durable queries).
    pub fn audit(&self) -> Result<&AuditLog> {
        Ok(&self.unlocked()?.audit)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn host_id(&self) -> &str {
        &self.settings.host_id
    }

    /// Where this host's master key file lives.  Copying it out-of-band
    /// is what authorizes another host to import this host's bundles.
    pub fn host_key_path(&self) -> PathBuf {
        format::host_key_path(&self.base_dir)
    }

    // ------------------------------------------------------------------
    // Internals shared with portability
    // ------------------------------------------------------------------

    pub(super) fn unlocked(&self) -> Result<&Unlocked> {
        self.unlocked.get().ok_or(VaultError::NotInitialized)
    }

    pub(super) fn read_guard(&self) -> RwLockReadGuard<'_, HashMap<String, SecretRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<String, SecretRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seal `value` under a fresh DEK, persist it, and put it in the map.
    /// The caller holds the write lock.
    pub(super) fn insert_locked(
        &self,
        records: &mut HashMap<String, SecretRecord>,
        hmk: &HostMasterKey,
        name: &str,
        value: &[u8],
        scope: SecretScope,
    ) -> Result<SecretMetadata> {
        let now = Utc::now();
        let seq = records.values().map(|r| r.seq).max().map_or(1, |max| max + 1);
        let record = seal(hmk, name, scope, seq, value, now, now)?;
        format::write_record(&self.base_dir, &record)?;
        let meta = record.metadata();
        records.insert(name.to_string(), record);
        Ok(meta)
    }
}

/// Records in insertion order: by sequence number, then `created_at`,
/// then name (ties only arise between vault instances sharing a
/// directory).
pub(super) fn sorted_records(records: &HashMap<String, SecretRecord>) -> Vec<&SecretRecord> {
    let mut list: Vec<&SecretRecord> = records.values().collect();
    list.sort_by(|a, b| {
        a.seq
            .cmp(&b.seq)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.name.cmp(&b.name))
    });
    list
}

/// Encrypt `value` under a new DEK and wrap the DEK under `hmk`.
fn seal(
    hmk: &HostMasterKey,
    name: &str,
    scope: SecretScope,
    seq: u64,
    value: &[u8],
    created_at: DateTime<Utc>,
    rotated_at: DateTime<Utc>,
) -> Result<SecretRecord> {
    let dek = generate_key();
    let ciphertext = encrypt(dek.as_bytes(), value)?;
    let wrapped_dek = wrap_key(hmk, &dek)?;

    Ok(SecretRecord {
        name: name.to_string(),
        scope,
        seq,
        wrapped_dek,
        ciphertext,
        created_at,
        rotated_at,
    })
}

/// Unwrap the DEK with `hmk` and decrypt the value.
pub(super) fn open_value(
    hmk: &HostMasterKey,
    wrapped_dek: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let dek = unwrap_key(hmk, wrapped_dek)?;
    Ok(Zeroizing::new(decrypt(dek.as_bytes(), ciphertext)?))
}

/// Convert decrypted bytes to a `String` without copying them.
fn into_utf8(mut bytes: Zeroizing<Vec<u8>>) -> Result<String> {
    // from_utf8 takes ownership; on error, wipe the bytes it hands back.
    String::from_utf8(std::mem::take(&mut *bytes)).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        VaultError::SerializationError("secret value is not valid UTF-8".to_string())
    })
}

/// Validate that a secret name is safe to use as a file name.
///
/// Allowed: ASCII letters, digits, underscores, hyphens, periods.
/// Must be non-empty, at most 256 bytes, and must not start with a
/// period (hidden files are reserved for in-flight writes).
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VaultError::InvalidSecretName(
            "secret name cannot be empty".into(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(VaultError::InvalidSecretName(format!(
            "secret name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if name.starts_with('.') {
        return Err(VaultError::InvalidSecretName(format!(
            "secret name '{name}' cannot start with a period"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(VaultError::InvalidSecretName(format!(
            "secret name '{name}' contains invalid characters: only ASCII letters, digits, underscores, hyphens, and periods are allowed"
        )));
    }
    Ok(())
}
