//! On-disk layout of the vault and atomic file writes.
//!
//! ```text
//! <base_dir>/secrets/
//! ├── host.key            # base64 host master key (0600)
//! ├── audit.db            # durable audit mirror (feature `audit-log`)
//! └── records/
//!     ├── API_KEY.json    # one SecretRecord per file
//!     └── ...
//! ```
//!
//! Each record file is a standalone JSON document, so writing one secret
//! never rewrites another and a reload is a plain directory scan.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

use super::secret::SecretRecord;
use crate::errors::{Result, VaultError};

/// Directory (under `base_dir`) that holds every vault file.
pub const SECRETS_DIR: &str = "secrets";

/// Host master key file name.
pub const HOST_KEY_FILE: &str = "host.key";

/// Sub-directory holding one JSON file per secret.
pub const RECORDS_DIR: &str = "records";

/// Extension of record files.
const RECORD_EXT: &str = "json";

/// `<base_dir>/secrets`
pub fn secrets_dir(base_dir: &Path) -> PathBuf {
    base_dir.join(SECRETS_DIR)
}

/// `<base_dir>/secrets/host.key`
pub fn host_key_path(base_dir: &Path) -> PathBuf {
    secrets_dir(base_dir).join(HOST_KEY_FILE)
}

/// `<base_dir>/secrets/records`
pub fn records_dir(base_dir: &Path) -> PathBuf {
    secrets_dir(base_dir).join(RECORDS_DIR)
}

/// `<base_dir>/secrets/records/<name>.json`
pub fn record_path(base_dir: &Path, name: &str) -> PathBuf {
    records_dir(base_dir).join(format!("{name}.{RECORD_EXT}"))
}

/// Write `bytes` to `path` **atomically**.
///
/// Writes to a temp file in the same directory, then renames it over
/// the target.  The rename ensures readers never see a half-written
/// file, and a crash leaves either the old or the new content.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = write_temp_sibling(path, bytes)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        VaultError::from(e)
    })
}

/// Write `bytes` to `path` only if nothing is there yet.
///
/// The content is staged in a temp file and hard-linked into place, so
/// the target appears complete or not at all.  Returns `false`, leaving
/// the existing file alone, when another writer got there first.
pub fn create_new(path: &Path, bytes: &[u8]) -> Result<bool> {
    let tmp_path = write_temp_sibling(path, bytes)?;
    let linked = fs::hard_link(&tmp_path, path);
    let _ = fs::remove_file(&tmp_path);

    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Stage `bytes` in an owner-only hidden file next to `path`.
///
/// The name is unique per process and call, so concurrent writers
/// (threads or other vault instances) never share a temp file.
fn write_temp_sibling(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let tmp_path = parent.join(format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = fs::write(&tmp_path, bytes)
        .map_err(VaultError::from)
        .and_then(|()| restrict_permissions(&tmp_path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(tmp_path)
}

/// On Unix, restrict a file to owner-only read/write.
pub fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Serialize and atomically persist one record.
pub fn write_record(base_dir: &Path, record: &SecretRecord) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(record)
        .map_err(|e| VaultError::SerializationError(format!("record '{}': {e}", record.name)))?;
    atomic_write(&record_path(base_dir, &record.name), &bytes)
}

/// Remove a record file.  Returns `false` if it was not there.
pub fn remove_record(base_dir: &Path, name: &str) -> Result<bool> {
    match fs::remove_file(record_path(base_dir, name)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Read every record file under `<base_dir>/secrets/records`.
///
/// A missing directory is an empty vault.  Temp files left behind by an
/// interrupted write are ignored.  A record that does not parse is an
/// error: silently dropping it would hide data loss.
pub fn read_records(base_dir: &Path) -> Result<Vec<SecretRecord>> {
    let dir = records_dir(base_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();

        let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXT)
            && !path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if !is_record {
            continue;
        }

        let data = fs::read(&path)?;
        let record: SecretRecord = serde_json::from_slice(&data).map_err(|e| {
            VaultError::Initialization(format!("corrupt record {}: {e}", path.display()))
        })?;
        records.push(record);
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
