//! Host master key file management.
//!
//! The host master key (HMK) lives in `<base_dir>/secrets/host.key` as a
//! single base64 line, readable by the owner only.  It is generated on
//! the first `init` and loaded verbatim on every later one.
//!
//! A key file that exists but cannot be read or decoded is fatal: minting
//! a replacement would orphan every record wrapped under the original.

use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use super::format;
use crate::crypto::HostMasterKey;
use crate::errors::{Result, VaultError};

/// Loads or creates the HMK for one vault directory.
pub struct HostKeyManager {
    path: PathBuf,
}

impl HostKeyManager {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            path: format::host_key_path(base_dir),
        }
    }

    /// Path of the key file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the existing key, or generate and persist a new one.
    ///
    /// Returns the key and whether it was freshly created.
    pub fn load_or_create(&self) -> Result<(HostMasterKey, bool)> {
        if self.path.exists() {
            return self.load_existing();
        }

        let hmk = HostMasterKey::generate();
        let encoded = hmk.encode();
        let created = format::create_new(&self.path, encoded.as_bytes()).map_err(|e| {
            VaultError::Initialization(format!(
                "failed to write host key {}: {e}",
                self.path.display()
            ))
        })?;

        if !created {
            // Another instance minted the key between our check and our write.
            tracing::debug!(path = %self.path.display(), "Host key created concurrently; loading it");
            return self.load_existing();
        }

        tracing::info!(path = %self.path.display(), "Generated new host master key");
        Ok((hmk, true))
    }

    fn load_existing(&self) -> Result<(HostMasterKey, bool)> {
        load_key_file(&self.path)
            .map(|hmk| (hmk, false))
            .map_err(|e| VaultError::Initialization(e.to_string()))
    }
}

/// Read and decode a host key file.
///
/// Also used to load a *foreign* host's key (copied out-of-band) as the
/// proof of ownership when importing its export bundle.
pub fn load_key_file(path: &Path) -> Result<HostMasterKey> {
    let contents = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
        VaultError::KeyDerivationFailed(format!("cannot read host key {}: {e}", path.display()))
    })?);

    HostMasterKey::from_encoded(&contents).map_err(|e| {
        VaultError::KeyDerivationFailed(format!("malformed host key {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_then_reloads_same_key() {
        let dir = TempDir::new().unwrap();
        let manager = HostKeyManager::new(dir.path());

        let (first, created) = manager.load_or_create().unwrap();
        assert!(created);
        assert!(manager.path().exists());

        let (second, created) = manager.load_or_create().unwrap();
        assert!(!created);
        assert_eq!(first.encode().as_str(), second.encode().as_str());
    }

    #[test]
    fn malformed_key_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let manager = HostKeyManager::new(dir.path());
        fs::create_dir_all(manager.path().parent().unwrap()).unwrap();
        fs::write(manager.path(), "definitely-not-a-key").unwrap();

        assert!(matches!(
            manager.load_or_create(),
            Err(VaultError::Initialization(_))
        ));
        // The bad file must not have been replaced.
        assert_eq!(
            fs::read_to_string(manager.path()).unwrap(),
            "definitely-not-a-key"
        );
    }

    #[test]
    fn concurrent_first_use_agrees_on_one_key() {
        use std::sync::Barrier;
        use std::thread;

        for _ in 0..20 {
            let dir = TempDir::new().unwrap();
            let barrier = Barrier::new(4);

            let keys: Vec<(String, bool)> = thread::scope(|scope| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        scope.spawn(|| {
                            barrier.wait();
                            let (hmk, created) =
                                HostKeyManager::new(dir.path()).load_or_create().unwrap();
                            (hmk.encode().to_string(), created)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert!(keys.iter().all(|(k, _)| *k == keys[0].0));
            assert_eq!(keys.iter().filter(|(_, created)| *created).count(), 1);
            let on_disk = load_key_file(&format::host_key_path(dir.path())).unwrap();
            assert_eq!(on_disk.encode().as_str(), keys[0].0);
        }
    }

    #[test]
    fn load_key_file_fails_if_missing() {
        let dir = TempDir::new().unwrap();
        assert!(load_key_file(&dir.path().join("nope.key")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let manager = HostKeyManager::new(dir.path());
        manager.load_or_create().unwrap();

        let perms = fs::metadata(manager.path()).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
