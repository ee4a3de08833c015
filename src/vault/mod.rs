//! Vault module: envelope-encrypted secret storage.
//!
//! This module provides:
//! - `SecretRecord`, `SecretMetadata` and `SecretScope` types (`secret`)
//! - On-disk layout and atomic writes (`format`)
//! - Host master key file management (`host_key`)
//! - The `SecretVault` catalog: create/read/list/delete/rotate (`store`)
//! - Export bundles and cross-host import (`portability`)

pub mod format;
pub mod host_key;
pub mod portability;
pub mod secret;
pub mod store;

// Re-export the most commonly used items.
pub use host_key::{load_key_file, HostKeyManager};
pub use portability::{BundleEntry, ExportBundle, BUNDLE_VERSION};
pub use secret::{SecretMetadata, SecretRecord, SecretScope};
pub use store::{validate_secret_name, SecretVault, VaultStats};
