//! Cryptographic primitives for HostVault.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Random key generation, the host master key type, and DEK
//!   wrapping under an HKDF-derived key (`keys`)
//!
//! Nothing here touches the filesystem or knows about secret names.

pub mod encryption;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, generate_key, ...};
pub use encryption::{decrypt, encrypt};
pub use keys::{generate_key, unwrap_key, wrap_key, HostMasterKey, SecretKey, KEY_LEN};
