//! Key material: per-secret data keys, the host master key, and the
//! wrapping of one under the other.
//!
//! Every secret gets its own random **data encryption key** (DEK).  The
//! DEK encrypts the value; the DEK itself is encrypted ("wrapped") under
//! a key-wrapping key derived from the **host master key** (HMK):
//!
//! ```text
//! HMK ──HKDF("hostvault-dek-wrap:v1")──► KWK ──AES-GCM──► wrapped DEK
//!                                               DEK ──AES-GCM──► ciphertext
//! ```
//!
//! The derivation only depends on the HMK, so rotating a secret changes
//! its DEK and nothing else.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use super::encryption::{decrypt, encrypt};
use crate::errors::{Result, VaultError};

/// Length of every symmetric key handled by the vault (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF `info` for the DEK wrapping key.
const WRAP_INFO: &[u8] = b"hostvault-dek-wrap:v1";

/// A 32-byte symmetric key that zeroes its memory when dropped.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
}

impl SecretKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a key from a slice, rejecting anything that is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            VaultError::KeyDerivationFailed(format!(
                "key must be exactly {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::new(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Generate a fresh random 256-bit key.
pub fn generate_key() -> SecretKey {
    let mut bytes = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut bytes);
    let key = SecretKey::new(bytes);
    bytes.zeroize();
    key
}

/// The long-lived key of one host.  Wraps all per-secret DEKs.
///
/// Never printed, logged or serialized; the only encoding is the one
/// written to the host key file.
#[derive(Clone)]
pub struct HostMasterKey {
    key: SecretKey,
}

impl HostMasterKey {
    /// Generate a new random host master key.
    pub fn generate() -> Self {
        Self {
            key: generate_key(),
        }
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            key: SecretKey::new(bytes),
        }
    }

    /// Decode the base64 form stored in a `host.key` file.
    ///
    /// Surrounding whitespace (a trailing newline from an editor or
    /// `cp`) is ignored; anything that is not exactly 32 bytes is not.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(encoded.trim())
                .map_err(|e| VaultError::KeyDerivationFailed(format!("host key is not base64: {e}")))?,
        );
        Ok(Self {
            key: SecretKey::from_slice(&bytes)?,
        })
    }

    /// Base64 form for the host key file.
    pub(crate) fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(BASE64.encode(self.key.as_bytes()))
    }

    /// Derive the key that wraps DEKs under this HMK.
    fn wrapping_key(&self) -> Result<SecretKey> {
        let hk = Hkdf::<Sha256>::new(None, self.key.as_bytes());
        let mut okm = [0u8; KEY_LEN];
        hk.expand(WRAP_INFO, &mut okm)
            .map_err(|e| VaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;
        let key = SecretKey::new(okm);
        okm.zeroize();
        Ok(key)
    }
}

impl fmt::Debug for HostMasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostMasterKey(..)")
    }
}

/// Encrypt `dek` under `hmk`.
pub fn wrap_key(hmk: &HostMasterKey, dek: &SecretKey) -> Result<Vec<u8>> {
    let kwk = hmk.wrapping_key()?;
    encrypt(kwk.as_bytes(), dek.as_bytes())
}

/// Recover a DEK wrapped by `wrap_key`.
///
/// A wrong HMK or a tampered blob yields `DecryptionFailed`.
pub fn unwrap_key(hmk: &HostMasterKey, wrapped: &[u8]) -> Result<SecretKey> {
    let kwk = hmk.wrapping_key()?;
    let raw = Zeroizing::new(decrypt(kwk.as_bytes(), wrapped)?);
    SecretKey::from_slice(&raw).map_err(|_| VaultError::DecryptionFailed)
}
