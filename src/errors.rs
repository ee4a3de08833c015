use thiserror::Error;

/// All errors that can occur in HostVault.
///
/// There is no "not found" variant: a missing secret is reported as
/// `None` / `false` by the vault operations, never as an error.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Vault errors ---
    #[error("Vault initialization failed: {0}")]
    Initialization(String),

    #[error("Vault is not initialized: call init() first")]
    NotInitialized,

    #[error("Invalid secret name: {0}")]
    InvalidSecretName(String),

    #[error("Invalid bundle: {0}")]
    Validation(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Audit errors ---
    #[error("Audit error: {0}")]
    AuditError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Convenience type alias for HostVault results.
pub type Result<T> = std::result::Result<T, VaultError>;
