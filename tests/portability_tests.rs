//! Integration tests for export bundles and cross-host import.

use std::fs;

use hostvault::audit::AuditAction;
use hostvault::crypto::HostMasterKey;
use hostvault::vault::{format, load_key_file};
use hostvault::{ExportBundle, SecretScope, SecretVault, VaultError};
use tempfile::TempDir;

fn new_vault(host_id: &str) -> (TempDir, SecretVault) {
    let dir = TempDir::new().expect("create temp dir");
    let vault = SecretVault::open(dir.path(), host_id).expect("open vault");
    (dir, vault)
}

/// A source vault holding a few secrets of different scopes.
fn populated_source() -> (TempDir, SecretVault) {
    let (dir, vault) = new_vault("host-a");
    vault.create("API_KEY", "sk-test-12345", SecretScope::Host, "t").unwrap();
    vault.create("AGENT_TOKEN", "agent-xyz", SecretScope::Agent, "t").unwrap();
    vault
        .create("DB_URL", "postgres://u:p@db/app", SecretScope::Project, "t")
        .unwrap();
    (dir, vault)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn export_carries_host_id_and_every_secret() {
    let (_dir, src) = populated_source();
    let bundle = src.export("alice").unwrap();

    assert_eq!(bundle.version, hostvault::vault::BUNDLE_VERSION);
    assert_eq!(bundle.host_id, "host-a");
    let names: Vec<&str> = bundle.secrets.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["API_KEY", "AGENT_TOKEN", "DB_URL"]);
}

#[test]
fn exported_json_contains_no_plaintext() {
    let (_dir, src) = populated_source();
    let json = src.export("t").unwrap().to_json().unwrap();

    for secret in ["sk-test-12345", "agent-xyz", "postgres://u:p@db/app"] {
        assert!(!json.contains(secret), "bundle leaked {secret}");
    }
}

#[test]
fn export_of_empty_vault_is_valid() {
    let (_dir, src) = new_vault("empty-host");
    let bundle = src.export("t").unwrap();
    assert!(bundle.secrets.is_empty());
    assert!(ExportBundle::from_json(&bundle.to_json().unwrap()).is_ok());
}

#[test]
fn export_is_audited_once() {
    let (_dir, src) = populated_source();
    src.export("alice").unwrap();

    let exports: Vec<_> = src
        .audit_log()
        .into_iter()
        .filter(|e| e.action == AuditAction::Export)
        .collect();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].actor, "alice");
    assert_eq!(exports[0].secret_name, None);
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[test]
fn cross_host_import_restores_plaintext() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");

    // Bundle and source key travel as files, as they would between hosts.
    let json = src.export("t").unwrap().to_json().unwrap();
    let bundle = ExportBundle::from_json(&json).unwrap();
    let source_key = load_key_file(&src.host_key_path()).unwrap();

    assert_eq!(dst.import(&bundle, &source_key, "bob").unwrap(), 3);
    assert_eq!(
        dst.read("API_KEY", "t").unwrap().as_deref(),
        Some("sk-test-12345")
    );
    assert_eq!(dst.read("AGENT_TOKEN", "t").unwrap().as_deref(), Some("agent-xyz"));
    assert_eq!(
        dst.read("DB_URL", "t").unwrap().as_deref(),
        Some("postgres://u:p@db/app")
    );

    let scopes: Vec<SecretScope> = dst.list().unwrap().into_iter().map(|m| m.scope).collect();
    assert_eq!(
        scopes,
        vec![SecretScope::Host, SecretScope::Agent, SecretScope::Project]
    );
}

#[test]
fn imported_secrets_are_rewrapped_under_local_key() {
    let (src_dir, src) = populated_source();
    let (dst_dir, dst) = new_vault("host-b");
    let source_key = load_key_file(&src.host_key_path()).unwrap();
    dst.import(&src.export("t").unwrap(), &source_key, "t").unwrap();

    // Destroy the source vault entirely; the destination must not care.
    drop(src);
    drop(src_dir);

    let reopened = SecretVault::open(dst_dir.path(), "host-b").unwrap();
    assert_eq!(
        reopened.read("API_KEY", "t").unwrap().as_deref(),
        Some("sk-test-12345")
    );
}

#[test]
fn import_with_wrong_source_key_imports_nothing() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");

    let imported = dst
        .import(&src.export("t").unwrap(), &HostMasterKey::generate(), "t")
        .unwrap();
    assert_eq!(imported, 0);
    assert!(dst.list().unwrap().is_empty());
}

#[test]
fn tampered_entry_is_skipped_others_imported() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");
    let source_key = load_key_file(&src.host_key_path()).unwrap();

    let mut bundle = src.export("t").unwrap();
    let last = bundle.secrets[1].ciphertext.len() - 1;
    bundle.secrets[1].ciphertext[last] ^= 0x01;

    assert_eq!(dst.import(&bundle, &source_key, "t").unwrap(), 2);
    assert!(!dst.contains("AGENT_TOKEN"));
    assert!(dst.contains("API_KEY"));
    assert!(dst.contains("DB_URL"));
}

#[test]
fn import_overwrites_existing_local_secret() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");
    dst.create("API_KEY", "local-old", SecretScope::Agent, "t").unwrap();

    let source_key = load_key_file(&src.host_key_path()).unwrap();
    dst.import(&src.export("t").unwrap(), &source_key, "t").unwrap();

    assert_eq!(
        dst.read("API_KEY", "t").unwrap().as_deref(),
        Some("sk-test-12345")
    );
    assert_eq!(dst.stats().unwrap().secret_count, 3);
}

#[test]
fn import_audit_entry_names_destination_host() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");
    let source_key = load_key_file(&src.host_key_path()).unwrap();
    dst.import(&src.export("t").unwrap(), &source_key, "bob").unwrap();

    let imports: Vec<_> = dst
        .audit_log()
        .into_iter()
        .filter(|e| e.action == AuditAction::Import)
        .collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].host_id, "host-b");
    assert_eq!(imports[0].actor, "bob");
    assert!(imports[0].details.as_deref().unwrap().contains("host-a"));
}

#[test]
fn import_rejects_unsupported_version_before_decrypting() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");
    let source_key = load_key_file(&src.host_key_path()).unwrap();

    let mut bundle = src.export("t").unwrap();
    bundle.version = 99;

    assert!(matches!(
        dst.import(&bundle, &source_key, "t"),
        Err(VaultError::Validation(_))
    ));
    assert!(dst.list().unwrap().is_empty());
}

#[test]
fn import_rejects_bundle_with_unsafe_name() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");
    let source_key = load_key_file(&src.host_key_path()).unwrap();

    let mut bundle = src.export("t").unwrap();
    bundle.secrets[0].name = "../escape".into();

    assert!(matches!(
        dst.import(&bundle, &source_key, "t"),
        Err(VaultError::Validation(_))
    ));
    assert!(dst.list().unwrap().is_empty());
}

#[test]
fn failed_write_stops_import_but_is_still_audited() {
    let (_src_dir, src) = new_vault("host-a");
    src.create("A", "alpha", SecretScope::Host, "t").unwrap();
    src.create("B", "beta", SecretScope::Host, "t").unwrap();
    let source_key = load_key_file(&src.host_key_path()).unwrap();

    let (dst_dir, dst) = new_vault("host-b");
    // A directory where B's record file must be written.
    fs::create_dir_all(format::record_path(dst_dir.path(), "B")).unwrap();

    assert!(dst.import(&src.export("t").unwrap(), &source_key, "bob").is_err());
    assert!(dst.contains("A"));
    assert!(!dst.contains("B"));

    let imports: Vec<_> = dst
        .audit_log()
        .into_iter()
        .filter(|e| e.action == AuditAction::Import)
        .collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].actor, "bob");
    let details = imports[0].details.as_deref().unwrap();
    assert!(details.starts_with("1 of 2 imported"), "{details}");
    assert!(details.contains("aborted"), "{details}");
}

#[test]
fn import_rejects_duplicate_names() {
    let (_src_dir, src) = populated_source();
    let (_dst_dir, dst) = new_vault("host-b");
    let source_key = load_key_file(&src.host_key_path()).unwrap();

    let mut bundle = src.export("t").unwrap();
    let copy = bundle.secrets[0].clone();
    bundle.secrets.push(copy);

    assert!(matches!(
        dst.import(&bundle, &source_key, "t"),
        Err(VaultError::Validation(_))
    ));
    assert!(dst.list().unwrap().is_empty());
}

#[test]
fn import_into_uninitialized_vault_fails() {
    let (_src_dir, src) = populated_source();
    let dst_dir = TempDir::new().unwrap();
    let dst = SecretVault::new(dst_dir.path(), "host-b");
    let source_key = load_key_file(&src.host_key_path()).unwrap();

    assert!(matches!(
        dst.import(&src.export("t").unwrap(), &source_key, "t"),
        Err(VaultError::NotInitialized)
    ));
}
