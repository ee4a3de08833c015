//! Integration tests for the HostVault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Interactive prompts are hard to automate, so values are passed
//! inline or on stdin and deletes use `--force`.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Helper: get a Command pointing at the hostvault binary.
fn hostvault() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("hostvault").expect("binary should exist");
    cmd.env_remove("HOSTVAULT_BASE_DIR")
        .env_remove("HOSTVAULT_HOST_ID")
        .env_remove("HOSTVAULT_ACTOR")
        .env_remove("HOSTVAULT_LOG");
    cmd
}

/// Helper: a command already pointed at `dir`.
fn in_vault(dir: &TempDir) -> Command {
    let mut cmd = hostvault();
    cmd.arg("--base-dir").arg(dir.path());
    cmd
}

fn init(dir: &TempDir, host_id: &str) {
    in_vault(dir)
        .args(["--host-id", host_id, "init"])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// Help and version
// ---------------------------------------------------------------------------

#[test]
fn help_flag_shows_usage() {
    hostvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Host-local encrypted secret vault"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("rotate"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("audit"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn version_flag_shows_version() {
    hostvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hostvault"));
}

#[test]
fn no_args_shows_help() {
    hostvault()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

// ---------------------------------------------------------------------------
// Vault lifecycle
// ---------------------------------------------------------------------------

#[test]
fn init_creates_host_key() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "edge-1");

    tmp.child("secrets/host.key").assert(predicate::path::is_file());
}

#[test]
fn init_twice_keeps_the_same_key() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");
    let key = std::fs::read_to_string(tmp.child("secrets/host.key").path()).unwrap();

    in_vault(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
    let again = std::fs::read_to_string(tmp.child("secrets/host.key").path()).unwrap();
    assert_eq!(key, again);
}

#[test]
fn get_on_missing_vault_fails() {
    let tmp = TempDir::new().unwrap();

    in_vault(&tmp)
        .args(["get", "API_KEY"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no vault found"));

    // Must not have minted a key as a side effect.
    tmp.child("secrets/host.key").assert(predicate::path::missing());
}

#[test]
fn set_get_list_roundtrip() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");

    in_vault(&tmp)
        .args(["set", "API_KEY", "sk-test-12345", "--scope", "agent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("API_KEY"));

    in_vault(&tmp)
        .args(["--actor", "bob", "get", "API_KEY"])
        .assert()
        .success()
        .stdout("sk-test-12345\n");

    in_vault(&tmp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("API_KEY"))
        .stdout(predicate::str::contains("agent"))
        .stdout(predicate::str::contains("sk-test-12345").not());
}

#[test]
fn set_reads_value_from_stdin() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");

    in_vault(&tmp)
        .args(["set", "PEM"])
        .write_stdin("line one\nline two\n")
        .assert()
        .success();

    in_vault(&tmp)
        .args(["get", "PEM"])
        .assert()
        .success()
        .stdout("line one\nline two\n");
}

#[test]
fn get_missing_secret_fails() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");

    in_vault(&tmp)
        .args(["get", "NOPE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn set_rejects_invalid_name() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");

    in_vault(&tmp)
        .args(["set", "bad/name", "v"])
        .assert()
        .failure();
}

#[test]
fn rotate_then_get_returns_same_value() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");
    in_vault(&tmp).args(["set", "DB", "pw"]).assert().success();

    in_vault(&tmp)
        .args(["rotate", "DB"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rotated"));
    in_vault(&tmp).args(["get", "DB"]).assert().success().stdout("pw\n");
}

#[test]
fn delete_with_force_removes_secret() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");
    in_vault(&tmp).args(["set", "GONE", "x"]).assert().success();

    in_vault(&tmp)
        .args(["delete", "GONE", "--force"])
        .assert()
        .success();
    in_vault(&tmp).args(["get", "GONE"]).assert().failure();
    tmp.child("secrets/records/GONE.json")
        .assert(predicate::path::missing());
}

#[test]
fn stats_shows_host_and_count() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "edge-9");
    in_vault(&tmp).args(["set", "A", "1"]).assert().success();
    in_vault(&tmp).args(["set", "B", "2"]).assert().success();

    // The host id comes from the flag, not from anything stored.
    in_vault(&tmp)
        .args(["--host-id", "edge-9", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("edge-9"))
        .stdout(predicate::str::contains("secrets:         2"));
}

#[test]
fn config_file_sets_host_id() {
    let tmp = TempDir::new().unwrap();
    tmp.child("hostvault.toml")
        .write_str("host_id = \"from-toml\"\n")
        .unwrap();
    init(&tmp, "from-toml");

    in_vault(&tmp)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("from-toml"));
}

#[test]
fn bad_config_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    tmp.child("hostvault.toml")
        .write_str("unknown_key = 1\n")
        .unwrap();

    in_vault(&tmp).arg("init").assert().failure();
}

// ---------------------------------------------------------------------------
// Portability
// ---------------------------------------------------------------------------

#[test]
fn export_import_across_vaults() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    init(&src, "host-a");
    init(&dst, "host-b");

    in_vault(&src)
        .args(["set", "API_KEY", "sk-test-12345"])
        .assert()
        .success();

    let bundle = dst.child("bundle.json");
    in_vault(&src)
        .args(["export", "--output"])
        .arg(bundle.path())
        .assert()
        .success();
    let json = std::fs::read_to_string(bundle.path()).unwrap();
    assert!(json.contains("host-a"));
    assert!(!json.contains("sk-test-12345"));

    in_vault(&dst)
        .arg("import")
        .arg(bundle.path())
        .arg("--source-key")
        .arg(src.child("secrets/host.key").path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1"));

    in_vault(&dst)
        .args(["get", "API_KEY"])
        .assert()
        .success()
        .stdout("sk-test-12345\n");
}

#[test]
fn import_with_wrong_key_skips_everything() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    init(&src, "host-a");
    init(&dst, "host-b");
    in_vault(&src).args(["set", "K", "v"]).assert().success();

    let bundle = dst.child("bundle.json");
    in_vault(&src)
        .args(["export", "--output"])
        .arg(bundle.path())
        .assert()
        .success();

    // The destination's own key is not the one that wrapped the bundle.
    in_vault(&dst)
        .arg("import")
        .arg(bundle.path())
        .arg("--source-key")
        .arg(dst.child("secrets/host.key").path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 0"))
        .stderr(predicate::str::contains("skipped"));
}

#[test]
fn export_refuses_secrets_dir() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");

    in_vault(&tmp)
        .args(["export", "--output"])
        .arg(tmp.child("secrets/host.key").path())
        .assert()
        .failure();
    // Key untouched.
    in_vault(&tmp).arg("stats").assert().success();
}

#[test]
fn export_refuses_relative_paths_into_secrets_dir() {
    let tmp = TempDir::new().unwrap();
    let run = |args: &[&str]| {
        let mut cmd = hostvault();
        cmd.current_dir(tmp.path())
            .args(["--base-dir", ".hostvault"])
            .args(args);
        cmd
    };

    run(&["init"]).assert().success();
    run(&["set", "K", "v"]).assert().success();

    let absolute_key = tmp.path().join(".hostvault/secrets/host.key");
    for dest in [
        "./.hostvault/secrets/host.key",
        ".hostvault/./secrets/host.key",
        ".hostvault/secrets/records/../host.key",
        absolute_key.to_str().unwrap(),
    ] {
        run(&["export", "--output", dest])
            .assert()
            .failure()
            .stderr(predicate::str::contains("refusing to export"));
    }

    run(&["get", "K"]).assert().success().stdout("v\n");
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[test]
fn audit_shows_history_from_earlier_runs() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");
    in_vault(&tmp)
        .args(["--actor", "alice", "set", "A", "1"])
        .assert()
        .success();
    in_vault(&tmp)
        .args(["--actor", "bob", "get", "A"])
        .assert()
        .success();

    in_vault(&tmp)
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("bob"))
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("read"));
}

#[test]
fn audit_rejects_bad_duration() {
    let tmp = TempDir::new().unwrap();
    init(&tmp, "h");

    in_vault(&tmp)
        .args(["audit", "--since", "7x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid duration"));

    // Out of range must be an error, not a panic.
    in_vault(&tmp)
        .args(["audit", "--since", "99999999999999d"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("out of range"));
}
