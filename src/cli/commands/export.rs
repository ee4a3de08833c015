//! `hostvault export`: write an encrypted export bundle.
//!
//! The bundle holds no plaintext; it can only be imported by a host that
//! is also given this host's `host.key`.

use std::path::{Component, Path, PathBuf};

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::format;

/// Execute the `export` command.
pub fn execute(cli: &Cli, output_path: Option<&Path>) -> Result<()> {
    let vault = open_vault(cli)?;

    let bundle = vault.export(&cli.actor)?;
    let content = bundle.to_json()?;

    match output_path {
        Some(dest) => {
            // Never overwrite the host key, a record or the audit db.
            if is_within(dest, &format::secrets_dir(vault.base_dir()))? {
                return Err(VaultError::CommandFailed(
                    "refusing to export into the vault's secrets directory".into(),
                ));
            }

            format::atomic_write(dest, content.as_bytes()).map_err(|e| {
                VaultError::CommandFailed(format!("failed to write export file: {e}"))
            })?;

            output::success(&format!(
                "Exported {} secrets from host '{}' to {}",
                bundle.secrets.len(),
                bundle.host_id,
                dest.display()
            ));
        }
        None => {
            // Write to stdout (no success message, just raw output).
            println!("{content}");
        }
    }

    Ok(())
}

/// Whether `path` would land inside `dir` once `.`/`..`, relative forms
/// and symlinked directories are resolved.  `path` itself need not exist.
fn is_within(path: &Path, dir: &Path) -> Result<bool> {
    let dir = resolve(dir)?;
    let path = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => resolve(parent)?.join(name),
        _ => resolve(path)?,
    };
    Ok(path.starts_with(&dir))
}

/// Absolute form of `path`: the longest existing prefix is canonicalized
/// and the remaining components are applied lexically.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    let mut base = loop {
        match existing.canonicalize() {
            Ok(canonical) => break canonical,
            Err(_) => {
                let Some(parent) = existing.parent() else {
                    break existing.to_path_buf();
                };
                match existing.components().next_back() {
                    Some(Component::Normal(name)) => rest.push(name.to_os_string()),
                    Some(Component::ParentDir) => rest.push("..".into()),
                    _ => {}
                }
                existing = parent;
            }
        }
    };

    for component in rest.iter().rev() {
        match Path::new(component).components().next() {
            Some(Component::ParentDir) => {
                base.pop();
            }
            Some(Component::CurDir) | None => {}
            Some(_) => base.push(component),
        }
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn detects_paths_inside_secrets_dir() {
        let tmp = TempDir::new().unwrap();
        let secrets = tmp.path().join("vault").join("secrets");
        fs::create_dir_all(secrets.join("records")).unwrap();

        assert!(is_within(&secrets.join("host.key"), &secrets).unwrap());
        assert!(is_within(&secrets.join("records").join("new.json"), &secrets).unwrap());
        assert!(is_within(&tmp.path().join("vault/./secrets/host.key"), &secrets).unwrap());
        assert!(is_within(&tmp.path().join("vault/x/../secrets/host.key"), &secrets).unwrap());
        assert!(is_within(&secrets.join("missing/../host.key"), &secrets).unwrap());
    }

    #[test]
    fn allows_paths_outside_secrets_dir() {
        let tmp = TempDir::new().unwrap();
        let secrets = tmp.path().join("vault").join("secrets");
        fs::create_dir_all(&secrets).unwrap();

        assert!(!is_within(&tmp.path().join("bundle.json"), &secrets).unwrap());
        assert!(!is_within(&tmp.path().join("vault/bundle.json"), &secrets).unwrap());
        assert!(!is_within(&secrets.join("../bundle.json"), &secrets).unwrap());
        assert!(!is_within(&tmp.path().join("vault/secrets-old/b.json"), &secrets).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_directories() {
        let tmp = TempDir::new().unwrap();
        let secrets = tmp.path().join("vault").join("secrets");
        fs::create_dir_all(&secrets).unwrap();
        let link = tmp.path().join("shortcut");
        std::os::unix::fs::symlink(&secrets, &link).unwrap();

        assert!(is_within(&link.join("host.key"), &secrets).unwrap());
    }
}
