//! SQLite-backed durable audit history.
//!
//! Stores every audit entry in `<base_dir>/secrets/audit.db`.  Only the
//! flush thread writes; the operator CLI opens a second connection to
//! read the history back.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;

use super::{AuditAction, AuditEntry};
use crate::errors::{Result, VaultError};

/// Audit database file name, next to the host key.
pub const DB_FILE: &str = "audit.db";

pub struct SqliteAuditStore {
    conn: Connection,
}

impl SqliteAuditStore {
    /// Open (or create) the audit database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| VaultError::AuditError(format!("open {}: {e}", path.display())))?;

        // Owner-only, like the key file.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                host_id     TEXT NOT NULL,
                actor       TEXT NOT NULL,
                action      TEXT NOT NULL,
                secret_name TEXT,
                details     TEXT
            );",
        )
        .map_err(|e| VaultError::AuditError(format!("create table: {e}")))?;

        Ok(Self { conn })
    }

    /// Append one entry.
    pub fn insert(&self, entry: &AuditEntry) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO audit_log (timestamp, host_id, actor, action, secret_name, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    entry.timestamp.to_rfc3339(),
                    entry.host_id,
                    entry.actor,
                    entry.action.as_str(),
                    entry.secret_name,
                    entry.details,
                ],
            )
            .map_err(|e| VaultError::AuditError(format!("insert: {e}")))?;
        Ok(())
    }

    /// Query recent entries, most recent first.
    ///
    /// - `limit`: maximum number of entries to return.
    /// - `since`: if provided, only return entries at or after this time.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let (sql, params): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match since {
            Some(ref ts) => (
                "SELECT timestamp, host_id, actor, action, secret_name, details
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
                vec![
                    Box::new(ts.to_rfc3339()) as Box<dyn rusqlite::types::ToSql>,
                    Box::new(limit_i64),
                ],
            ),
            None => (
                "SELECT timestamp, host_id, actor, action, secret_name, details
                 FROM audit_log
                 ORDER BY id DESC
                 LIMIT ?1",
                vec![Box::new(limit_i64) as Box<dyn rusqlite::types::ToSql>],
            ),
        };

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| VaultError::AuditError(format!("query prepare: {e}")))?;

        let params_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| &**p).collect();

        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let ts_str: String = row.get(0)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                    })?;
                let action_str: String = row.get(3)?;

                Ok((
                    timestamp,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    action_str,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(|e| VaultError::AuditError(format!("query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            let (timestamp, host_id, actor, action, secret_name, details) =
                row.map_err(|e| VaultError::AuditError(format!("row parse: {e}")))?;
            entries.push(AuditEntry {
                timestamp,
                host_id,
                actor,
                action: action.parse::<AuditAction>()?,
                secret_name,
                details,
            });
        }

        Ok(entries)
    }
}
