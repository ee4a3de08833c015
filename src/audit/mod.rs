//! Audit log: record of every vault operation.
//!
//! Two tiers:
//! - a fixed-capacity in-memory ring holding the most recent entries
//!   (oldest evicted first), which is what `entries()` returns;
//! - a best-effort durable mirror in SQLite (feature `audit-log`),
//!   written by a background thread.
//!
//! Recording never fails: a mirror problem is logged and counted, and
//! the operation being audited has already succeeded by then.

#[cfg(feature = "audit-log")]
pub mod mirror;
#[cfg(feature = "audit-log")]
pub mod sqlite;

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::VaultError;
#[cfg(feature = "audit-log")]
use crate::errors::Result;

/// Default number of entries retained in memory.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default depth of the queue feeding the durable mirror.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// The vault operations that produce audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Read,
    Rotate,
    Delete,
    Export,
    Import,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Rotate => "rotate",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = VaultError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "rotate" => Ok(Self::Rotate),
            "delete" => Ok(Self::Delete),
            "export" => Ok(Self::Export),
            "import" => Ok(Self::Import),
            other => Err(VaultError::AuditError(format!("unknown action '{other}'"))),
        }
    }
}

/// A single audit log entry.  Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub host_id: String,
    pub actor: String,
    pub action: AuditAction,
    /// `None` for whole-vault actions (export, import).
    pub secret_name: Option<String>,
    pub details: Option<String>,
}

/// Bounded in-memory audit log with an optional durable mirror.
pub struct AuditLog {
    host_id: String,
    capacity: usize,
    ring: Mutex<VecDeque<AuditEntry>>,
    #[cfg(feature = "audit-log")]
    mirror: Option<mirror::AuditMirror>,
}

impl AuditLog {
    /// Ring only, no durable mirror.
    pub fn in_memory(host_id: &str, capacity: usize) -> Self {
        Self {
            host_id: host_id.to_string(),
            capacity: capacity.max(1),
            ring: Mutex::new(VecDeque::with_capacity(capacity.clamp(1, DEFAULT_CAPACITY))),
            #[cfg(feature = "audit-log")]
            mirror: None,
        }
    }

    /// Ring plus a SQLite mirror at `db_path`.
    ///
    /// Falls back to ring-only if the database cannot be opened.
    #[cfg(feature = "audit-log")]
    pub fn with_mirror(
        host_id: &str,
        capacity: usize,
        db_path: &std::path::Path,
        queue_capacity: usize,
    ) -> Self {
        let mut log = Self::in_memory(host_id, capacity);
        log.mirror = mirror::AuditMirror::spawn(db_path, queue_capacity);
        log
    }

    /// Append an entry tagged with this log's host id.
    pub fn record(
        &self,
        actor: &str,
        action: AuditAction,
        secret_name: Option<&str>,
        details: Option<&str>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            host_id: self.host_id.clone(),
            actor: actor.to_string(),
            action,
            secret_name: secret_name.map(str::to_string),
            details: details.map(str::to_string),
        };

        {
            let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
            while ring.len() >= self.capacity {
                ring.pop_front();
            }
            #[cfg(feature = "audit-log")]
            ring.push_back(entry.clone());
            #[cfg(not(feature = "audit-log"))]
            ring.push_back(entry);
        }

        #[cfg(feature = "audit-log")]
        if let Some(mirror) = &self.mirror {
            mirror.submit(entry);
        }
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a durable mirror is running.
    pub fn is_mirrored(&self) -> bool {
        #[cfg(feature = "audit-log")]
        return self.mirror.is_some();
        #[cfg(not(feature = "audit-log"))]
        return false;
    }

    /// Block until the durable mirror has caught up.  No-op without one.
    pub fn flush(&self) {
        #[cfg(feature = "audit-log")]
        if let Some(mirror) = &self.mirror {
            mirror.flush();
        }
    }

    /// Number of entries the durable mirror dropped or failed to write.
    pub fn mirror_failures(&self) -> u64 {
        #[cfg(feature = "audit-log")]
        return self.mirror.as_ref().map_or(0, mirror::AuditMirror::failures);
        #[cfg(not(feature = "audit-log"))]
        return 0;
    }

    /// Read the durable history, most recent first.
    ///
    /// Flushes pending entries first so the result includes everything
    /// recorded by this process.
    #[cfg(feature = "audit-log")]
    pub fn query_durable(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditEntry>> {
        let mirror = self
            .mirror
            .as_ref()
            .ok_or_else(|| VaultError::AuditError("durable audit log is not available".into()))?;
        mirror.flush();
        sqlite::SqliteAuditStore::open(mirror.db_path())?.query(limit, since)
    }
}
