//! Supervised background writer for the durable audit mirror.
//!
//! Entries are handed to a dedicated thread through a bounded channel, so
//! recording never waits on disk.  A full queue or a failed insert is
//! logged and counted; nothing is reported back to the vault operation
//! that produced the entry.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::sqlite::SqliteAuditStore;
use super::AuditEntry;

enum Message {
    Entry(AuditEntry),
    /// Acknowledged once every message queued before it is written.
    Flush(mpsc::Sender<()>),
}

pub struct AuditMirror {
    tx: Option<SyncSender<Message>>,
    handle: Option<JoinHandle<()>>,
    failures: Arc<AtomicU64>,
    db_path: PathBuf,
}

impl AuditMirror {
    /// Open the database and start the flush thread.
    ///
    /// Returns `None` if the database cannot be opened or the thread
    /// cannot be started; the caller then runs without a durable mirror.
    pub fn spawn(db_path: &Path, queue_capacity: usize) -> Option<Self> {
        let store = match SqliteAuditStore::open(db_path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(error = %e, "Audit mirror unavailable; keeping in-memory log only");
                return None;
            }
        };

        let (tx, rx) = mpsc::sync_channel::<Message>(queue_capacity);
        let failures = Arc::new(AtomicU64::new(0));
        let worker_failures = Arc::clone(&failures);

        let handle = thread::Builder::new()
            .name("hostvault-audit".into())
            .spawn(move || {
                for message in rx {
                    match message {
                        Message::Entry(entry) => {
                            if let Err(e) = store.insert(&entry) {
                                worker_failures.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(
                                    error = %e,
                                    action = entry.action.as_str(),
                                    "Failed to persist audit entry"
                                );
                            }
                        }
                        Message::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            });

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Could not start audit flush thread");
                return None;
            }
        };

        Some(Self {
            tx: Some(tx),
            handle: Some(handle),
            failures,
            db_path: db_path.to_path_buf(),
        })
    }

    /// Queue an entry without blocking.
    pub fn submit(&self, entry: AuditEntry) {
        let Some(tx) = &self.tx else { return };

        match tx.try_send(Message::Entry(entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Audit mirror queue full; entry kept in memory only");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Audit flush thread has stopped; entry kept in memory only");
            }
        }
    }

    /// Block until everything queued so far has been written.
    pub fn flush(&self) {
        let Some(tx) = &self.tx else { return };

        let (ack_tx, ack_rx) = mpsc::channel();
        if tx.send(Message::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Entries that were dropped or failed to persist.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl Drop for AuditMirror {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after the backlog.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
