//! Mutation journal
//!
//! Every tree mutation is journaled individually before it is applied, so
//! an interrupted sync leaves all already-applied mutations durable. The
//! durable implementation follows the redb pattern: one table, bincode
//! values, synchronous append (write txn + commit).

use crate::entry::TtlOptions;
use parking_lot::Mutex;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use treesync_common::{Error, Result};

const JOURNAL_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("journal");

/// One journaled tree mutation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    CreateFile {
        path: String,
        owner: String,
        group: String,
        mode: u16,
        block_size: u64,
        length: u64,
        ttl: Option<TtlOptions>,
        fingerprint: Option<String>,
    },
    CreateDirectory {
        path: String,
        owner: String,
        group: String,
        mode: u16,
        mount_point: bool,
        ttl: Option<TtlOptions>,
        fingerprint: Option<String>,
    },
    DeleteRecursive {
        path: String,
        /// Whether the delete was triggered by a metadata load (sync)
        metadata_load: bool,
    },
    SetAttributes {
        path: String,
        owner: Option<String>,
        group: Option<String>,
        mode: Option<u16>,
        fingerprint: Option<String>,
    },
    MarkChildrenLoaded {
        path: String,
    },
}

/// Sink for journaled mutations
pub trait Journal: Send + Sync {
    /// Durably record one mutation. Called before the mutation is applied.
    fn append(&self, entry: &JournalEntry) -> Result<()>;
}

/// In-memory journal for tests and embedders that persist elsewhere
#[derive(Default)]
pub struct MemJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all appended entries, in append order
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }
}

impl Journal for MemJournal {
    fn append(&self, entry: &JournalEntry) -> Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Durable journal backed by redb
pub struct RedbJournal {
    db: Database,
    next_seq: AtomicU64,
}

impl RedbJournal {
    /// Open (or create) the journal database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(|e| Error::journal(e.to_string()))?;

        // Create the table eagerly and recover the next sequence number
        let write_txn = db.begin_write().map_err(|e| Error::journal(e.to_string()))?;
        let next_seq = {
            let table = write_txn
                .open_table(JOURNAL_TABLE)
                .map_err(|e| Error::journal(e.to_string()))?;
            table
                .last()
                .map_err(|e| Error::journal(e.to_string()))?
                .map_or(0, |(key, _)| key.value() + 1)
        };
        write_txn
            .commit()
            .map_err(|e| Error::journal(e.to_string()))?;

        Ok(Self {
            db,
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Load all journaled entries in sequence order
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| Error::journal(e.to_string()))?;
        let table = read_txn
            .open_table(JOURNAL_TABLE)
            .map_err(|e| Error::journal(e.to_string()))?;
        let mut result = Vec::new();
        for item in table.iter().map_err(|e| Error::journal(e.to_string()))? {
            let (_, value) = item.map_err(|e| Error::journal(e.to_string()))?;
            let entry = bincode::deserialize(value.value())
                .map_err(|e| Error::journal(e.to_string()))?;
            result.push(entry);
        }
        Ok(result)
    }
}

impl Journal for RedbJournal {
    fn append(&self, entry: &JournalEntry) -> Result<()> {
        let bytes = bincode::serialize(entry).map_err(|e| Error::journal(e.to_string()))?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| Error::journal(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(JOURNAL_TABLE)
                .map_err(|e| Error::journal(e.to_string()))?;
            table
                .insert(seq, bytes.as_slice())
                .map_err(|e| Error::journal(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| Error::journal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_journal_order() {
        let journal = MemJournal::new();
        journal
            .append(&JournalEntry::DeleteRecursive {
                path: "/a".into(),
                metadata_load: true,
            })
            .unwrap();
        journal
            .append(&JournalEntry::MarkChildrenLoaded { path: "/".into() })
            .unwrap();
        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], JournalEntry::DeleteRecursive { .. }));
    }

    #[test]
    fn test_redb_journal_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.redb");

        let first = JournalEntry::CreateDirectory {
            path: "/a".into(),
            owner: "alice".into(),
            group: "staff".into(),
            mode: 0o755,
            mount_point: false,
            ttl: None,
            fingerprint: None,
        };
        {
            let journal = RedbJournal::open(&path).unwrap();
            journal.append(&first).unwrap();
        }

        // Reopen: sequence continues, entries survive
        let journal = RedbJournal::open(&path).unwrap();
        journal
            .append(&JournalEntry::MarkChildrenLoaded { path: "/".into() })
            .unwrap();
        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], first);
    }
}
