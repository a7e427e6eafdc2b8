//! Append-only JSON-lines journal of committed transactions.
//!
//! Each committed transaction is written as exactly one newline-terminated
//! line, so a crash in the middle of a write can only leave an unterminated
//! final line. Replay cuts such a tail off the file (that transaction never
//! became visible) so later appends start on a fresh line, but refuses to load
//! a journal that is damaged anywhere else. A failed append is rolled back to
//! the previous file length the same way.

use std::collections::BTreeMap;
use std::fs::{create_dir_all, rename, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::model::{Counsellor, CounsellorId, Lead, LeadId};
use crate::core::{CapacityError, CapacityResult};
use crate::util::clock::now_ms;

/// One row-level change inside a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEntry {
    /// Insert or replace a counsellor row.
    PutCounsellor {
        /// Full row after the change.
        row: Counsellor,
    },
    /// Remove a counsellor row.
    DeleteCounsellor {
        /// Removed id.
        id: CounsellorId,
    },
    /// Insert or replace a lead row.
    PutLead {
        /// Full row after the change.
        row: Lead,
    },
    /// Remove a lead row.
    DeleteLead {
        /// Removed id.
        id: LeadId,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
    committed_at_ms: u128,
    entries: Vec<JournalEntry>,
}

/// Committed table contents rebuilt from a journal.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    /// Counsellor rows by id.
    pub counsellors: BTreeMap<CounsellorId, Counsellor>,
    /// Lead rows by id.
    pub leads: BTreeMap<LeadId, Lead>,
}

impl Tables {
    /// Apply one journal entry.
    pub fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::PutCounsellor { row } => {
                self.counsellors.insert(row.id, row);
            }
            JournalEntry::DeleteCounsellor { id } => {
                self.counsellors.remove(&id);
            }
            JournalEntry::PutLead { row } => {
                self.leads.insert(row.id, row);
            }
            JournalEntry::DeleteLead { id } => {
                self.leads.remove(&id);
            }
        }
    }
}

fn io_err(e: impl std::fmt::Display) -> CapacityError {
    CapacityError::Storage(e.to_string())
}

/// One serialized record plus its terminating newline.
fn encode(record: &JournalRecord) -> CapacityResult<Vec<u8>> {
    let mut buf = serde_json::to_vec(record).map_err(io_err)?;
    buf.push(b'\n');
    Ok(buf)
}

/// How replay left the end of the file.
enum Tail {
    /// Every line parsed and is terminated.
    Clean,
    /// The last record parsed but lacks its newline.
    Unterminated,
    /// Bytes after this offset are a torn write.
    Torn(u64),
}

/// File-backed journal stored as `<dir>/<stream>.jsonl`.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    stream: String,
}

impl Journal {
    /// Open (creating the directory if needed) a journal stream.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Storage`] if the directory cannot be created.
    pub fn open(path: impl AsRef<Path>, stream: impl Into<String>) -> CapacityResult<Self> {
        let path = path.as_ref().to_path_buf();
        create_dir_all(&path).map_err(io_err)?;
        Ok(Self {
            path,
            stream: stream.into(),
        })
    }

    /// Location of the journal file.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.path.join(format!("{}.jsonl", self.stream))
    }

    /// Rebuild committed tables from disk, cutting off a torn final line.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Storage`] on I/O failure or on a damaged line
    /// that is not the final one.
    pub fn replay(&self) -> CapacityResult<Tables> {
        let mut tables = Tables::default();
        let file_path = self.file_path();
        if !file_path.exists() {
            return Ok(tables);
        }
        let bytes = std::fs::read(&file_path).map_err(io_err)?;

        let mut tail = Tail::Clean;
        let mut start = 0;
        let mut line_no = 0;
        while start < bytes.len() {
            line_no += 1;
            let newline = bytes[start..].iter().position(|b| *b == b'\n');
            let end = newline.map_or(bytes.len(), |i| start + i);
            let next = newline.map_or(bytes.len(), |_| end + 1);
            let line = &bytes[start..end];

            if line.iter().all(u8::is_ascii_whitespace) {
                if newline.is_none() {
                    tail = Tail::Torn(start as u64);
                }
                start = next;
                continue;
            }
            match serde_json::from_slice::<JournalRecord>(line) {
                Ok(record) => {
                    for entry in record.entries {
                        tables.apply(entry);
                    }
                    if newline.is_none() {
                        tail = Tail::Unterminated;
                    }
                }
                Err(e) if newline.is_none() => {
                    tracing::warn!(
                        path = %file_path.display(),
                        line = line_no,
                        error = %e,
                        "discarding torn journal tail"
                    );
                    tail = Tail::Torn(start as u64);
                }
                Err(e) => {
                    return Err(CapacityError::Storage(format!(
                        "journal {} corrupt at line {line_no}: {e}",
                        file_path.display()
                    )));
                }
            }
            start = next;
        }

        match tail {
            Tail::Clean => {}
            Tail::Unterminated => {
                let mut file = OpenOptions::new()
                    .append(true)
                    .open(&file_path)
                    .map_err(io_err)?;
                file.write_all(b"\n").map_err(io_err)?;
                file.sync_data().map_err(io_err)?;
            }
            Tail::Torn(len) => {
                let file = OpenOptions::new()
                    .write(true)
                    .open(&file_path)
                    .map_err(io_err)?;
                truncate(&file, len)?;
            }
        }
        Ok(tables)
    }

    /// Append one committed transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Storage`] if the line cannot be written; the
    /// file is cut back to its previous length first.
    pub fn append(&self, entries: Vec<JournalEntry>) -> CapacityResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let buf = encode(&JournalRecord {
            committed_at_ms: now_ms(),
            entries,
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path())
            .map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();
        if let Err(e) = file.write_all(&buf).and_then(|()| file.sync_data()) {
            if let Err(undo) = truncate(&file, len) {
                tracing::error!(error = %undo, "failed to roll back partial journal append");
            }
            return Err(io_err(e));
        }
        Ok(())
    }

    /// Replace the journal with a single snapshot record of `tables`.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Storage`] if the snapshot cannot be written or
    /// moved into place; the previous journal is left intact in that case.
    pub fn compact(&self, tables: &Tables) -> CapacityResult<()> {
        let entries: Vec<JournalEntry> = tables
            .counsellors
            .values()
            .cloned()
            .map(|row| JournalEntry::PutCounsellor { row })
            .chain(
                tables
                    .leads
                    .values()
                    .cloned()
                    .map(|row| JournalEntry::PutLead { row }),
            )
            .collect();
        let tmp_path = self.path.join(format!("{}.jsonl.tmp", self.stream));
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(io_err)?;
            if !entries.is_empty() {
                let buf = encode(&JournalRecord {
                    committed_at_ms: now_ms(),
                    entries,
                })?;
                file.write_all(&buf).map_err(io_err)?;
            }
            file.sync_all().map_err(io_err)?;
        }
        rename(&tmp_path, self.file_path()).map_err(io_err)
    }
}

fn truncate(file: &File, len: u64) -> CapacityResult<()> {
    file.set_len(len).map_err(io_err)?;
    file.sync_data().map_err(io_err)
}
