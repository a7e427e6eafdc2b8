//! In-memory relational backend with row locks and staged writes.
//!
//! Committed tables live behind a `parking_lot::RwLock` that is only held for
//! short synchronous sections. Row locks are per-row tokio mutexes owned by
//! the transaction until it commits, rolls back, or is dropped, so a
//! transaction can await while holding them. Writes are staged in the
//! transaction and published in one critical section at commit; readers
//! never observe half of a transaction.
//!
//! Journaled commits append their line under a separate commit mutex before
//! taking the tables lock, so readers never wait on disk I/O. Committers do
//! wait on each other's fsync, which keeps journal order equal to apply order.
//!
//! A row lock's registry entry lives only while some transaction holds or
//! waits on it.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

use crate::core::model::{Counsellor, CounsellorId, Lead, LeadId, NewLead};
use crate::core::store::{CounsellorRow, Storage, Transaction};
use crate::core::{CapacityError, CapacityResult};
use crate::infra::journal::{Journal, JournalEntry, Tables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Counsellor(CounsellorId),
    Lead(LeadId),
}

struct Inner {
    tables: RwLock<Tables>,
    commit_lock: Mutex<()>,
    row_locks: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
    next_counsellor_id: AtomicU64,
    next_lead_id: AtomicU64,
    journal: Option<Journal>,
}

impl Inner {
    fn row_lock(&self, key: RowKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.row_locks.lock();
        Arc::clone(locks.entry(key).or_default())
    }

    fn forget_row_lock(&self, key: RowKey) {
        let mut locks = self.row_locks.lock();
        // Only drop the entry when nobody else is holding or waiting on it.
        if locks.get(&key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }
}

/// Shared in-memory storage, optionally backed by a [`Journal`].
#[derive(Clone)]
pub struct InMemoryStorage {
    inner: Arc<Inner>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Create an empty, volatile store.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(Tables::default(), None)
    }

    /// Open a store whose commits are journaled under `dir`, replaying any
    /// existing journal first.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Storage`] if the journal cannot be opened or read.
    pub fn open_journal(dir: impl AsRef<Path>, stream: &str) -> CapacityResult<Self> {
        let journal = Journal::open(dir, stream)?;
        let tables = journal.replay()?;
        tracing::info!(
            counsellors = tables.counsellors.len(),
            leads = tables.leads.len(),
            path = %journal.file_path().display(),
            "journal replayed"
        );
        Ok(Self::from_parts(tables, Some(journal)))
    }

    fn from_parts(tables: Tables, journal: Option<Journal>) -> Self {
        let next_counsellor = tables.counsellors.keys().max().map_or(1, |id| id + 1);
        let next_lead = tables.leads.keys().max().map_or(1, |id| id + 1);
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(tables),
                commit_lock: Mutex::new(()),
                row_locks: Mutex::new(HashMap::new()),
                next_counsellor_id: AtomicU64::new(next_counsellor),
                next_lead_id: AtomicU64::new(next_lead),
                journal,
            }),
        }
    }

    /// Bulk-load rows exactly as given, e.g. when migrating from another system.
    ///
    /// No invariant is checked; use the stats aggregator's ledger verification
    /// afterwards to find drift.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Storage`] if the journal append fails, in which
    /// case nothing is loaded.
    pub fn import_rows(&self, counsellors: Vec<Counsellor>, leads: Vec<Lead>) -> CapacityResult<()> {
        let _commit = self.inner.commit_lock.lock();
        let entries: Vec<JournalEntry> = counsellors
            .iter()
            .cloned()
            .map(|row| JournalEntry::PutCounsellor { row })
            .chain(leads.iter().cloned().map(|row| JournalEntry::PutLead { row }))
            .collect();
        if let Some(journal) = &self.inner.journal {
            journal.append(entries)?;
        }
        let mut tables = self.inner.tables.write();
        for c in counsellors {
            self.inner
                .next_counsellor_id
                .fetch_max(c.id + 1, Ordering::AcqRel);
            tables.counsellors.insert(c.id, c);
        }
        for l in leads {
            self.inner.next_lead_id.fetch_max(l.id + 1, Ordering::AcqRel);
            tables.leads.insert(l.id, l);
        }
        Ok(())
    }

    /// Rewrite the journal as a snapshot of the committed tables.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::Storage`] if the snapshot cannot be written.
    pub fn compact_journal(&self) -> CapacityResult<()> {
        let Some(journal) = &self.inner.journal else {
            return Ok(());
        };
        let _commit = self.inner.commit_lock.lock();
        let tables = self.inner.tables.read().clone();
        journal.compact(&tables)
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_counsellor(&self, id: CounsellorId) -> CapacityResult<Option<Counsellor>> {
        Ok(self.inner.tables.read().counsellors.get(&id).cloned())
    }

    async fn list_counsellors(&self) -> CapacityResult<Vec<Counsellor>> {
        let mut rows: Vec<Counsellor> =
            self.inner.tables.read().counsellors.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn get_lead(&self, id: LeadId) -> CapacityResult<Option<Lead>> {
        Ok(self.inner.tables.read().leads.get(&id).cloned())
    }

    async fn list_leads_by_counsellor(&self, id: CounsellorId) -> CapacityResult<Vec<Lead>> {
        let mut rows: Vec<Lead> = self
            .inner
            .tables
            .read()
            .leads
            .values()
            .filter(|l| l.counselor_id == Some(id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then(b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn count_leads(&self, id: CounsellorId) -> CapacityResult<u64> {
        let tables = self.inner.tables.read();
        Ok(tables
            .leads
            .values()
            .filter(|l| l.counselor_id == Some(id))
            .count() as u64)
    }

    async fn live_lead_counts(&self) -> CapacityResult<HashMap<CounsellorId, u64>> {
        let tables = self.inner.tables.read();
        let mut counts = HashMap::new();
        for id in tables.leads.values().filter_map(|l| l.counselor_id) {
            *counts.entry(id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn begin(&self) -> CapacityResult<Box<dyn Transaction>> {
        Ok(Box::new(InMemoryTransaction {
            inner: Arc::clone(&self.inner),
            guards: HashMap::new(),
            counsellors: BTreeMap::new(),
            leads: BTreeMap::new(),
            finished: false,
        }))
    }
}

/// Transaction over [`InMemoryStorage`].
///
/// `None` in the staged maps marks a deleted row.
pub struct InMemoryTransaction {
    inner: Arc<Inner>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    counsellors: BTreeMap<CounsellorId, Option<Counsellor>>,
    leads: BTreeMap<LeadId, Option<Lead>>,
    finished: bool,
}

impl InMemoryTransaction {
    async fn lock(&mut self, key: RowKey) {
        if self.guards.contains_key(&key) {
            return;
        }
        let lock = self.inner.row_lock(key);
        let guard = lock.lock_owned().await;
        self.guards.insert(key, guard);
    }

    fn ensure_locked(&self, key: RowKey) -> CapacityResult<()> {
        if self.guards.contains_key(&key) {
            Ok(())
        } else {
            Err(CapacityError::Storage(format!(
                "write to {key:?} without holding its row lock"
            )))
        }
    }

    fn counsellor(&self, id: CounsellorId) -> Option<Counsellor> {
        match self.counsellors.get(&id) {
            Some(staged) => staged.clone(),
            None => self.inner.tables.read().counsellors.get(&id).cloned(),
        }
    }

    fn lead(&self, id: LeadId) -> Option<Lead> {
        match self.leads.get(&id) {
            Some(staged) => staged.clone(),
            None => self.inner.tables.read().leads.get(&id).cloned(),
        }
    }

    fn staged_entries(&self) -> Vec<JournalEntry> {
        let counsellors = self.counsellors.iter().map(|(id, row)| match row {
            Some(row) => JournalEntry::PutCounsellor { row: row.clone() },
            None => JournalEntry::DeleteCounsellor { id: *id },
        });
        let leads = self.leads.iter().map(|(id, row)| match row {
            Some(row) => JournalEntry::PutLead { row: row.clone() },
            None => JournalEntry::DeleteLead { id: *id },
        });
        counsellors.chain(leads).collect()
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_counsellor(&mut self, id: CounsellorId) -> CapacityResult<Option<Counsellor>> {
        self.lock(RowKey::Counsellor(id)).await;
        Ok(self.counsellor(id))
    }

    async fn lock_lead(&mut self, id: LeadId) -> CapacityResult<Option<Lead>> {
        self.lock(RowKey::Lead(id)).await;
        Ok(self.lead(id))
    }

    async fn count_leads(&mut self, id: CounsellorId) -> CapacityResult<u64> {
        let tables = self.inner.tables.read();
        let committed = tables
            .leads
            .values()
            .filter(|l| !self.leads.contains_key(&l.id) && l.counselor_id == Some(id))
            .count();
        let staged = self
            .leads
            .values()
            .flatten()
            .filter(|l| l.counselor_id == Some(id))
            .count();
        Ok((committed + staged) as u64)
    }

    async fn insert_counsellor(&mut self, row: CounsellorRow) -> CapacityResult<CounsellorId> {
        let id = self.inner.next_counsellor_id.fetch_add(1, Ordering::AcqRel);
        self.lock(RowKey::Counsellor(id)).await;
        let CounsellorRow {
            fields,
            max_capacity,
            now_ms,
        } = row;
        self.counsellors.insert(
            id,
            Some(Counsellor {
                id,
                name: fields.name,
                email: fields.email,
                phone: fields.phone,
                max_capacity,
                assigned_count: 0,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            }),
        );
        Ok(id)
    }

    async fn update_counsellor(&mut self, row: Counsellor) -> CapacityResult<u64> {
        self.ensure_locked(RowKey::Counsellor(row.id))?;
        if self.counsellor(row.id).is_none() {
            return Ok(0);
        }
        self.counsellors.insert(row.id, Some(row));
        Ok(1)
    }

    async fn delete_counsellor(&mut self, id: CounsellorId) -> CapacityResult<u64> {
        self.ensure_locked(RowKey::Counsellor(id))?;
        if self.counsellor(id).is_none() {
            return Ok(0);
        }
        self.counsellors.insert(id, None);
        Ok(1)
    }

    async fn insert_lead(&mut self, lead: NewLead, now_ms: u128) -> CapacityResult<LeadId> {
        let id = self.inner.next_lead_id.fetch_add(1, Ordering::AcqRel);
        self.lock(RowKey::Lead(id)).await;
        self.leads.insert(
            id,
            Some(Lead {
                id,
                name: lead.name,
                email: lead.email,
                phone: lead.phone,
                education: lead.education,
                lead_source: lead.lead_source,
                counselor_id: None,
                registration_fee_status: lead.registration_fee_status,
                course_fee_status: lead.course_fee_status,
                application_status: lead.application_status,
                interview_scheduled_at_ms: lead.interview_scheduled_at_ms,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            }),
        );
        Ok(id)
    }

    async fn set_lead_counsellor(
        &mut self,
        id: LeadId,
        counsellor: Option<CounsellorId>,
        now_ms: u128,
    ) -> CapacityResult<u64> {
        self.ensure_locked(RowKey::Lead(id))?;
        let Some(mut lead) = self.lead(id) else {
            return Ok(0);
        };
        lead.counselor_id = counsellor;
        lead.updated_at_ms = now_ms;
        self.leads.insert(id, Some(lead));
        Ok(1)
    }

    async fn delete_lead(&mut self, id: LeadId) -> CapacityResult<u64> {
        self.ensure_locked(RowKey::Lead(id))?;
        if self.lead(id).is_none() {
            return Ok(0);
        }
        self.leads.insert(id, None);
        Ok(1)
    }

    async fn adjust_assigned(
        &mut self,
        id: CounsellorId,
        delta: i32,
        now_ms: u128,
    ) -> CapacityResult<u64> {
        self.ensure_locked(RowKey::Counsellor(id))?;
        let Some(mut row) = self.counsellor(id) else {
            return Ok(0);
        };
        let next = i64::from(row.assigned_count) + i64::from(delta);
        if next < 0 || next > i64::from(row.max_capacity) {
            return Ok(0);
        }
        row.assigned_count = u32::try_from(next)
            .map_err(|e| CapacityError::Storage(format!("assigned_count overflow: {e}")))?;
        row.updated_at_ms = now_ms;
        self.counsellors.insert(id, Some(row));
        Ok(1)
    }

    async fn commit(mut self: Box<Self>) -> CapacityResult<()> {
        let entries = self.staged_entries();
        {
            let _commit = self.inner.commit_lock.lock();
            if let Some(journal) = &self.inner.journal {
                journal.append(entries.clone())?;
            }
            let mut tables = self.inner.tables.write();
            for entry in entries {
                tables.apply(entry);
            }
        }
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> CapacityResult<()> {
        self.finished = true;
        tracing::debug!(
            staged = self.counsellors.len() + self.leads.len(),
            "transaction rolled back"
        );
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished && !(self.counsellors.is_empty() && self.leads.is_empty()) {
            tracing::debug!(
                staged = self.counsellors.len() + self.leads.len(),
                "transaction dropped before commit; staged writes discarded"
            );
        }
        let held: Vec<RowKey> = self.guards.drain().map(|(key, _guard)| key).collect();
        for key in held {
            self.inner.forget_row_lock(key);
        }
    }
}
