//! The local store facade and its write transactions.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::journal::{self, JournalFrame, JournalOp};
use crate::types::{Fields, Filter, Record, RecordId, SyncStatus, Table};
use parking_lot::{Mutex, RwLock};
use recipesync_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Committed, in-memory view of the journal.
#[derive(Debug, Default, Clone)]
struct State {
    tables: HashMap<Table, HashMap<RecordId, Record>>,
    cursor: Option<i64>,
    next_seq: u64,
}

enum Replay {
    Ok(State),
    SchemaMismatch(Option<u32>),
}

impl State {
    fn get(&self, table: Table, id: RecordId) -> Option<&Record> {
        self.tables.get(&table).and_then(|t| t.get(&id))
    }

    fn records(&self, table: Table) -> impl Iterator<Item = &Record> {
        self.tables.get(&table).into_iter().flat_map(|t| t.values())
    }

    fn apply(&mut self, op: JournalOp) {
        match op {
            JournalOp::Put(record) => {
                self.next_seq = self.next_seq.max(record.seq + 1);
                self.tables
                    .entry(record.table)
                    .or_default()
                    .insert(record.id, record);
            }
            JournalOp::Remove { table, id } => {
                if let Some(t) = self.tables.get_mut(&table) {
                    t.remove(&id);
                }
            }
            JournalOp::Cursor(cursor) => {
                self.cursor = Some(self.cursor.map_or(cursor, |c| c.max(cursor)));
            }
        }
    }

    fn replay(frames: Vec<JournalFrame>, schema_version: u32) -> Replay {
        let mut state = State::default();
        let mut version = None;

        for frame in frames {
            match frame {
                JournalFrame::Header { schema_version: v } => version = Some(v),
                JournalFrame::Snapshot {
                    schema_version: v,
                    cursor,
                    next_seq,
                    records,
                } => {
                    version = Some(v);
                    state = State {
                        cursor,
                        next_seq,
                        ..State::default()
                    };
                    for record in records {
                        state.apply(JournalOp::Put(record));
                    }
                }
                JournalFrame::Batch { ops } => {
                    if version.is_none() {
                        return Replay::SchemaMismatch(None);
                    }
                    for op in ops {
                        state.apply(op);
                    }
                }
            }
        }

        match version {
            Some(v) if v == schema_version => Replay::Ok(state),
            other => Replay::SchemaMismatch(other),
        }
    }

    fn snapshot(&self, schema_version: u32) -> JournalFrame {
        let mut records: Vec<Record> = self
            .tables
            .values()
            .flat_map(|t| t.values().cloned())
            .collect();
        records.sort_by_key(|r| r.seq);

        JournalFrame::Snapshot {
            schema_version,
            cursor: self.cursor,
            next_seq: self.next_seq,
            records,
        }
    }
}

/// Pending local changes of one table, grouped for push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    /// Records created locally and never pushed.
    pub created: Vec<Record>,
    /// Records changed since their last push.
    pub updated: Vec<Record>,
    /// Tombstones whose deletion has not been pushed.
    pub deleted: Vec<Record>,
}

impl PendingChanges {
    /// Returns true if nothing is waiting to be pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of pending records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// `(id, revision)` pairs used to acknowledge exactly these versions.
    #[must_use]
    pub fn acknowledgements(&self) -> Vec<(RecordId, u64)> {
        self.created
            .iter()
            .chain(&self.updated)
            .chain(&self.deleted)
            .map(|r| (r.id, r.revision))
            .collect()
    }
}

/// Per-table record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// The table.
    pub table: Table,
    /// Live records.
    pub live: usize,
    /// Tombstones still on disk.
    pub tombstones: usize,
    /// Records with a change waiting to be pushed.
    pub pending: usize,
}

/// Store-wide statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Counts per table, in schema order.
    pub tables: Vec<TableStats>,
    /// Current sync cursor.
    pub cursor: Option<i64>,
    /// Size of the journal in bytes.
    pub journal_bytes: u64,
}

/// The on-device record store.
///
/// `LocalStore` keeps four typed tables in memory and journals every
/// committed transaction to a [`StorageBackend`]. Records are never
/// hard-deleted by normal writes: `soft_delete` leaves a tombstone that is
/// invisible to `find` and `query` until it is purged.
///
/// # Transactions
///
/// All mutations go through [`atomically`](LocalStore::atomically). Only
/// one write transaction runs at a time; readers see the last committed
/// state and never observe a transaction in progress.
///
/// ```rust
/// use recipesync_store::{fields, Filter, LocalStore, Table};
///
/// let store = LocalStore::open_in_memory().unwrap();
/// store
///     .atomically(|txn| {
///         txn.create(Table::AppState, fields([("key", "theme"), ("value", "dark")]));
///         Ok::<_, recipesync_store::StoreError>(())
///     })
///     .unwrap();
///
/// let found = store.query(Table::AppState, &Filter::eq("key", "theme"));
/// assert_eq!(found.len(), 1);
/// ```
pub struct LocalStore {
    config: StoreConfig,
    state: RwLock<State>,
    /// Journal backend. Its mutex doubles as the single-writer lock.
    journal: Mutex<Box<dyn StorageBackend>>,
}

impl LocalStore {
    /// Opens or creates a store journaled to the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is locked by another process, cannot be
    /// read, or has a torn tail while `repair_torn_tail` is off.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens or creates a file-backed store with custom configuration.
    ///
    /// # Errors
    ///
    /// See [`open`](LocalStore::open).
    pub fn open_with_config(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::open_with_backend(Box::new(backend), config)
    }

    /// Opens an ephemeral store backed by memory.
    ///
    /// # Errors
    ///
    /// Only fails if the journal header cannot be encoded.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    /// Opens a store over any backend, replaying its journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or written.
    pub fn open_with_backend(
        mut backend: Box<dyn StorageBackend>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let data = backend.read_all()?;

        let state = if data.is_empty() {
            let header = JournalFrame::Header {
                schema_version: config.schema_version,
            };
            backend.append(&header.encode()?)?;
            backend.sync()?;
            State::default()
        } else {
            let scan = journal::scan(&data);
            let mut rewrite = false;

            if let Some((offset, reason)) = &scan.torn_tail {
                if !config.repair_torn_tail {
                    return Err(StoreError::JournalCorruption {
                        offset: *offset,
                        message: reason.clone(),
                    });
                }
                warn!(offset, reason = %reason, "ignoring torn journal tail");
                rewrite = true;
            }

            let state = match State::replay(scan.frames, config.schema_version) {
                Replay::Ok(state) => state,
                Replay::SchemaMismatch(found) => {
                    warn!(
                        found = ?found,
                        expected = config.schema_version,
                        "schema version changed without migration, wiping local data"
                    );
                    rewrite = true;
                    State::default()
                }
            };

            if rewrite {
                backend.replace(&state.snapshot(config.schema_version).encode()?)?;
            }
            state
        };

        debug!(
            records = state.tables.values().map(HashMap::len).sum::<usize>(),
            cursor = ?state.cursor,
            "local store opened"
        );

        Ok(Self {
            config,
            state: RwLock::new(state),
            journal: Mutex::new(backend),
        })
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Runs `f` as a single write transaction.
    ///
    /// If `f` returns `Ok`, every mutation it made is journaled as one frame
    /// and then becomes visible. If it returns `Err` (or panics) nothing is
    /// applied. The writer lock is released on every path.
    ///
    /// Transactions are not reentrant: calling `atomically` from inside `f`
    /// deadlocks. Use the reads on [`WriteTxn`] instead.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a [`StoreError`] converted into `E` if
    /// the journal write fails.
    pub fn atomically<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut journal = self.journal.lock();

        let (value, ops) = {
            let base = self.state.read();
            let mut txn = WriteTxn::new(&base);
            let value = f(&mut txn)?;
            (value, txn.into_ops())
        };

        if ops.is_empty() {
            return Ok(value);
        }

        self.persist(&mut **journal, ops.clone())?;

        let mut state = self.state.write();
        for op in ops {
            state.apply(op);
        }
        Ok(value)
    }

    fn persist(&self, journal: &mut dyn StorageBackend, ops: Vec<JournalOp>) -> StoreResult<()> {
        let frame = JournalFrame::Batch { ops }.encode()?;

        let written = journal.append(&frame).and_then(|_| {
            if self.config.sync_on_commit {
                journal.sync()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            // A partial frame would hide every later commit on replay;
            // rewrite the journal from the committed state.
            let snapshot = self.state.read().snapshot(self.config.schema_version);
            if let Err(repair) = snapshot.encode().and_then(|b| Ok(journal.replace(&b)?)) {
                warn!(error = %repair, "failed to repair journal after write error");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Creates a record in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn create(&self, table: Table, fields: Fields) -> StoreResult<Record> {
        self.atomically(|txn| Ok(txn.create(table, fields)))
    }

    /// Soft-deletes a record in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record is gone or already a
    /// tombstone.
    pub fn soft_delete(&self, record: &Record) -> StoreResult<()> {
        self.atomically(|txn| txn.soft_delete(record))
    }

    /// Finds a live record by local ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for missing records and tombstones.
    pub fn find(&self, table: Table, id: RecordId) -> StoreResult<Record> {
        self.state
            .read()
            .get(table, id)
            .filter(|r| r.is_live())
            .cloned()
            .ok_or(StoreError::NotFound { table, id })
    }

    /// Returns live records matching `filter`, in creation order.
    pub fn query(&self, table: Table, filter: &Filter) -> Vec<Record> {
        let state = self.state.read();
        let mut out: Vec<Record> = state
            .records(table)
            .filter(|r| r.is_live() && filter.matches(r))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.seq);
        out
    }

    /// Returns tombstones of a table, in creation order.
    pub fn tombstones(&self, table: Table) -> Vec<Record> {
        let state = self.state.read();
        let mut out: Vec<Record> = state
            .records(table)
            .filter(|r| r.deleted)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.seq);
        out
    }

    /// Returns the sync cursor, `None` before the first successful sync.
    pub fn cursor(&self) -> Option<i64> {
        self.state.read().cursor
    }

    /// Returns the records of `table` waiting to be pushed.
    pub fn pending_changes(&self, table: Table) -> PendingChanges {
        pending_in(self.state.read().records(table))
    }

    /// Physically removes synced tombstones of `table` matching `pred`.
    ///
    /// Tombstones whose deletion has not been pushed yet are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn purge_tombstones<P>(&self, table: Table, pred: P) -> StoreResult<usize>
    where
        P: Fn(&Record) -> bool,
    {
        self.atomically(|txn| {
            let doomed: Vec<RecordId> = txn
                .all_records(table)
                .into_iter()
                .filter(|r| r.deleted && r.status == SyncStatus::Synced && pred(r))
                .map(|r| r.id)
                .collect();
            for id in &doomed {
                txn.purge(table, *id)?;
            }
            Ok(doomed.len())
        })
    }

    /// Rewrites the journal as a single snapshot of the committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written. The previous
    /// journal is left intact in that case.
    pub fn checkpoint(&self) -> StoreResult<()> {
        let mut journal = self.journal.lock();
        let bytes = self
            .state
            .read()
            .snapshot(self.config.schema_version)
            .encode()?;
        journal.replace(&bytes)?;
        debug!(bytes = bytes.len(), "journal checkpointed");
        Ok(())
    }

    /// Returns record counts per table.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal size cannot be read.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let journal_bytes = self.journal.lock().size()?;
        let state = self.state.read();

        let tables = Table::ALL
            .into_iter()
            .map(|table| {
                let mut stats = TableStats {
                    table,
                    live: 0,
                    tombstones: 0,
                    pending: 0,
                };
                for r in state.records(table) {
                    if r.deleted {
                        stats.tombstones += 1;
                    } else {
                        stats.live += 1;
                    }
                    if r.status.is_pending() {
                        stats.pending += 1;
                    }
                }
                stats
            })
            .collect();

        Ok(StoreStats {
            tables,
            cursor: state.cursor,
            journal_bytes,
        })
    }
}

fn pending_in<'r>(records: impl Iterator<Item = &'r Record>) -> PendingChanges {
    let mut records: Vec<&Record> = records.filter(|r| r.status.is_pending()).collect();
    records.sort_by_key(|r| r.seq);

    let mut pending = PendingChanges::default();
    for r in records {
        match r.status {
            SyncStatus::Created => pending.created.push(r.clone()),
            SyncStatus::Updated => pending.updated.push(r.clone()),
            SyncStatus::Deleted => pending.deleted.push(r.clone()),
            SyncStatus::Synced => {}
        }
    }
    pending
}

/// A write transaction in progress.
///
/// Reads through a `WriteTxn` see the transaction's own writes; readers
/// outside it keep seeing the last committed state.
pub struct WriteTxn<'a> {
    base: &'a State,
    overlay: HashMap<(Table, RecordId), Record>,
    removed: HashSet<(Table, RecordId)>,
    cursor: Option<i64>,
    cursor_changed: bool,
    next_seq: u64,
}

impl<'a> WriteTxn<'a> {
    fn new(base: &'a State) -> Self {
        Self {
            base,
            overlay: HashMap::new(),
            removed: HashSet::new(),
            cursor: base.cursor,
            cursor_changed: false,
            next_seq: base.next_seq,
        }
    }

    fn into_ops(self) -> Vec<JournalOp> {
        let mut puts: Vec<Record> = self.overlay.into_values().collect();
        puts.sort_by_key(|r| r.seq);

        let mut ops: Vec<JournalOp> = puts.into_iter().map(JournalOp::Put).collect();
        ops.extend(
            self.removed
                .into_iter()
                .map(|(table, id)| JournalOp::Remove { table, id }),
        );
        if self.cursor_changed {
            if let Some(cursor) = self.cursor {
                ops.push(JournalOp::Cursor(cursor));
            }
        }
        ops
    }

    fn lookup(&self, table: Table, id: RecordId) -> Option<&Record> {
        if self.removed.contains(&(table, id)) {
            return None;
        }
        self.overlay
            .get(&(table, id))
            .or_else(|| self.base.get(table, id))
    }

    fn all_records(&self, table: Table) -> Vec<Record> {
        let mut out: Vec<Record> = self
            .base
            .records(table)
            .filter(|r| !self.overlay.contains_key(&(table, r.id)))
            .chain(self.overlay.values().filter(|r| r.table == table))
            .filter(|r| !self.removed.contains(&(table, r.id)))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.seq);
        out
    }

    fn write(&mut self, mut record: Record) -> Record {
        record.revision += 1;
        self.overlay.insert((record.table, record.id), record.clone());
        record
    }

    fn insert(&mut self, table: Table, fields: Fields, status: SyncStatus) -> Record {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.write(Record {
            id: RecordId::new(),
            table,
            fields,
            status,
            deleted: false,
            seq,
            revision: 0,
        })
    }

    /// Creates a record.
    ///
    /// Records of synced tables start as pending `Created`; other tables
    /// never leave the device and start as `Synced`.
    pub fn create(&mut self, table: Table, fields: Fields) -> Record {
        let status = if table.is_synced() {
            SyncStatus::Created
        } else {
            SyncStatus::Synced
        };
        self.insert(table, fields, status)
    }

    /// Creates a record that mirrors remote state and has nothing to push.
    pub fn insert_synced(&mut self, table: Table, fields: Fields) -> Record {
        self.insert(table, fields, SyncStatus::Synced)
    }

    /// Finds a live record by local ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for missing records and tombstones.
    pub fn find(&self, table: Table, id: RecordId) -> StoreResult<Record> {
        self.lookup(table, id)
            .filter(|r| r.is_live())
            .cloned()
            .ok_or(StoreError::NotFound { table, id })
    }

    /// Returns live records matching `filter`, in creation order.
    pub fn query(&self, table: Table, filter: &Filter) -> Vec<Record> {
        self.all_records(table)
            .into_iter()
            .filter(|r| r.is_live() && filter.matches(r))
            .collect()
    }

    /// Overwrites the given columns of a live record.
    ///
    /// A synced record of a synced table becomes pending `Updated`; a record
    /// still pending `Created` stays `Created`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for missing records and tombstones.
    pub fn update(&mut self, table: Table, id: RecordId, changes: Fields) -> StoreResult<Record> {
        let mut record = self.find(table, id)?;
        record.fields.extend(changes);
        if table.is_synced() && record.status == SyncStatus::Synced {
            record.status = SyncStatus::Updated;
        }
        Ok(self.write(record))
    }

    /// Tombstones a record on behalf of the user.
    ///
    /// If the record was ever pushed the deletion is queued for push;
    /// a never-pushed draft simply disappears.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record is gone or already a
    /// tombstone.
    pub fn soft_delete(&mut self, record: &Record) -> StoreResult<()> {
        let mut current = self.find(record.table, record.id)?;
        current.deleted = true;
        current.status = match current.status {
            SyncStatus::Created => SyncStatus::Synced,
            _ if current.table.is_synced() => SyncStatus::Deleted,
            _ => SyncStatus::Synced,
        };
        self.write(current);
        Ok(())
    }

    /// Tombstones a record without queueing anything for push.
    ///
    /// Used when the record is superseded by fresher data (a replaced
    /// remote copy, a retired single-slot value).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record is gone or already a
    /// tombstone.
    pub fn retire(&mut self, record: &Record) -> StoreResult<()> {
        let mut current = self.find(record.table, record.id)?;
        current.deleted = true;
        current.status = SyncStatus::Synced;
        self.write(current);
        Ok(())
    }

    /// Marks pushed records as synced.
    ///
    /// Each entry is `(id, revision)` as captured before the push. Records
    /// written again since then keep their pending state so the newer
    /// change is pushed next round. Returns how many were acknowledged.
    pub fn mark_synced(&mut self, table: Table, acks: &[(RecordId, u64)]) -> usize {
        let mut acked = 0;
        for &(id, revision) in acks {
            let Some(record) = self.lookup(table, id) else {
                continue;
            };
            if record.revision != revision || !record.status.is_pending() {
                continue;
            }
            let mut record = record.clone();
            record.status = SyncStatus::Synced;
            self.write(record);
            acked += 1;
        }
        acked
    }

    /// Physically removes a synced tombstone.
    ///
    /// # Errors
    ///
    /// Returns an invalid-operation error for live records and for
    /// tombstones whose deletion is still pending.
    pub fn purge(&mut self, table: Table, id: RecordId) -> StoreResult<()> {
        let record = self
            .lookup(table, id)
            .ok_or(StoreError::NotFound { table, id })?;
        if !record.deleted || record.status != SyncStatus::Synced {
            return Err(StoreError::invalid_operation(format!(
                "record {id} in {table} is not a synced tombstone"
            )));
        }
        self.overlay.remove(&(table, id));
        self.removed.insert((table, id));
        Ok(())
    }

    /// Returns the sync cursor as seen by this transaction.
    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    /// Advances the sync cursor.
    ///
    /// The cursor never moves backwards; a lower value is ignored and
    /// `false` is returned.
    pub fn set_cursor(&mut self, cursor: i64) -> bool {
        if self.cursor.is_some_and(|c| cursor < c) {
            return false;
        }
        self.cursor = Some(cursor);
        self.cursor_changed = true;
        true
    }

    /// Returns the records of `table` waiting to be pushed.
    pub fn pending_changes(&self, table: Table) -> PendingChanges {
        pending_in(self.all_records(table).iter())
    }
}
