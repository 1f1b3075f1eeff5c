//! Merging pulled changes into the local store.
//!
//! Remote truth wins. A pulled recipe replaces every live local copy with
//! the same remote identity, and any local draft carrying the same title.
//! Replaced copies become synced tombstones, so nothing superseded is ever
//! pushed back.

use crate::compaction::CompactionHook;
use crate::error::{SyncError, SyncResult};
use recipesync_protocol::{ChangeSet, RemoteRecipe};
use recipesync_store::{
    fields, Fields, Filter, LocalStore, Record, Table, WriteTxn, SHOULD_REFRESH_RECIPES,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Remote recipes inserted as new live records.
    pub inserted: usize,
    /// Live copies retired because a fresher remote copy arrived.
    pub replaced: usize,
    /// Local drafts retired because a pulled recipe had the same title.
    pub title_collisions: usize,
    /// Live copies retired because the server deleted them.
    pub removed: usize,
    /// Created entries skipped because their identity was already inserted.
    pub skipped_existing: usize,
}

impl ReconcileReport {
    /// Number of tombstones this merge wrote.
    pub fn tombstones_created(&self) -> usize {
        self.replaced + self.title_collisions + self.removed
    }

    /// Returns true if the live recipe set changed.
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.tombstones_created() > 0
    }
}

/// Checks a change-set before anything is written.
///
/// Every created and updated entry must carry a non-empty remote identity.
///
/// # Errors
///
/// Returns [`SyncError::InvariantViolation`] naming the first bad entry.
pub fn validate(changes: &ChangeSet) -> SyncResult<()> {
    let recipes = &changes.recipes;
    for (kind, entries) in [("created", &recipes.created), ("updated", &recipes.updated)] {
        if let Some(pos) = entries.iter().position(|r| r.remote_id.trim().is_empty()) {
            return Err(SyncError::invariant(format!(
                "{kind} recipe #{pos} has no remote identity"
            )));
        }
    }
    if recipes.deleted.iter().any(|id| id.trim().is_empty()) {
        return Err(SyncError::invariant("deleted entry has no remote identity"));
    }
    Ok(())
}

fn remote_fields(recipe: &RemoteRecipe) -> Fields {
    fields([
        ("title", recipe.title.clone()),
        ("description", recipe.description.clone()),
        ("ingredients", recipe.ingredients.clone()),
        ("steps", recipe.steps.clone()),
        ("cooking_time", recipe.cooking_time.clone()),
        ("remote_id", recipe.remote_id.trim().to_string()),
    ])
}

fn live_with_remote_id(txn: &WriteTxn<'_>, remote_id: &str) -> Vec<Record> {
    txn.query(Table::Recipes, &Filter::eq("remote_id", remote_id))
}

fn retire_remote(txn: &mut WriteTxn<'_>, remote_id: &str) -> SyncResult<usize> {
    let live = live_with_remote_id(txn, remote_id);
    for record in &live {
        txn.retire(record)?;
    }
    Ok(live.len())
}

/// Applies a change-set inside an open transaction.
///
/// Validation runs first, so an invalid change-set writes nothing.
///
/// # Errors
///
/// Returns [`SyncError::InvariantViolation`] for invalid change-sets, or a
/// store error.
pub fn apply(txn: &mut WriteTxn<'_>, changes: &ChangeSet) -> SyncResult<ReconcileReport> {
    validate(changes)?;

    let recipes = &changes.recipes;
    let mut report = ReconcileReport::default();

    let created_ids: HashSet<&str> = recipes.created.iter().map(|r| r.remote_id.trim()).collect();
    let created_titles: HashSet<&str> = recipes.created.iter().map(|r| r.title.as_str()).collect();

    for record in txn.query(Table::Recipes, &Filter::all()) {
        if let Some(remote_id) = record.optional_text("remote_id") {
            if created_ids.contains(remote_id) {
                debug!(id = %record.id, remote_id, "replacing local copy");
                txn.retire(&record)?;
                report.replaced += 1;
            }
        }
    }

    for draft in txn.query(Table::Recipes, &Filter::is_null("remote_id")) {
        if created_titles.contains(draft.text("title")) {
            debug!(id = %draft.id, title = draft.text("title"), "retiring draft shadowed by remote recipe");
            txn.retire(&draft)?;
            report.title_collisions += 1;
        }
    }

    for recipe in &recipes.created {
        if !live_with_remote_id(txn, recipe.remote_id.trim()).is_empty() {
            report.skipped_existing += 1;
            continue;
        }
        txn.insert_synced(Table::Recipes, remote_fields(recipe));
        report.inserted += 1;
    }

    for recipe in &recipes.updated {
        report.replaced += retire_remote(txn, recipe.remote_id.trim())?;
        txn.insert_synced(Table::Recipes, remote_fields(recipe));
        report.inserted += 1;
    }

    for remote_id in &recipes.deleted {
        report.removed += retire_remote(txn, remote_id.trim())?;
    }

    for (table, count) in &changes.ignored {
        if *count > 0 {
            debug!(table = %table, count, "ignoring changes for table that is not merged");
        }
    }

    if report.changed() {
        txn.set_app_state(SHOULD_REFRESH_RECIPES, "true")?;
    }

    Ok(report)
}

/// Merges pulled change-sets into a store.
pub struct ReconciliationEngine {
    store: Arc<LocalStore>,
    compaction: Option<Arc<dyn CompactionHook>>,
}

impl ReconciliationEngine {
    /// Creates an engine with no compaction hook.
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            compaction: None,
        }
    }

    /// Sets the hook notified after merges that created tombstones.
    pub fn with_compaction(mut self, hook: Arc<dyn CompactionHook>) -> Self {
        self.compaction = Some(hook);
        self
    }

    /// Merges `changes` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvariantViolation`] without writing anything if
    /// the change-set is invalid, or a store error if the commit fails.
    pub fn merge(&self, changes: &ChangeSet) -> SyncResult<ReconcileReport> {
        validate(changes)?;
        if changes.recipes.is_empty() {
            return Ok(ReconcileReport::default());
        }

        let report = self.store.atomically(|txn| apply(txn, changes))?;
        info!(
            inserted = report.inserted,
            replaced = report.replaced,
            title_collisions = report.title_collisions,
            removed = report.removed,
            "merged pulled changes"
        );

        let tombstones = report.tombstones_created();
        if tombstones > 0 {
            if let Some(hook) = &self.compaction {
                if let Err(e) = hook.tombstones_created(&self.store, Table::Recipes, tombstones) {
                    warn!(error = %e, "compaction hook failed");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipesync_protocol::TableChanges;
    use recipesync_store::{RecipeDraft, StoreResult};
    use parking_lot::Mutex;

    fn engine() -> (Arc<LocalStore>, ReconciliationEngine) {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let engine = ReconciliationEngine::new(Arc::clone(&store));
        (store, engine)
    }

    fn created(recipes: Vec<RemoteRecipe>) -> ChangeSet {
        ChangeSet {
            recipes: TableChanges {
                created: recipes,
                ..TableChanges::default()
            },
            ..ChangeSet::default()
        }
    }

    #[test]
    fn draft_with_same_title_is_replaced() {
        let (store, engine) = engine();
        store.create_recipe(&RecipeDraft::new("Pasta")).unwrap();

        let report = engine.merge(&created(vec![RemoteRecipe::new("42", "Pasta")])).unwrap();
        assert_eq!(report.title_collisions, 1);
        assert_eq!(report.inserted, 1);

        let live = store.recipes();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].title, "Pasta");
        assert_eq!(live[0].remote_id.as_deref(), Some("42"));
        assert!(store.pending_changes(Table::Recipes).is_empty());
        assert_eq!(store.app_state(SHOULD_REFRESH_RECIPES).as_deref(), Some("true"));
    }

    #[test]
    fn title_fallback_only_retires_drafts() {
        let (store, engine) = engine();
        engine.merge(&created(vec![RemoteRecipe::new("7", "Pasta")])).unwrap();

        let report = engine.merge(&created(vec![RemoteRecipe::new("42", "Pasta")])).unwrap();
        assert_eq!(report.title_collisions, 0);
        assert_eq!(report.inserted, 1);
        assert!(store.recipe_by_remote_id("7").is_some());
        assert!(store.recipe_by_remote_id("42").is_some());
    }

    #[test]
    fn merge_is_idempotent() {
        let (store, engine) = engine();
        let changes = created(vec![RemoteRecipe::new("1", "A"), RemoteRecipe::new("2", "B")]);

        engine.merge(&changes).unwrap();
        let first: Vec<_> = store.recipes().into_iter().map(|r| (r.remote_id, r.title)).collect();
        let report = engine.merge(&changes).unwrap();
        let second: Vec<_> = store.recipes().into_iter().map(|r| (r.remote_id, r.title)).collect();

        assert_eq!(first, second);
        assert_eq!(report.replaced, 2);
    }

    #[test]
    fn duplicate_identity_in_one_pull_inserts_once() {
        let (store, engine) = engine();
        let report = engine
            .merge(&created(vec![RemoteRecipe::new("7", "First"), RemoteRecipe::new("7", "Second")]))
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(store.recipes()[0].title, "First");
    }

    #[test]
    fn missing_identity_aborts_before_writes() {
        let (store, engine) = engine();
        store.create_recipe(&RecipeDraft::new("Pasta")).unwrap();

        let result = engine.merge(&created(vec![
            RemoteRecipe::new("1", "Pasta"),
            RemoteRecipe::new("  ", "Broken"),
        ]));
        assert!(matches!(result, Err(SyncError::InvariantViolation(_))));

        let live = store.recipes();
        assert_eq!(live.len(), 1);
        assert!(live[0].is_draft());
    }

    #[test]
    fn updates_and_deletes_replace_by_identity() {
        let (store, engine) = engine();
        engine
            .merge(&created(vec![RemoteRecipe::new("1", "Old"), RemoteRecipe::new("2", "Gone")]))
            .unwrap();

        let changes = ChangeSet {
            recipes: TableChanges {
                updated: vec![RemoteRecipe::new("1", "New")],
                deleted: vec!["2".into(), "99".into()],
                ..TableChanges::default()
            },
            ..ChangeSet::default()
        };
        let report = engine.merge(&changes).unwrap();
        assert_eq!(report.replaced, 1);
        assert_eq!(report.removed, 1);

        let live = store.recipes();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].title, "New");
        assert!(store.recipe_by_remote_id("2").is_none());
    }

    #[test]
    fn unrelated_drafts_survive() {
        let (store, engine) = engine();
        store.create_recipe(&RecipeDraft::new("Soup")).unwrap();
        engine.merge(&created(vec![RemoteRecipe::new("1", "Pasta")])).unwrap();

        let pending = store.pending_changes(Table::Recipes);
        assert_eq!(pending.created.len(), 1);
        assert_eq!(pending.created[0].text("title"), "Soup");
    }

    #[test]
    fn empty_merge_writes_nothing() {
        let (store, engine) = engine();
        let report = engine.merge(&ChangeSet::empty()).unwrap();
        assert!(!report.changed());
        assert_eq!(store.app_state(SHOULD_REFRESH_RECIPES), None);
    }

    struct CountingHook(Mutex<Vec<usize>>);

    impl CompactionHook for CountingHook {
        fn tombstones_created(&self, _store: &LocalStore, _table: Table, created: usize) -> StoreResult<()> {
            self.0.lock().push(created);
            Ok(())
        }
    }

    #[test]
    fn hook_is_told_about_tombstones() {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let hook = Arc::new(CountingHook(Mutex::new(Vec::new())));
        let engine = ReconciliationEngine::new(Arc::clone(&store))
            .with_compaction(Arc::clone(&hook) as Arc<dyn CompactionHook>);

        engine.merge(&created(vec![RemoteRecipe::new("1", "A")])).unwrap();
        engine.merge(&created(vec![RemoteRecipe::new("1", "A")])).unwrap();
        assert_eq!(*hook.0.lock(), vec![1]);
    }
}
