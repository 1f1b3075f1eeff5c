//! Durability tests for file-backed stores.

use proptest::prelude::*;
use recipesync_store::{
    fields, Filter, LocalStore, RecipeDraft, StoreConfig, StoreError, Table,
};
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

#[test]
fn committed_transactions_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store").join("journal.rsj");

    {
        let store = LocalStore::open(&path).unwrap();
        store.create_recipe(&RecipeDraft::new("Pasta")).unwrap();
        store.set_app_state("theme", "dark").unwrap();
        store
            .atomically(|txn| Ok::<_, StoreError>(txn.set_cursor(1_700_000_000_000)))
            .unwrap();

        let aborted: Result<(), StoreError> = store.atomically(|txn| {
            txn.create(Table::Recipes, fields([("title", "Aborted")]));
            Err(StoreError::invalid_operation("user cancelled"))
        });
        assert!(aborted.is_err());
    }

    let store = LocalStore::open(&path).unwrap();
    let titles: Vec<String> = store.recipes().into_iter().map(|r| r.title).collect();
    assert_eq!(titles, vec!["Pasta"]);
    assert_eq!(store.app_state("theme").as_deref(), Some("dark"));
    assert_eq!(store.cursor(), Some(1_700_000_000_000));
}

#[test]
fn second_open_of_same_file_is_refused() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.rsj");

    let _first = LocalStore::open(&path).unwrap();
    let second = LocalStore::open(&path);
    assert!(matches!(second, Err(StoreError::Storage(_))));
}

#[test]
fn torn_tail_on_disk_is_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.rsj");

    {
        let store = LocalStore::open(&path).unwrap();
        store.create_recipe(&RecipeDraft::new("Kept")).unwrap();
    }

    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"RSJ1\x40\x00\x00\x00half a frame").unwrap();
    }

    let store = LocalStore::open(&path).unwrap();
    assert_eq!(store.recipes().len(), 1);
    store.create_recipe(&RecipeDraft::new("Later")).unwrap();
    drop(store);

    let strict = StoreConfig::default().repair_torn_tail(false);
    let store = LocalStore::open_with_config(&path, strict).unwrap();
    assert_eq!(store.recipes().len(), 2);
}

#[test]
fn checkpoint_then_reopen_keeps_pending_changes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.rsj");

    {
        let store = LocalStore::open(&path).unwrap();
        let a = store.create_recipe(&RecipeDraft::new("A")).unwrap();
        store.create_recipe(&RecipeDraft::new("B")).unwrap();
        store.delete_recipe(a.id).unwrap();
        store.checkpoint().unwrap();
    }

    let store = LocalStore::open(&path).unwrap();
    let pending = store.pending_changes(Table::Recipes);
    assert_eq!(pending.created.len(), 1);
    assert_eq!(pending.created[0].text("title"), "B");
    assert!(store.query(Table::Recipes, &Filter::eq("title", "A")).is_empty());
}

#[derive(Debug, Clone)]
enum Step {
    Create(String),
    DeleteFirst,
    UpdateLast(String),
    Cursor(i64),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(Step::Create),
        Just(Step::DeleteFirst),
        "[a-z]{1,8}".prop_map(Step::UpdateLast),
        (0i64..10_000).prop_map(Step::Cursor),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn replay_reproduces_committed_state(steps in prop::collection::vec(step_strategy(), 1..30)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.rsj");
        let config = StoreConfig::default().sync_on_commit(false);

        let (expected, expected_cursor, expected_pending) = {
            let store = LocalStore::open_with_config(&path, config.clone()).unwrap();
            for step in &steps {
                match step {
                    Step::Create(title) => {
                        store.create_recipe(&RecipeDraft::new(title.as_str())).unwrap();
                    }
                    Step::DeleteFirst => {
                        if let Some(first) = store.recipes().first() {
                            store.delete_recipe(first.id).unwrap();
                        }
                    }
                    Step::UpdateLast(title) => {
                        if let Some(last) = store.recipes().last() {
                            store.update_recipe(last.id, &RecipeDraft::new(title.as_str())).unwrap();
                        }
                    }
                    Step::Cursor(c) => {
                        store.atomically(|txn| Ok::<_, StoreError>(txn.set_cursor(*c))).unwrap();
                    }
                }
            }
            (store.recipes(), store.cursor(), store.pending_changes(Table::Recipes))
        };

        let store = LocalStore::open_with_config(&path, config).unwrap();
        prop_assert_eq!(store.recipes(), expected);
        prop_assert_eq!(store.cursor(), expected_cursor);
        prop_assert_eq!(store.pending_changes(Table::Recipes), expected_pending);
    }
}
