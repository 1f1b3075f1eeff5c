//! Local recipe operations.

use crate::error::{StoreError, StoreResult};
use crate::models::{Model, Recipe, RecipeDraft};
use crate::store::LocalStore;
use crate::types::{Filter, RecordId, Table};
use tracing::debug;

impl LocalStore {
    /// Stores a new local recipe. It stays a draft until pushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn create_recipe(&self, draft: &RecipeDraft) -> StoreResult<Recipe> {
        let record = self.create(Table::Recipes, draft.to_fields())?;
        debug!(id = %record.id, title = %draft.title, "recipe created");
        Recipe::from_record(&record)
    }

    /// Overwrites the content of a live recipe. Its remote identity is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the recipe is gone.
    pub fn update_recipe(&self, id: RecordId, draft: &RecipeDraft) -> StoreResult<Recipe> {
        let record = self.atomically(|txn| txn.update(Table::Recipes, id, draft.to_fields()))?;
        Recipe::from_record(&record)
    }

    /// Deletes a recipe on behalf of the user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the recipe is already gone.
    pub fn delete_recipe(&self, id: RecordId) -> StoreResult<()> {
        self.atomically(|txn| {
            let record = txn.find(Table::Recipes, id)?;
            txn.soft_delete(&record)
        })
    }

    /// Returns a live recipe by local ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for missing or deleted recipes.
    pub fn recipe(&self, id: RecordId) -> StoreResult<Recipe> {
        Recipe::from_record(&self.find(Table::Recipes, id)?)
    }

    /// Returns every live recipe, oldest first.
    pub fn recipes(&self) -> Vec<Recipe> {
        self.query(Table::Recipes, &Filter::all())
            .iter()
            .filter_map(|r| Recipe::from_record(r).ok())
            .collect()
    }

    /// Returns the live recipe carrying `remote_id`, if any.
    pub fn recipe_by_remote_id(&self, remote_id: &str) -> Option<Recipe> {
        self.query(Table::Recipes, &Filter::eq("remote_id", remote_id))
            .first()
            .and_then(|r| Recipe::from_record(r).ok())
    }

    /// Returns every live model of type `M`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] if a record cannot be read as `M`.
    pub fn all<M: Model>(&self) -> StoreResult<Vec<M>> {
        self.query(M::TABLE, &Filter::all())
            .iter()
            .map(M::from_record)
            .collect::<Result<_, StoreError>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{fields, SyncStatus};

    #[test]
    fn create_update_delete() {
        let store = LocalStore::open_in_memory().unwrap();
        let created = store
            .create_recipe(&RecipeDraft::new("Pasta").ingredient("flour"))
            .unwrap();
        assert!(created.is_draft());

        let updated = store
            .update_recipe(created.id, &RecipeDraft::new("Pasta al forno").ingredient("flour"))
            .unwrap();
        assert_eq!(updated.title, "Pasta al forno");
        assert_eq!(store.recipes().len(), 1);

        store.delete_recipe(created.id).unwrap();
        assert!(store.recipes().is_empty());
        assert!(store.recipe(created.id).unwrap_err().is_not_found());
        assert!(store.delete_recipe(created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn update_keeps_remote_id() {
        let store = LocalStore::open_in_memory().unwrap();
        let record = store
            .atomically(|txn| {
                Ok::<_, StoreError>(txn.insert_synced(
                    Table::Recipes,
                    fields([("title", "Soup"), ("remote_id", "7")]),
                ))
            })
            .unwrap();

        let updated = store.update_recipe(record.id, &RecipeDraft::new("Soup 2")).unwrap();
        assert_eq!(updated.remote_id.as_deref(), Some("7"));
        assert_eq!(store.find(Table::Recipes, record.id).unwrap().status, SyncStatus::Updated);
        assert_eq!(store.recipe_by_remote_id("7").unwrap().title, "Soup 2");
        assert!(store.recipe_by_remote_id("8").is_none());
    }

    #[test]
    fn all_reads_typed_models() {
        let store = LocalStore::open_in_memory().unwrap();
        store.create_recipe(&RecipeDraft::new("A")).unwrap();
        store.create_recipe(&RecipeDraft::new("B")).unwrap();

        let titles: Vec<String> = store.all::<Recipe>().unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }
}
