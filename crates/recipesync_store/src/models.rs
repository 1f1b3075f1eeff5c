//! Typed views over the four tables.

use crate::error::{StoreError, StoreResult};
use crate::types::{fields, FieldValue, Fields, Record, RecordId, Table};

/// Separator used to store ingredient lists.
pub const INGREDIENT_SEPARATOR: &str = ", ";

/// Separator used to store step lists.
pub const STEP_SEPARATOR: &str = "\n";

/// Trait for types stored as records of one table.
///
/// Implementors must provide:
/// - `TABLE`: the table the model lives in
/// - `from_record()`: reads the model from a live record
/// - `to_fields()`: the column values to write
pub trait Model: Sized {
    /// Table holding records of this model.
    const TABLE: Table;

    /// Reads the model from a stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] if the record belongs to a
    /// different table or lacks a required column.
    fn from_record(record: &Record) -> StoreResult<Self>;

    /// Returns the column values of this model.
    fn to_fields(&self) -> Fields;
}

fn check_table<M: Model>(record: &Record) -> StoreResult<()> {
    if record.table == M::TABLE {
        Ok(())
    } else {
        Err(StoreError::invalid_record(
            record.table,
            record.id,
            format!("expected a {} record", M::TABLE),
        ))
    }
}

fn required_text(record: &Record, field: &str) -> StoreResult<String> {
    record
        .optional_text(field)
        .map(str::to_string)
        .ok_or_else(|| StoreError::invalid_record(record.table, record.id, format!("missing {field}")))
}

/// Session credential (`tokens`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque bearer token.
    pub jwt: String,
    /// Creation time, ms since epoch.
    pub created_at: i64,
}

impl Model for Credential {
    const TABLE: Table = Table::Tokens;

    fn from_record(record: &Record) -> StoreResult<Self> {
        check_table::<Self>(record)?;
        Ok(Self {
            jwt: required_text(record, "jwt")?,
            created_at: record.integer("created_at"),
        })
    }

    fn to_fields(&self) -> Fields {
        fields([
            ("jwt", FieldValue::from(self.jwt.as_str())),
            ("created_at", FieldValue::from(self.created_at)),
        ])
    }
}

/// Signed-in user profile (`users`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Creation time, ms since epoch.
    pub created_at: i64,
}

impl Model for Profile {
    const TABLE: Table = Table::Users;

    fn from_record(record: &Record) -> StoreResult<Self> {
        check_table::<Self>(record)?;
        Ok(Self {
            name: record.text("name").to_string(),
            email: record.text("email").to_string(),
            created_at: record.integer("created_at"),
        })
    }

    fn to_fields(&self) -> Fields {
        fields([
            ("name", FieldValue::from(self.name.as_str())),
            ("email", FieldValue::from(self.email.as_str())),
            ("created_at", FieldValue::from(self.created_at)),
        ])
    }
}

/// Key/value app-state slot (`app_state`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedState {
    /// Slot name.
    pub key: String,
    /// Slot value.
    pub value: String,
    /// Creation time, ms since epoch.
    pub created_at: i64,
}

impl Model for NamedState {
    const TABLE: Table = Table::AppState;

    fn from_record(record: &Record) -> StoreResult<Self> {
        check_table::<Self>(record)?;
        Ok(Self {
            key: required_text(record, "key")?,
            value: record.text("value").to_string(),
            created_at: record.integer("created_at"),
        })
    }

    fn to_fields(&self) -> Fields {
        fields([
            ("key", FieldValue::from(self.key.as_str())),
            ("value", FieldValue::from(self.value.as_str())),
            ("created_at", FieldValue::from(self.created_at)),
        ])
    }
}

/// A stored recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// Local identity.
    pub id: RecordId,
    /// Title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Ingredients, joined with `", "`.
    pub ingredients: String,
    /// Steps, joined with `"\n"`.
    pub steps: String,
    /// Free-text cooking time.
    pub cooking_time: String,
    /// Remote identity; `None` for a local draft.
    pub remote_id: Option<String>,
}

impl Recipe {
    /// Returns the ingredients as a list.
    pub fn ingredient_list(&self) -> Vec<String> {
        split_list(&self.ingredients, INGREDIENT_SEPARATOR)
    }

    /// Returns the steps as a list.
    pub fn step_list(&self) -> Vec<String> {
        split_list(&self.steps, STEP_SEPARATOR)
    }

    /// Returns true if this recipe has never been acknowledged by the server.
    pub fn is_draft(&self) -> bool {
        self.remote_id.is_none()
    }
}

fn split_list(joined: &str, separator: &str) -> Vec<String> {
    joined
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Model for Recipe {
    const TABLE: Table = Table::Recipes;

    fn from_record(record: &Record) -> StoreResult<Self> {
        check_table::<Self>(record)?;
        Ok(Self {
            id: record.id,
            title: record.text("title").to_string(),
            description: record.text("description").to_string(),
            ingredients: record.text("ingredients").to_string(),
            steps: record.text("steps").to_string(),
            cooking_time: record.text("cooking_time").to_string(),
            remote_id: record.optional_text("remote_id").map(str::to_string),
        })
    }

    fn to_fields(&self) -> Fields {
        fields([
            ("title", FieldValue::from(self.title.as_str())),
            ("description", FieldValue::from(self.description.as_str())),
            ("ingredients", FieldValue::from(self.ingredients.as_str())),
            ("steps", FieldValue::from(self.steps.as_str())),
            ("cooking_time", FieldValue::from(self.cooking_time.as_str())),
            ("remote_id", FieldValue::from(self.remote_id.clone())),
        ])
    }
}

/// User-entered recipe content, before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDraft {
    /// Title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Ingredient list.
    pub ingredients: Vec<String>,
    /// Step list.
    pub steps: Vec<String>,
    /// Free-text cooking time.
    pub cooking_time: String,
}

impl RecipeDraft {
    /// Creates a draft with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds an ingredient.
    #[must_use]
    pub fn ingredient(mut self, ingredient: impl Into<String>) -> Self {
        self.ingredients.push(ingredient.into());
        self
    }

    /// Adds a step.
    #[must_use]
    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Sets the cooking time.
    #[must_use]
    pub fn cooking_time(mut self, cooking_time: impl Into<String>) -> Self {
        self.cooking_time = cooking_time.into();
        self
    }

    /// Returns the content columns. `remote_id` is left out.
    pub fn to_fields(&self) -> Fields {
        fields([
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("ingredients", self.ingredients.join(INGREDIENT_SEPARATOR)),
            ("steps", self.steps.join(STEP_SEPARATOR)),
            ("cooking_time", self.cooking_time.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncStatus;

    fn record(table: Table, fields: Fields) -> Record {
        Record {
            id: RecordId::new(),
            table,
            fields,
            status: SyncStatus::Synced,
            deleted: false,
            seq: 0,
            revision: 1,
        }
    }

    #[test]
    fn recipe_lists_split_on_separators() {
        let draft = RecipeDraft::new("Pasta")
            .ingredient("flour")
            .ingredient("eggs")
            .step("Mix")
            .step("Knead")
            .cooking_time("30 min");
        let recipe = Recipe::from_record(&record(Table::Recipes, draft.to_fields())).unwrap();

        assert_eq!(recipe.ingredients, "flour, eggs");
        assert_eq!(recipe.ingredient_list(), vec!["flour", "eggs"]);
        assert_eq!(recipe.step_list(), vec!["Mix", "Knead"]);
        assert!(recipe.is_draft());
    }

    #[test]
    fn empty_lists_stay_empty() {
        let recipe = Recipe::from_record(&record(Table::Recipes, Fields::new())).unwrap();
        assert!(recipe.ingredient_list().is_empty());
        assert!(recipe.step_list().is_empty());
        assert_eq!(recipe.title, "");
    }

    #[test]
    fn empty_remote_id_reads_as_draft() {
        let r = record(Table::Recipes, fields([("title", "x"), ("remote_id", "")]));
        assert_eq!(Recipe::from_record(&r).unwrap().remote_id, None);
    }

    #[test]
    fn wrong_table_is_rejected() {
        let r = record(Table::Users, fields([("jwt", "abc")]));
        assert!(matches!(
            Credential::from_record(&r),
            Err(StoreError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn credential_requires_token() {
        let r = record(Table::Tokens, fields([("created_at", 5i64)]));
        assert!(Credential::from_record(&r).is_err());

        let cred = Credential {
            jwt: "abc".into(),
            created_at: 5,
        };
        let back = Credential::from_record(&record(Table::Tokens, cred.to_fields())).unwrap();
        assert_eq!(back, cred);
    }
}
