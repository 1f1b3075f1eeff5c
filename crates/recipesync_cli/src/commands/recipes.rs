//! Local recipe commands.

use super::open_store;
use recipesync_store::{Recipe, RecipeDraft, RecordId};
use serde::Serialize;
use std::path::Path;

/// A recipe as printed by `list --format json`.
#[derive(Debug, Serialize)]
pub struct RecipeRow {
    /// Local ID.
    pub id: String,
    /// Server ID, once the server has assigned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Ingredients, in order.
    pub ingredients: Vec<String>,
    /// Steps, in order.
    pub steps: Vec<String>,
    /// Cooking time.
    pub cooking_time: String,
}

impl From<&Recipe> for RecipeRow {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.to_string(),
            remote_id: recipe.remote_id.clone(),
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            ingredients: recipe.ingredient_list(),
            steps: recipe.step_list(),
            cooking_time: recipe.cooking_time.clone(),
        }
    }
}

/// Builds a draft from command-line values.
pub fn draft(
    title: String,
    description: String,
    ingredients: Vec<String>,
    steps: Vec<String>,
    cooking_time: String,
) -> RecipeDraft {
    let draft = ingredients
        .into_iter()
        .fold(RecipeDraft::new(title).description(description), RecipeDraft::ingredient);
    steps
        .into_iter()
        .fold(draft, RecipeDraft::step)
        .cooking_time(cooking_time)
}

/// Adds a local recipe.
pub fn add(path: &Path, draft: &RecipeDraft) -> Result<(), Box<dyn std::error::Error>> {
    if draft.title.trim().is_empty() {
        return Err("title must not be empty".into());
    }
    let store = open_store(path)?;
    let recipe = store.create_recipe(draft)?;
    println!("Added {} ({})", recipe.title, recipe.id);
    Ok(())
}

/// Lists live recipes.
pub fn list(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let rows: Vec<RecipeRow> = store.recipes().iter().map(RecipeRow::from).collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => print!("{}", render_text(&rows)),
    }
    Ok(())
}

fn render_text(rows: &[RecipeRow]) -> String {
    if rows.is_empty() {
        return "No recipes\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let remote = row.remote_id.as_deref().unwrap_or("draft");
        out.push_str(&format!("{}  [{}]  {}\n", row.id, remote, row.title));
        if !row.ingredients.is_empty() {
            out.push_str(&format!("    ingredients: {}\n", row.ingredients.join(", ")));
        }
        if !row.cooking_time.is_empty() {
            out.push_str(&format!("    cooking time: {}\n", row.cooking_time));
        }
    }
    out
}

/// Deletes a recipe by local ID.
pub fn delete(path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = RecordId::parse(id).ok_or_else(|| format!("not a recipe id: {id}"))?;
    let store = open_store(path)?;
    let recipe = store.recipe(id)?;
    store.delete_recipe(id)?;
    println!("Deleted {}", recipe.title);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipesync_store::LocalStore;

    #[test]
    fn draft_keeps_argument_order() {
        let draft = draft(
            "Pancakes".into(),
            "Fluffy".into(),
            vec!["flour".into(), "milk".into()],
            vec!["Whisk".into(), "Fry".into()],
            "15 min".into(),
        );
        assert_eq!(draft.ingredients, vec!["flour", "milk"]);
        assert_eq!(draft.steps, vec!["Whisk", "Fry"]);
        assert_eq!(draft.cooking_time, "15 min");
    }

    #[test]
    fn text_listing_marks_drafts() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .create_recipe(&RecipeDraft::new("Toast").ingredient("bread"))
            .unwrap();
        let rows: Vec<RecipeRow> = store.recipes().iter().map(RecipeRow::from).collect();

        let text = render_text(&rows);
        assert!(text.contains("[draft]  Toast"));
        assert!(text.contains("ingredients: bread"));
        assert_eq!(render_text(&[]), "No recipes\n");
    }

    #[test]
    fn add_then_delete_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.rsj");

        add(&path, &RecipeDraft::new("Soup")).unwrap();
        let id = LocalStore::open(&path).unwrap().recipes()[0].id;
        delete(&path, &id.to_string()).unwrap();

        let store = LocalStore::open(&path).unwrap();
        assert!(store.recipes().is_empty());
        assert_eq!(store.pending_changes(recipesync_store::Table::Recipes).len(), 0);
        assert!(add(&path, &RecipeDraft::new("  ")).is_err());
    }
}
