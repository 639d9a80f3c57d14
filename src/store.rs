//! In-memory recipe and favorite collections.
//!
//! The store is the sole owner of both collections. A [`FaultPolicy`] runs ahead of each
//! operation; only once it lets the call through is state read or written. Each mutation holds
//! the write lock for its whole check-and-write, so an update's version check and its write can
//! never interleave with another writer.

use crate::clock::{next_stamp, Clock, SystemClock};
use crate::faults::{FaultPolicy, NoFaults, Operation};
use crate::model::{Recipe, RecipeInput, RecipeUpdate};
use crate::StoreError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Collections {
    recipes: Vec<Recipe>,
    /// Insertion-ordered, duplicate-free. Entries may outlive their recipe.
    favorites: Vec<String>,
}

/// Cheaply cloneable handle to one shared set of collections.
#[derive(Clone)]
pub struct RecipeStore {
    inner: Arc<RwLock<Collections>>,
    faults: Arc<dyn FaultPolicy>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RecipeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeStore")
            .field("faults", &self.faults)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for RecipeStore {
    fn default() -> Self {
        Self::new(NoFaults)
    }
}

impl RecipeStore {
    pub fn new<F>(faults: F) -> Self
    where
        F: FaultPolicy + 'static,
    {
        Self::with_shared_faults(Arc::new(faults))
    }

    pub fn with_shared_faults(faults: Arc<dyn FaultPolicy>) -> Self {
        Self { inner: Arc::default(), faults, clock: Arc::new(SystemClock) }
    }

    /// Replace the clock used for version stamps.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Number of stored recipes. Bypasses fault injection.
    pub async fn recipe_count(&self) -> usize {
        self.inner.read().await.recipes.len()
    }

    /// All recipes in insertion order, optionally filtered by ingredient substring.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Recipe>, StoreError> {
        self.faults.inject(Operation::ListRecipes).await?;
        let state = self.inner.read().await;
        let recipes = match search.filter(|s| !s.is_empty()) {
            Some(needle) => {
                state.recipes.iter().filter(|r| r.has_ingredient_matching(needle)).cloned().collect()
            }
            None => state.recipes.clone(),
        };
        tracing::debug!(search, count = recipes.len(), "listed recipes");
        Ok(recipes)
    }

    pub async fn get(&self, id: &str) -> Result<Recipe, StoreError> {
        self.faults.inject(Operation::GetRecipe).await?;
        let state = self.inner.read().await;
        state
            .recipes
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    pub async fn create(&self, input: RecipeInput) -> Result<Recipe, StoreError> {
        self.faults.inject(Operation::CreateRecipe).await?;
        input.validate().map_err(StoreError::Validation)?;

        let recipe = Recipe {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            ingredients: input.ingredients,
            instructions: input.instructions,
            updated_at: next_stamp(self.clock.as_ref(), None),
        };
        self.inner.write().await.recipes.push(recipe.clone());
        tracing::debug!(id = %recipe.id, "created recipe");
        Ok(recipe)
    }

    /// Replace the mutable fields of `id`, provided `update.updated_at` is still current.
    pub async fn update(&self, id: &str, update: RecipeUpdate) -> Result<Recipe, StoreError> {
        self.faults.inject(Operation::UpdateRecipe).await?;

        let mut state = self.inner.write().await;
        let slot = state
            .recipes
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if slot.updated_at != update.updated_at {
            tracing::debug!(id, expected = %update.updated_at, current = %slot.updated_at, "version conflict");
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: update.updated_at,
                current: slot.updated_at.clone(),
            });
        }
        update.recipe.validate().map_err(StoreError::Validation)?;

        let RecipeInput { title, ingredients, instructions } = update.recipe;
        slot.title = title;
        slot.ingredients = ingredients;
        slot.instructions = instructions;
        slot.updated_at = next_stamp(self.clock.as_ref(), Some(&slot.updated_at));
        tracing::debug!(id, version = %slot.updated_at, "updated recipe");
        Ok(slot.clone())
    }

    /// Remove `id`. Absent ids are not an error. Favorites referencing it are kept.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.faults.inject(Operation::DeleteRecipe).await?;
        let mut state = self.inner.write().await;
        let before = state.recipes.len();
        state.recipes.retain(|r| r.id != id);
        tracing::debug!(id, removed = before != state.recipes.len(), "deleted recipe");
        Ok(())
    }

    pub async fn list_favorites(&self) -> Result<Vec<String>, StoreError> {
        self.faults.inject(Operation::ListFavorites).await?;
        Ok(self.inner.read().await.favorites.clone())
    }

    /// Mark `id` as favorite. The recipe must currently exist; repeated adds are no-ops.
    pub async fn add_favorite(&self, id: &str) -> Result<Vec<String>, StoreError> {
        self.faults.inject(Operation::AddFavorite).await?;
        let mut state = self.inner.write().await;
        if !state.recipes.iter().any(|r| r.id == id) {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        if !state.favorites.iter().any(|f| f == id) {
            state.favorites.push(id.to_string());
        }
        Ok(state.favorites.clone())
    }

    /// Unmark `id`. Succeeds whether or not it was a favorite, or exists at all.
    pub async fn remove_favorite(&self, id: &str) -> Result<Vec<String>, StoreError> {
        self.faults.inject(Operation::RemoveFavorite).await?;
        let mut state = self.inner.write().await;
        state.favorites.retain(|f| f != id);
        Ok(state.favorites.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::faults::AlwaysFail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn soup() -> RecipeInput {
        RecipeInput::new("Soup", ["Water", "Salt"], "Boil")
    }

    /// Delegates to `NoFaults` while recording which operations ran.
    #[derive(Debug, Default)]
    struct Recording(Mutex<Vec<Operation>>);

    #[async_trait]
    impl FaultPolicy for Recording {
        async fn inject(&self, op: Operation) -> Result<(), StoreError> {
            self.0.lock().unwrap().push(op);
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_then_search_scenario() {
        let store = RecipeStore::default();
        let created = store.create(soup()).await.unwrap();
        assert!(Uuid::parse_str(&created.id).is_ok());
        assert!(!created.updated_at.is_empty());

        assert_eq!(store.list(None).await.unwrap(), vec![created.clone()]);
        assert_eq!(store.list(Some("salt")).await.unwrap(), vec![created]);
        assert!(store.list(Some("pepper")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_ignores_title_and_instructions() {
        let store = RecipeStore::default();
        let tomato =
            store.create(RecipeInput::new("Bread salad", ["Tomato"], "Toast bread")).await.unwrap();
        store.create(RecipeInput::new("Omelette", ["Egg"], "Whisk")).await.unwrap();

        assert_eq!(store.list(Some("tom")).await.unwrap(), vec![tomato]);
        assert!(store.list(Some("bread")).await.unwrap().is_empty());
        assert_eq!(store.list(Some("")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let store = RecipeStore::default();
        let titles = ["Apple pie", "Banana bread", "Cherry tart"];
        for title in titles {
            store.create(RecipeInput::new(title, ["Flour"], "Bake")).await.unwrap();
        }
        let listed: Vec<_> = store.list(None).await.unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(listed, titles);
    }

    #[tokio::test]
    async fn invalid_create_changes_nothing() {
        let store = RecipeStore::default();
        let bad = [
            RecipeInput::new("Soup", ["  "], "Boil"),
            RecipeInput::new("Soup", Vec::<String>::new(), "Boil"),
            RecipeInput::new("So", ["Water"], "Boil"),
            RecipeInput::new("Soup", ["Water"], ""),
        ];
        for input in bad {
            let err = store.create(input).await.unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "{err:?}");
        }
        assert_eq!(store.recipe_count().await, 0);
    }

    #[tokio::test]
    async fn update_advances_version_and_rejects_stale_token() {
        let clock = ManualClock::default();
        let store = RecipeStore::default().with_clock(clock);
        let original = store.create(soup()).await.unwrap();

        let edited = RecipeInput::new("Salty soup", ["Water", "Salt", "Salt"], "Boil longer");
        let updated =
            store.update(&original.id, edited.clone().at_version(&original.updated_at)).await.unwrap();
        assert_ne!(updated.updated_at, original.updated_at);
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.title, "Salty soup");

        let err = store.update(&original.id, edited.at_version(&original.updated_at)).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                id: original.id.clone(),
                expected: original.updated_at,
                current: updated.updated_at.clone(),
            }
        );
        assert_eq!(store.get(&original.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = RecipeStore::default();
        let err = store.update("missing", soup().at_version("whatever")).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound { id: "missing".into() });
    }

    #[tokio::test]
    async fn update_validates_payload() {
        let store = RecipeStore::default();
        let original = store.create(soup()).await.unwrap();
        let bad = RecipeInput::new("Soup", [""], "Boil").at_version(&original.updated_at);
        assert!(matches!(store.update(&original.id, bad).await, Err(StoreError::Validation(_))));
        assert_eq!(store.get(&original.id).await.unwrap(), original);
    }

    #[tokio::test]
    async fn update_reports_missing_and_stale_before_bad_payload() {
        let store = RecipeStore::default();
        let original = store.create(soup()).await.unwrap();

        let bad = RecipeInput::new("ab", Vec::<String>::new(), "").at_version(&original.updated_at);
        assert!(matches!(store.update("missing", bad).await, Err(StoreError::NotFound { .. })));

        let stale_and_bad = RecipeInput::new("ab", Vec::<String>::new(), "").at_version("stale");
        assert!(matches!(
            store.update(&original.id, stale_and_bad).await,
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(store.get(&original.id).await.unwrap(), original);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_keeps_favorites() {
        let store = RecipeStore::default();
        let recipe = store.create(soup()).await.unwrap();
        store.add_favorite(&recipe.id).await.unwrap();

        store.delete(&recipe.id).await.unwrap();
        store.delete(&recipe.id).await.unwrap();
        store.delete("never-existed").await.unwrap();

        assert_eq!(store.recipe_count().await, 0);
        assert_eq!(store.list_favorites().await.unwrap(), vec![recipe.id]);
    }

    #[tokio::test]
    async fn favorites_require_existing_recipe_and_deduplicate() {
        let store = RecipeStore::default();
        let err = store.add_favorite("ghost").await.unwrap_err();
        assert_eq!(err, StoreError::NotFound { id: "ghost".into() });

        let recipe = store.create(soup()).await.unwrap();
        assert_eq!(store.add_favorite(&recipe.id).await.unwrap(), vec![recipe.id.clone()]);
        assert_eq!(store.add_favorite(&recipe.id).await.unwrap(), vec![recipe.id.clone()]);

        assert!(store.remove_favorite(&recipe.id).await.unwrap().is_empty());
        assert!(store.remove_favorite(&recipe.id).await.unwrap().is_empty());
        assert!(store.remove_favorite("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_leave_state_untouched() {
        let healthy = RecipeStore::default();
        let recipe = healthy.create(soup()).await.unwrap();
        let failing = RecipeStore { faults: Arc::new(AlwaysFail), ..healthy.clone() };

        assert!(matches!(failing.create(soup()).await, Err(StoreError::Transient(_))));
        let update = soup().at_version(&recipe.updated_at);
        assert!(matches!(failing.update(&recipe.id, update).await, Err(StoreError::Transient(_))));
        assert!(matches!(failing.delete(&recipe.id).await, Err(StoreError::Transient(_))));
        assert!(matches!(failing.add_favorite(&recipe.id).await, Err(StoreError::Transient(_))));

        assert_eq!(healthy.list(None).await.unwrap(), vec![recipe]);
        assert!(healthy.list_favorites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fault_policy_runs_before_every_operation() {
        let recording = Arc::new(Recording::default());
        let store = RecipeStore::with_shared_faults(recording.clone());

        let recipe = store.create(soup()).await.unwrap();
        store.list(None).await.unwrap();
        store.get(&recipe.id).await.unwrap();
        store.update(&recipe.id, soup().at_version(&recipe.updated_at)).await.unwrap();
        store.add_favorite(&recipe.id).await.unwrap();
        store.list_favorites().await.unwrap();
        store.remove_favorite(&recipe.id).await.unwrap();
        store.delete(&recipe.id).await.unwrap();

        assert_eq!(
            *recording.0.lock().unwrap(),
            vec![
                Operation::CreateRecipe,
                Operation::ListRecipes,
                Operation::GetRecipe,
                Operation::UpdateRecipe,
                Operation::AddFavorite,
                Operation::ListFavorites,
                Operation::RemoveFavorite,
                Operation::DeleteRecipe,
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_updates_with_same_token_admit_exactly_one() {
        let store = RecipeStore::default();
        let recipe = store.create(soup()).await.unwrap();

        let attempts = (0..8).map(|i| {
            let store = store.clone();
            let update = RecipeInput::new(format!("Soup #{i}"), ["Water"], "Boil")
                .at_version(&recipe.updated_at);
            let id = recipe.id.clone();
            tokio::spawn(async move { store.update(&id, update).await })
        });
        let results = futures::future::join_all(attempts).await;

        let winners = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        let conflicts =
            results.iter().filter(|r| matches!(r, Ok(Err(StoreError::Conflict { .. })))).count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
    }
}
