//! Recipe records, request payloads and their shape validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Minimum title length, in characters.
pub const MIN_TITLE_LEN: usize = 3;

pub const TITLE_TOO_SHORT: &str = "Title must be at least 3 characters";
pub const INGREDIENTS_REQUIRED: &str = "At least one ingredient is required";
pub const INGREDIENT_BLANK: &str = "Ingredients cannot be empty";
pub const INSTRUCTIONS_REQUIRED: &str = "Instructions are required";

/// A stored recipe.
///
/// `updated_at` doubles as the optimistic-lock version token: it changes on every successful
/// write, and an update must present the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub updated_at: String,
}

impl Recipe {
    /// Case-insensitive substring match against ingredient names only.
    pub fn has_ingredient_matching(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.ingredients.iter().any(|i| i.to_lowercase().contains(&needle))
    }
}

/// The mutable fields of a recipe, as sent on create.
///
/// Missing fields decode to empty values so that validation, not deserialization, reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: String,
}

impl RecipeInput {
    pub fn new<I, S>(title: impl Into<String>, ingredients: I, instructions: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            ingredients: ingredients.into_iter().map(Into::into).collect(),
            instructions: instructions.into(),
        }
    }

    /// Check the shape of the payload, collecting every failing field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.title.chars().count() < MIN_TITLE_LEN {
            errors.push("title", TITLE_TOO_SHORT);
        }
        if self.ingredients.is_empty() {
            errors.push("ingredients", INGREDIENTS_REQUIRED);
        } else if self.ingredients.iter().any(|i| i.trim().is_empty()) {
            errors.push("ingredients", INGREDIENT_BLANK);
        }
        if self.instructions.is_empty() {
            errors.push("instructions", INSTRUCTIONS_REQUIRED);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Attach the version token read earlier, producing an update payload.
    pub fn at_version(self, updated_at: impl Into<String>) -> RecipeUpdate {
        RecipeUpdate { recipe: self, updated_at: updated_at.into() }
    }
}

impl From<&Recipe> for RecipeInput {
    fn from(recipe: &Recipe) -> Self {
        Self {
            title: recipe.title.clone(),
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
        }
    }
}

/// Update payload: new field values plus the version token the caller last saw.
///
/// A missing `updatedAt` decodes as empty, which never matches a stored stamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeUpdate {
    #[serde(flatten)]
    pub recipe: RecipeInput,
    #[serde(default)]
    pub updated_at: String,
}

/// Per-field validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in self.iter() {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Body of `POST /favorites`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteRequest {
    pub id: String,
}

/// Body returned by `DELETE /recipes/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Body returned by the favorite add/remove routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritesResponse {
    pub success: bool,
    pub favorites: Vec<String>,
}
