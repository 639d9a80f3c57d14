//! Convenient re-exports for writing a client front end.
pub use crate::{
    client::RecipeClient,
    config::ClientConfig,
    error::ApiError,
    model::{Recipe, RecipeInput, RecipeUpdate},
    retry::{RetryPolicy, RetryScope},
    toast::{Severity, Toaster},
};
