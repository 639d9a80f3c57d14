#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Pantry
//!
//! An in-memory recipe and favorites store served over HTTP, plus a client that survives it.
//!
//! The server side ([`RecipeStore`], [`server`]) runs every operation through a
//! [`FaultPolicy`](faults::FaultPolicy) that can add latency and fail mutations on purpose.
//! Updates use optimistic concurrency: the caller echoes the `updatedAt` it last saw, and a
//! stale value is refused with a conflict.
//!
//! The client side ([`RecipeClient`]) bounds every attempt with a timeout, honors a
//! cancellation token, and retries according to a method-aware [`RetryPolicy`]. Terminal
//! failures are reduced to one user-facing message by [`classify`] and shown through a
//! self-expiring [`Toaster`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pantry::{ClientConfig, RecipeInput, Toaster};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = ClientConfig::default().client()?;
//! let toaster = Toaster::default();
//!
//! let input = RecipeInput::new("Pancakes", ["flour", "milk", "eggs"], "Whisk, then fry.");
//! match client.create_recipe(&input).await {
//!     Ok(recipe) => println!("saved {}", recipe.id),
//!     Err(err) => {
//!         toaster.handle_error(&err);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod classify;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod faults;
pub mod model;
pub mod prelude;
pub mod retry;
pub mod server;
pub mod sleeper;
pub mod store;
pub mod telemetry;
pub mod toast;

// Re-exports
pub use backoff::{Backoff, BackoffError, Jitter};
pub use classify::{classify, Failure, MessageKind};
pub use client::RecipeClient;
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use error::{ApiError, ErrorBody, StoreError};
pub use faults::{AlwaysFail, FaultPolicy, NoFaults, Operation, RandomFaults};
pub use model::{FieldErrors, Recipe, RecipeInput, RecipeUpdate};
pub use retry::{BuildError, RetryPolicy, RetryPolicyBuilder, RetryScope};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use store::RecipeStore;
pub use toast::{Severity, Toast, ToastEvent, ToastId, Toaster};
