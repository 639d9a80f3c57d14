//! Command-line front end for the recipe store.
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use pantry::{telemetry, ApiError, ClientConfig, RecipeClient, RecipeInput, RetryScope, Severity, Toaster};

#[derive(Parser, Debug)]
#[command(author, version, about = "Talk to a pantry recipe server")]
struct Cli {
    /// Server base URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Total attempts per call, first try included
    #[arg(long, global = true)]
    attempts: Option<usize>,

    /// Which methods may be retried: conservative or permissive
    #[arg(long, global = true)]
    scope: Option<RetryScope>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List recipes, optionally filtered by ingredient
    List {
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one recipe
    Get { id: String },
    /// Create a recipe
    Add(RecipeFields),
    /// Change a recipe, keeping unspecified fields
    Edit {
        id: String,
        #[command(flatten)]
        fields: EditFields,
        /// Version token to send instead of the one just fetched
        #[arg(long)]
        version: Option<String>,
    },
    /// Delete a recipe
    Rm { id: String },
    /// Manage favorites
    #[command(subcommand)]
    Fav(FavCommand),
}

#[derive(ClapArgs, Debug)]
struct RecipeFields {
    #[arg(short, long)]
    title: String,
    /// Repeat for each ingredient
    #[arg(short, long = "ingredient")]
    ingredients: Vec<String>,
    #[arg(long)]
    instructions: String,
}

#[derive(ClapArgs, Debug)]
struct EditFields {
    #[arg(short, long)]
    title: Option<String>,
    /// Replaces the whole ingredient list
    #[arg(short, long = "ingredient")]
    ingredients: Vec<String>,
    #[arg(long)]
    instructions: Option<String>,
}

#[derive(Subcommand, Debug)]
enum FavCommand {
    Ls,
    Add { id: String },
    Rm { id: String },
}

impl Cli {
    fn config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = ms;
        }
        if let Some(attempts) = self.attempts {
            config.max_attempts = attempts;
        }
        if let Some(scope) = self.scope {
            config.retry_scope = scope;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(&cli.log).context("installing tracing subscriber")?;

    let config = cli.config()?;
    let toaster = Toaster::new(config.toast_duration());
    let cancel = CancellationToken::new();
    let client = config.client()?.with_cancellation(cancel.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let outcome = run(&client, cli.command, &toaster).await;
    let code = match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            toaster.handle_error(&err);
            if let Some(fields) = err.field_errors() {
                eprintln!("{fields}");
            }
            if err.is_cancelled() { ExitCode::from(130) } else { ExitCode::FAILURE }
        }
    };

    for toast in toaster.active() {
        eprintln!("[{}] {}", toast.severity, toast.message);
    }
    Ok(code)
}

async fn run(client: &RecipeClient, command: Command, toaster: &Toaster) -> Result<(), ApiError> {
    match command {
        Command::List { search } => print(&client.list_recipes(search.as_deref()).await?),
        Command::Get { id } => print(&client.get_recipe(&id).await?),
        Command::Add(fields) => {
            let input = RecipeInput::new(fields.title, fields.ingredients, fields.instructions);
            let recipe = client.create_recipe(&input).await?;
            toaster.notify("Recipe created", Severity::Success);
            print(&recipe)
        }
        Command::Edit { id, fields, version } => {
            let current = client.get_recipe(&id).await?;
            let mut input = RecipeInput::from(&current);
            if let Some(title) = fields.title {
                input.title = title;
            }
            if !fields.ingredients.is_empty() {
                input.ingredients = fields.ingredients;
            }
            if let Some(instructions) = fields.instructions {
                input.instructions = instructions;
            }
            let update = input.at_version(version.unwrap_or(current.updated_at));
            let recipe = client.update_recipe(&id, &update).await?;
            toaster.notify("Recipe updated", Severity::Success);
            print(&recipe)
        }
        Command::Rm { id } => {
            client.delete_recipe(&id).await?;
            toaster.notify("Recipe deleted", Severity::Success);
            Ok(())
        }
        Command::Fav(FavCommand::Ls) => print(&client.list_favorites().await?),
        Command::Fav(FavCommand::Add { id }) => {
            let favorites = client.add_favorite(&id).await?;
            toaster.notify("Added to favorites", Severity::Success);
            print(&favorites)
        }
        Command::Fav(FavCommand::Rm { id }) => {
            let favorites = client.remove_favorite(&id).await?;
            toaster.notify("Removed from favorites", Severity::Info);
            print(&favorites)
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<(), ApiError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ApiError::Decode(e.to_string()))?;
    println!("{json}");
    Ok(())
}
