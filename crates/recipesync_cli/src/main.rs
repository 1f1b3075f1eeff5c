//! recipesync CLI
//!
//! Command-line client for a local recipe store kept in sync with the
//! recipe server.
//!
//! # Commands
//!
//! - `login` / `logout` - Store or clear the session credential
//! - `add`, `list`, `delete` - Edit local recipes
//! - `sync` - Run one pull, merge and push round
//! - `inspect` - Display store statistics
//! - `compact` - Purge synced tombstones and checkpoint the journal
//! - `app-state` - Read or write app-state flags

mod commands;
mod http_client;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offline-first recipe client.
#[derive(Parser)]
#[command(name = "recipesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store journal
    #[arg(global = true, short, long, default_value = "recipesync.rsj")]
    path: PathBuf,

    /// Base URL of the recipe server
    #[arg(global = true, long, default_value = recipesync_engine::DEFAULT_BASE_URL)]
    server: String,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session token and profile
    Login {
        /// Bearer token issued by the server
        #[arg(short, long)]
        token: String,

        /// Display name
        #[arg(short, long, default_value = "")]
        name: String,

        /// Email address
        #[arg(short, long, default_value = "")]
        email: String,
    },

    /// Push pending changes, then clear the session
    Logout,

    /// Add a local recipe
    Add {
        /// Recipe title
        title: String,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Ingredient (repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,

        /// Step (repeatable)
        #[arg(short, long = "step")]
        steps: Vec<String>,

        /// Cooking time
        #[arg(short, long, default_value = "")]
        cooking_time: String,
    },

    /// List live recipes
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a recipe by local ID
    Delete {
        /// Local recipe ID
        id: String,
    },

    /// Run one sync round
    Sync,

    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Purge synced tombstones and checkpoint the journal
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Read, write or clear an app-state flag
    AppState {
        /// Flag name; lists every flag when omitted
        key: Option<String>,

        /// New value
        value: Option<String>,

        /// Clear the flag
        #[arg(long, conflicts_with = "value")]
        clear: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let remote = commands::Remote {
        server: cli.server,
        timeout: std::time::Duration::from_secs(cli.timeout),
    };

    match cli.command {
        Commands::Login { token, name, email } => {
            commands::session::login(&cli.path, &token, &name, &email)?;
        }
        Commands::Logout => {
            commands::session::logout(&cli.path, &remote)?;
        }
        Commands::Add {
            title,
            description,
            ingredients,
            steps,
            cooking_time,
        } => {
            let draft = commands::recipes::draft(title, description, ingredients, steps, cooking_time);
            commands::recipes::add(&cli.path, &draft)?;
        }
        Commands::List { format } => {
            commands::recipes::list(&cli.path, &format)?;
        }
        Commands::Delete { id } => {
            commands::recipes::delete(&cli.path, &id)?;
        }
        Commands::Sync => {
            commands::sync::run(&cli.path, &remote)?;
        }
        Commands::Inspect { format } => {
            commands::inspect::run(&cli.path, &format)?;
        }
        Commands::Compact { dry_run } => {
            commands::compact::run(&cli.path, dry_run)?;
        }
        Commands::AppState { key, value, clear } => {
            commands::app_state::run(&cli.path, key.as_deref(), value.as_deref(), clear)?;
        }
    }

    Ok(())
}
