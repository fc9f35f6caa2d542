//! localecho CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write the default config
//! - `agent`    — Interactive chat or single-message mode
//! - `gateway`  — Start the HTTP API server
//! - `status`   — Show configuration and model state
//! - `models`   — List, swap, sleep or wake models
//! - `tasks`    — List tasks
//! - `notes`    — Maintain the note index
//! - `archives` — Browse session archives

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "localecho",
    about = "localecho — a private assistant running on this machine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.localecho/config.toml
    #[arg(long, global = true, env = "LOCALECHO_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Chat with Echo
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and model state
    Status,

    /// Manage the chat and embedding models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Inspect tasks
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },

    /// Maintain saved notes
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },

    /// Browse session archives
    Archives {
        #[command(subcommand)]
        action: ArchivesAction,
    },
}

#[derive(Subcommand)]
pub enum ModelsAction {
    /// List installed models
    List,
    /// Swap to another model directory
    Swap {
        /// Model directory
        path: String,
        /// Swap the embedding model instead of the chat model
        #[arg(long)]
        embedding: bool,
    },
    /// Unload every model
    Sleep,
    /// Reload the last selection
    Wake,
}

#[derive(Subcommand)]
pub enum TasksAction {
    /// List tasks
    List {
        /// pending, completed or archived
        #[arg(short, long)]
        status: Option<String>,
    },
    /// List archived tasks
    Archived,
}

#[derive(Subcommand)]
pub enum NotesAction {
    /// Embed every note saved without a vector
    Reindex,
}

#[derive(Subcommand)]
pub enum ArchivesAction {
    /// List archive files
    List,
    /// Print one archive
    Show { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Agent { message } => commands::agent::run(config_path, message).await?,
        Commands::Gateway { port } => commands::gateway::run(config_path, port).await?,
        Commands::Status => commands::status::run(config_path).await?,
        Commands::Models { action } => commands::models::run(config_path, action).await?,
        Commands::Tasks { action } => commands::tasks::run(config_path, action).await?,
        Commands::Notes { action } => commands::notes::run(config_path, action).await?,
        Commands::Archives { action } => commands::archives::run(config_path, action).await?,
    }

    Ok(())
}
