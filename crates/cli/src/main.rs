//! recurchat CLI: the main entry point.
//!
//! Commands:
//! - `chat`     : Interactive chat or single-message mode
//! - `retrieve` : Print the context snippet for a query
//! - `models`   : List configured backends
//! - `onboard`  : Write the default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "recurchat",
    about = "recurchat — document-grounded chat with local language models",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with a model, optionally grounded in a document
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Document to pull context snippets from
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Model identifier (defaults to `default_model`)
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Maximum tokens per reply
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Print the context snippet a query would pull from a document
    Retrieve {
        /// Document to search
        #[arg(short, long)]
        context: PathBuf,

        /// Lines kept on each side of a match
        #[arg(short, long)]
        window: Option<usize>,

        /// Text to look for in each line (case-insensitive)
        query: String,
    },

    /// List configured backends and whether they loaded
    Models,

    /// Write the default configuration file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            context,
            model,
            temperature,
            max_tokens,
        } => {
            commands::chat::run(commands::chat::ChatArgs {
                message,
                context,
                model,
                temperature,
                max_tokens,
            })
            .await?
        }
        Commands::Retrieve {
            context,
            window,
            query,
        } => commands::retrieve::run(context, window, query).await?,
        Commands::Models => commands::models::run().await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
