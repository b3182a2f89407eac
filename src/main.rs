//! # docviz CLI
//!
//! ## Usage
//!
//! ```bash
//! docviz --config ./config/docviz.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docviz init` | Create the SQLite session schema |
//! | `docviz serve` | Start the HTTP server |
//! | `docviz segment <file>` | Print the chunks of a document |
//! | `docviz search "<query>" <files>...` | Rank chunks of local documents |
//! | `docviz context "<query>" <files>...` | Print the context an answer would use |
//! | `docviz profile <file>` | Print the dashboard generated for a table |
//!
//! `segment`, `search`, `context`, and `profile` fall back to built-in
//! defaults when the config file does not exist.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docviz::config::{self, Config};
use docviz::{inspect, migrate, server};

/// docviz: document Q&A and data dashboards.
#[derive(Parser)]
#[command(
    name = "docviz",
    about = "Document question answering and tabular dashboards",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docviz.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the session database schema.
    ///
    /// Idempotent. Only meaningful with `[store] backend = "sqlite"`.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Split a document into chunks and print them.
    Segment {
        /// Document to segment (pdf, doc, docx, txt).
        file: PathBuf,

        /// Target chunk size in characters.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared between consecutive chunks.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Rank the chunks of local documents against a query.
    Search {
        query: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the context block an answer to the query would be given.
    Context {
        query: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Profile a table (csv, xlsx, json) and print its dashboard.
    Profile {
        file: PathBuf,

        /// Print the dashboard as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file, or defaults when it does not exist.
fn config_or_defaults(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let cfg = config::load_config(&cli.config)?;
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Segment {
            file,
            chunk_size,
            overlap,
        } => {
            let cfg = config_or_defaults(&cli.config)?;
            inspect::run_segment(&cfg, &file, chunk_size, overlap)?;
        }
        Commands::Search {
            query,
            files,
            limit,
        } => {
            let cfg = config_or_defaults(&cli.config)?;
            inspect::run_search(&cfg, &query, &files, limit)?;
        }
        Commands::Context { query, files } => {
            let cfg = config_or_defaults(&cli.config)?;
            inspect::run_context(&cfg, &query, &files)?;
        }
        Commands::Profile { file, json } => {
            inspect::run_profile(&file, json)?;
        }
    }

    Ok(())
}
