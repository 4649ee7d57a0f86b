mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sightings::config::SightingsConfig;
use sightings::sighting::{Page, SightingStore};

#[derive(Parser)]
#[command(name = "sightings", version, about = "Log and search fnord sightings")]
struct Cli {
    /// Log at debug level regardless of configuration
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a new sighting
    Add {
        /// Where it was found (News, Walk, Code, Dream, ...)
        #[arg(long)]
        source: String,
        /// What was seen
        #[arg(long)]
        summary: String,
        /// When it was seen, ISO 8601 (defaults to now)
        #[arg(long)]
        when: Option<String>,
        /// Human-readable location
        #[arg(long)]
        place: Option<String>,
        /// JSON object of extra details
        #[arg(long)]
        metadata: Option<String>,
        /// JSON array of tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Print the number of recorded sightings
    Count,
    /// List sightings, most recent first
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print JSON instead of one line per sighting
        #[arg(long)]
        json: bool,
    },
    /// Show one sighting
    Get {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Change some fields of a sighting (an empty value clears place, metadata or tags)
    Update {
        id: i64,
        #[arg(long)]
        when: Option<String>,
        #[arg(long)]
        place: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Permanently delete a sighting
    Delete { id: i64 },
    /// Search sightings by meaning (with embeddings) or substring
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Cosine distance cutoff for semantic search (0.0 to 2.0)
        #[arg(long)]
        max_distance: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Start the MCP server (stdio unless --http)
    Serve {
        /// Serve Streamable HTTP at http://HOST:PORT/mcp instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Check backend health and embedding configuration
    Doctor,
    /// Write all sightings as JSON to stdout
    Export,
    /// Restore sightings from an export file
    Import { file: PathBuf },
    /// Regenerate every embedding with the configured model
    ReEmbed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SightingsConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC and command output.
    let level = if cli.verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Doctor => {
            let store = SightingStore::from_config(&config)?;
            if let Err(e) = store.initialize().await {
                tracing::warn!(error = %e, "store did not initialize cleanly");
            }
            cli::doctor::doctor(&config, &store).await?;
        }
        // Skips `initialize`: it refuses to run when stored vectors have the wrong width.
        Command::ReEmbed => {
            let store = SightingStore::from_config(&config)?;
            cli::re_embed::re_embed(&config, &store).await?;
        }
        Command::Add {
            source,
            summary,
            when,
            place,
            metadata,
            tags,
        } => {
            let store = cli::open_store(&config).await?;
            let args = cli::add::AddArgs {
                source,
                summary,
                when,
                place,
                metadata,
                tags,
            };
            cli::add::add(&store, args).await?;
        }
        Command::Count => {
            let store = cli::open_store(&config).await?;
            cli::list::count(&store).await?;
        }
        Command::List {
            limit,
            offset,
            json,
        } => {
            let store = cli::open_store(&config).await?;
            cli::list::list(&store, Page::new(limit, offset), json).await?;
        }
        Command::Get { id, json } => {
            let store = cli::open_store(&config).await?;
            cli::list::get(&store, id, json).await?;
        }
        Command::Update {
            id,
            when,
            place,
            source,
            summary,
            metadata,
            tags,
        } => {
            let store = cli::open_store(&config).await?;
            let args = cli::update::UpdateArgs {
                when,
                place,
                source,
                summary,
                metadata,
                tags,
            };
            cli::update::update(&store, id, args).await?;
        }
        Command::Delete { id } => {
            let store = cli::open_store(&config).await?;
            cli::update::delete(&store, id).await?;
        }
        Command::Search {
            query,
            limit,
            offset,
            max_distance,
            json,
        } => {
            let store = cli::open_store(&config).await?;
            let page = Page::new(limit, offset);
            cli::search::search(&store, &query, page, max_distance, json).await?;
        }
        Command::Export => {
            let store = cli::open_store(&config).await?;
            cli::export::export(&store).await?;
        }
        Command::Import { file } => {
            let store = cli::open_store(&config).await?;
            cli::import::import(&store, &file).await?;
        }
    }

    Ok(())
}
