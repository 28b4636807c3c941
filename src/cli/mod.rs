pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "animenews")]
#[command(about = "Anime news feeds, airing schedules and poster images from the terminal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ANIMENEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List configured news sources
    Sources,

    /// Fetch all sources and print the merged headlines, newest first
    News {
        /// Maximum number of entries to print
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Only show entries from this source
        #[arg(short, long)]
        source: Option<String>,

        /// Keep refreshing and print entries not seen before
        #[arg(short, long)]
        watch: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Shows airing on a given day
    Schedule {
        /// monday..sunday, or "today"
        #[arg(default_value = "today")]
        day: String,

        #[arg(long)]
        json: bool,
    },

    /// Shows of the current season
    Seasonal {
        #[arg(long)]
        json: bool,
    },

    /// Search the anime database
    Search {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Show one anime by its database id
    Anime {
        id: u64,

        #[arg(long)]
        json: bool,
    },

    /// Load images through the cache and report what was decoded
    Image {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let Commands::Completions { shell } = self.command {
            commands::generate_completions(shell);
            return Ok(());
        }

        if let Commands::Init { force } = self.command {
            commands::init_logging(self.debug, self.verbose, &Default::default())?;
            return commands::init(self.config, force).await;
        }

        let config = Config::load_or_default(self.config.as_deref())?;
        commands::init_logging(self.debug, self.verbose, &config.logging)?;
        let context = commands::Context::new(config)?;

        match self.command {
            Commands::Sources => commands::list_sources(&context),
            Commands::News { limit, source, watch, json } => {
                if watch {
                    commands::watch_news(&context, source.as_deref()).await
                } else {
                    commands::news(&context, limit, source.as_deref(), json).await
                }
            }
            Commands::Schedule { day, json } => commands::schedule(&context, &day, json).await,
            Commands::Seasonal { json } => commands::seasonal(&context, json).await,
            Commands::Search { query, json } => commands::search(&context, &query, json).await,
            Commands::Anime { id, json } => commands::anime(&context, id, json).await,
            Commands::Image { urls } => commands::images(&context, &urls).await,
            Commands::Init { .. } | Commands::Completions { .. } => Ok(()),
        }
    }
}
