use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{Anime, ApiClient, Weekday};
use crate::cli::Cli;
use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use crate::feed::fetcher::FeedFetcher;
use crate::feed::{dedupe_entries, FeedSource, NewsEntry};
use crate::storage::ImageCache;
use crate::throttle::Throttler;

const SUMMARY_PREVIEW_CHARS: usize = 200;

/// Services shared by every command: one throttler for the whole process,
/// handed to both the feed fetcher and the API client.
pub struct Context {
    pub config: Config,
    pub throttler: Arc<Throttler>,
    pub fetcher: FeedFetcher,
    pub api: ApiClient,
    pub images: ImageCache,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let throttler = Arc::new(Throttler::from_settings(&config.throttle));
        let fetcher = FeedFetcher::from_settings(&config.settings)?
            .with_throttler(Arc::clone(&throttler));
        let api = ApiClient::from_config(&config, Arc::clone(&throttler))?;
        let images = ImageCache::with_http(&config.image_cache, &config.settings.user_agent)?;

        Ok(Self {
            config,
            throttler,
            fetcher,
            api,
            images,
        })
    }

    /// Configured sources, optionally narrowed to one name (case-insensitive).
    fn sources(&self, only: Option<&str>) -> Result<Vec<FeedSource>> {
        match only {
            None => Ok(self.config.sources.clone()),
            Some(name) => {
                let matched: Vec<_> = self
                    .config
                    .sources
                    .iter()
                    .filter(|s| s.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    return Err(Error::NotFound(format!("Source '{}' is not configured", name)));
                }
                Ok(matched)
            }
        }
    }
}

/// Write a default configuration file
pub async fn init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_file = match config_path {
        Some(path) => path,
        None => Config::config_file()?,
    };

    if config_file.exists() && !force {
        return Err(Error::AlreadyExists(format!(
            "Configuration file already exists: {} (use --force to overwrite)",
            config_file.display()
        )));
    }

    if let Some(parent) = config_file.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            info!("Created configuration directory: {}", parent.display());
        }
    }

    let config = Config::default();
    config.save(&config_file)?;
    info!("Created default configuration: {}", config_file.display());

    println!("✅ animenews initialized");
    println!("   Config file: {}", config_file.display());
    println!("   Sources: {}", config.sources.len());
    println!();
    println!("Next steps:");
    println!("   animenews news");
    println!("   animenews schedule today");

    Ok(())
}

pub fn list_sources(context: &Context) -> Result<()> {
    let sources = &context.config.sources;
    if sources.is_empty() {
        println!("📋 No sources configured.");
        return Ok(());
    }

    println!("📋 Configured sources ({}):", sources.len());
    for source in sources {
        let marker = if source.is_rate_limited() { " [rate-limited]" } else { "" };
        println!("   📰 {}{}", source.name, marker);
        println!("      {}", source.url);
    }
    println!();
    println!(
        "   Throttle: burst of {}, one token every {:?}",
        context.throttler.capacity(),
        context.throttler.refill_interval()
    );

    Ok(())
}

/// One fetch cycle over the configured sources.
pub async fn news(context: &Context, limit: usize, only: Option<&str>, json: bool) -> Result<()> {
    let sources = context.sources(only)?;
    let entries = context.fetcher.fetch_all(&sources).await;
    let entries: Vec<_> = entries.into_iter().take(limit).collect();

    if json {
        return print_json(&entries);
    }

    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    debug!(printed = entries.len(), "News printed");

    Ok(())
}

/// Refreshes every `refresh_interval` seconds and prints entries not shown
/// before, until interrupted.
pub async fn watch_news(context: &Context, only: Option<&str>) -> Result<()> {
    let sources = context.sources(only)?;
    let period = Duration::from_secs(context.config.settings.refresh_interval.max(1));
    let mut ticker = tokio::time::interval(period);
    let mut seen: HashSet<NewsEntry> = HashSet::new();

    println!("👀 Watching {} sources every {}s (Ctrl-C to stop)", sources.len(), period.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\n👋 Stopped watching");
                return Ok(());
            }
        }

        let entries = dedupe_entries(context.fetcher.fetch_all(&sources).await);
        let fresh = unseen_entries(&mut seen, entries);

        if fresh.is_empty() {
            debug!("No new entries this cycle");
            continue;
        }

        info!(new = fresh.len(), total_seen = seen.len(), "New entries");
        for entry in &fresh {
            println!("{}", format_entry(entry));
        }
    }
}

/// Entries not in `seen`, which is updated with them.
fn unseen_entries(seen: &mut HashSet<NewsEntry>, entries: Vec<NewsEntry>) -> Vec<NewsEntry> {
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

pub async fn schedule(context: &Context, day: &str, json: bool) -> Result<()> {
    let day: Weekday = day.parse()?;
    let anime = context.api.fetch_schedule(day).await?;

    if json {
        return print_json(&anime);
    }

    println!("📅 Airing on {} ({} shows)", day, anime.len());
    print_anime_list(&anime);
    Ok(())
}

pub async fn seasonal(context: &Context, json: bool) -> Result<()> {
    let anime = context.api.fetch_seasonal().await?;

    if json {
        return print_json(&anime);
    }

    println!("🌸 This season ({} shows)", anime.len());
    print_anime_list(&anime);
    Ok(())
}

pub async fn search(context: &Context, query: &str, json: bool) -> Result<()> {
    let anime = context.api.search_anime(query).await?;

    if json {
        return print_json(&anime);
    }

    if anime.is_empty() {
        println!("🔍 No results for '{}'", query);
    } else {
        println!("🔍 {} results for '{}'", anime.len(), query);
        print_anime_list(&anime);
    }
    Ok(())
}

pub async fn anime(context: &Context, id: u64, json: bool) -> Result<()> {
    let anime = context.api.fetch_anime(id).await?;

    if json {
        return print_json(&anime);
    }

    println!("{}", format_anime(&anime));
    if let Some(url) = &anime.image_url {
        println!("   🖼  {}", url);
    }
    Ok(())
}

/// Loads every URL concurrently through the image cache.
pub async fn images(context: &Context, urls: &[String]) -> Result<()> {
    let loads = urls.iter().map(|url| context.images.get(url));
    let results = futures::future::join_all(loads).await;

    for (url, image) in urls.iter().zip(results) {
        match image {
            Some(image) => println!(
                "✅ {} {}x{} ({} bytes) {}",
                image.format,
                image.width,
                image.height,
                image.len(),
                url
            ),
            None => {
                warn!(url = %url, "Image unavailable");
                println!("❌ unavailable {}", url);
            }
        }
    }

    let stats = context.images.stats();
    println!();
    println!(
        "📊 cached: {}, loads: {}, shared: {}, failures: {}",
        context.images.len(),
        stats.misses,
        stats.coalesced,
        stats.failures
    );

    Ok(())
}

/// Generate shell completions
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let cmd_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, cmd_name, &mut std::io::stdout());
}

/// `RUST_LOG` wins; otherwise `--debug`, `--verbose`, then the configured level.
pub fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug")
        } else if verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    });

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug);

    let result = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_anime_list(anime: &[Anime]) {
    for item in anime {
        println!("{}", format_anime(item));
    }
}

fn format_entry(entry: &NewsEntry) -> String {
    let mut out = format!(
        "📰 {}\n   {} · {}\n   {}",
        entry.title,
        entry.source,
        entry.published_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        entry.link
    );

    if !entry.summary.is_empty() {
        out.push_str("\n   ");
        out.push_str(&truncate_chars(&entry.summary, SUMMARY_PREVIEW_CHARS));
    }
    out.push('\n');
    out
}

fn format_anime(anime: &Anime) -> String {
    let score = anime
        .score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "n/a".to_string());
    let episodes = anime
        .episodes
        .map(|e| e.to_string())
        .unwrap_or_else(|| "?".to_string());

    format!(
        "   #{:<6} {}  ⭐ {}  📺 {} eps",
        anime.mal_id, anime.title, score, episodes
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}
