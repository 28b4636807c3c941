use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::feed::parser::FeedParser;
use crate::feed::{FeedSource, NewsEntry};
use crate::throttle::Throttler;

const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml, text/xml, */*";

/// Fetches feed sources and merges them into one newest-first list.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    timeout_duration: Duration,
    user_agent: String,
    max_feed_size: usize,
    throttler: Option<Arc<Throttler>>,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .build()
            .map_err(|e| Error::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_duration: settings.timeout(),
            user_agent: settings.user_agent.clone(),
            max_feed_size: settings.max_feed_size,
            throttler: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_max_feed_size(mut self, max_feed_size: usize) -> Self {
        self.max_feed_size = max_feed_size;
        self
    }

    /// Throttler consulted before every request to a rate-limited source.
    pub fn with_throttler(mut self, throttler: Arc<Throttler>) -> Self {
        self.throttler = Some(throttler);
        self
    }

    /// Fetches every source concurrently and returns their entries newest first.
    ///
    /// Never fails: a failing source contributes nothing, and when no source
    /// yields anything the [`NewsEntry::fallback`] set is returned instead.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> Vec<NewsEntry> {
        let fetches = sources.iter().map(|source| async move {
            match self.fetch_source(source).await {
                Ok(entries) => {
                    debug!(source = %source.name, count = entries.len(), "Source fetched");
                    entries
                }
                Err(e) => {
                    warn!(
                        source = %source.name,
                        url = %source.url,
                        code = e.error_code(),
                        error = %e,
                        "Source failed, skipping"
                    );
                    Vec::new()
                }
            }
        });

        let mut entries: Vec<NewsEntry> = futures::future::join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect();

        if entries.is_empty() {
            info!(sources = sources.len(), "No entries from any source, using fallback set");
            return NewsEntry::fallback();
        }

        entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        info!(sources = sources.len(), entries = entries.len(), "Fetch cycle complete");
        entries
    }

    /// Fetches and parses a single source, surfacing the failure.
    pub async fn fetch_source(&self, source: &FeedSource) -> Result<Vec<NewsEntry>> {
        validate_feed_url(&source.url)?;

        if source.is_rate_limited() {
            match &self.throttler {
                Some(throttler) => throttler.acquire().await,
                None => warn!(source = %source.name, "Rate-limited source fetched without a throttler"),
            }
        }

        let bytes = timeout(self.timeout_duration, self.download(&source.url))
            .await
            .map_err(|_| Error::Timeout(format!("Request to {} timed out", source.url)))??;

        debug!(source = %source.name, bytes = bytes.len(), "Downloaded feed");

        let outcome = FeedParser::new(source.name.clone()).parse(&bytes);
        if outcome.skipped > 0 {
            debug!(source = %source.name, skipped = outcome.skipped, "Entries without title or link skipped");
        }

        match outcome.error {
            Some(error) if outcome.entries.is_empty() => Err(Error::FeedParse(error)),
            _ => Ok(outcome.entries),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.fetch_response(url).await?;

        if !response.status().is_success() {
            return Err(Error::HttpError(format!(
                "HTTP {} for {}: {}",
                response.status().as_u16(),
                url,
                response.status().canonical_reason().unwrap_or("Unknown error")
            )));
        }

        read_limited_bytes(response, self.max_feed_size).await
    }

    async fn fetch_response(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("Request failed: {}", e)))?;

        Ok(response)
    }
}

async fn read_limited_bytes(mut response: Response, limit: usize) -> Result<Vec<u8>> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(Error::ResponseTooLarge(format!("{} bytes exceeds {}", len, limit)));
        }
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::HttpError(format!("Failed to read response body: {}", e)))?
    {
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(Error::ResponseTooLarge(format!("body exceeds {} bytes", limit)));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

pub fn validate_feed_url(url: &str) -> Result<()> {
    let parsed_url = url::Url::parse(url)
        .map_err(|e| Error::InvalidUrl(format!("Invalid URL: {}", e)))?;

    match parsed_url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::InvalidUrl(format!("Unsupported scheme: {}", scheme))),
    }
}
