//! Client for the rate-limited anime database API (Jikan v4).
//!
//! Every request takes a token from the shared [`Throttler`] first, so all
//! clients built on the same throttler stay under the published limit together.

pub mod schedule;

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::throttle::Throttler;

pub use schedule::{Anime, AnimeRecord, JikanItem, JikanList, Pagination, Weekday};

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    throttler: Arc<Throttler>,
    timeout_duration: Duration,
    user_agent: String,
}

impl ApiClient {
    pub fn new(base_url: &str, throttler: Arc<Throttler>) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| Error::InvalidUrl(format!("Invalid API base URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!("Unsupported scheme: {}", parsed.scheme())));
        }

        let client = Client::builder()
            .gzip(true)
            .build()
            .map_err(|e| Error::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            throttler,
            timeout_duration: Duration::from_secs(15),
            user_agent: format!("animenews/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn from_config(config: &Config, throttler: Arc<Throttler>) -> Result<Self> {
        Ok(Self::new(&config.api.base_url, throttler)?
            .with_timeout(config.settings.timeout())
            .with_user_agent(config.settings.user_agent.clone()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn throttler(&self) -> &Arc<Throttler> {
        &self.throttler
    }

    /// GETs `base_url + path` and decodes the JSON body.
    ///
    /// The throttle wait is not covered by the timeout; only the request is.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        self.throttler.acquire().await;
        debug!(url = %url, "API request");

        let bytes = timeout(self.timeout_duration, self.download(&url))
            .await
            .map_err(|_| Error::Timeout(format!("Request to {} timed out", url)))??;

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(Error::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(Error::HttpError(format!(
                "HTTP {} for {}: {}",
                status.as_u16(),
                url,
                status.canonical_reason().unwrap_or("Unknown error")
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("Failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// Shows airing on `day`, first occurrence per `mal_id`.
    pub async fn fetch_schedule(&self, day: Weekday) -> Result<Vec<Anime>> {
        let path = format!("/schedules?filter={}", day.as_filter());
        self.fetch_anime_list(&path).await
    }

    /// Shows of the current broadcast season.
    pub async fn fetch_seasonal(&self) -> Result<Vec<Anime>> {
        self.fetch_anime_list("/seasons/now").await
    }

    pub async fn search_anime(&self, query: &str) -> Result<Vec<Anime>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Invalid("Search query cannot be empty".to_string()));
        }

        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.fetch_anime_list(&format!("/anime?q={}", encoded)).await
    }

    pub async fn fetch_anime(&self, mal_id: u64) -> Result<Anime> {
        let item: JikanItem<AnimeRecord> = self.get_json(&format!("/anime/{}", mal_id)).await?;
        Ok(item.data.into())
    }

    async fn fetch_anime_list(&self, path: &str) -> Result<Vec<Anime>> {
        let list: JikanList<AnimeRecord> = self.get_json(path).await?;
        let anime = list.data.into_iter().map(Anime::from).collect();
        Ok(dedupe_by_key(anime, |a: &Anime| a.mal_id))
    }
}

/// Keeps the first item for every key, preserving encounter order.
pub fn dedupe_by_key<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}
