//! Bounded in-memory image store keyed by URL.
//!
//! Concurrent requests for a URL that is not cached yet share one load task.
//! Loads run as spawned tasks so a caller that gives up does not cancel the
//! load for everyone else; [`ImageCache::clear`] aborts them all.
//!
//! Eviction is by insertion order: reads use `peek`, which never promotes an
//! entry, so the `LruCache` back end behaves as a FIFO.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::config::ImageCacheSettings;
use crate::error::{Error, Result};
use crate::storage::image::DecodedImage;

const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;

/// Fetches the raw bytes behind an image URL.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpImageLoader {
    client: Client,
    user_agent: String,
}

impl HttpImageLoader {
    pub fn new(user_agent: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| Error::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "image/*")
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::HttpError(format!(
                "HTTP {} for {}",
                response.status().as_u16(),
                url
            )));
        }

        if response.content_length().is_some_and(|len| len > MAX_IMAGE_SIZE) {
            return Err(Error::ResponseTooLarge(url.to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("Failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Requests that joined a load already in flight.
    pub coalesced: u64,
    pub evictions: u64,
    pub failures: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn record_hit(&mut self) {
        self.hits += 1;
    }

    fn record_miss(&mut self) {
        self.misses += 1;
    }

    fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    fn record_failure(&mut self) {
        self.failures += 1;
    }
}

#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    pub max_entries: usize,
    pub load_timeout: Duration,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            load_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&ImageCacheSettings> for ImageCacheConfig {
    fn from(settings: &ImageCacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries,
            load_timeout: Duration::from_secs(settings.timeout),
        }
    }
}

type LoadResult = Option<Arc<DecodedImage>>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

struct InFlight {
    id: u64,
    load: SharedLoad,
    abort: AbortHandle,
}

struct CacheState {
    store: LruCache<String, Arc<DecodedImage>>,
    in_flight: HashMap<String, InFlight>,
    stats: CacheStats,
    next_load_id: u64,
}

#[derive(Clone)]
pub struct ImageCache {
    state: Arc<Mutex<CacheState>>,
    loader: Arc<dyn ImageLoader>,
    config: ImageCacheConfig,
}

impl ImageCache {
    pub fn new(config: ImageCacheConfig, loader: Arc<dyn ImageLoader>) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            state: Arc::new(Mutex::new(CacheState {
                store: LruCache::new(capacity),
                in_flight: HashMap::new(),
                stats: CacheStats::default(),
                next_load_id: 0,
            })),
            loader,
            config,
        }
    }

    pub fn with_http(settings: &ImageCacheSettings, user_agent: &str) -> Result<Self> {
        let loader = HttpImageLoader::new(user_agent)?;
        Ok(Self::new(settings.into(), Arc::new(loader)))
    }

    /// Cached image for `url`, loading it when absent.
    ///
    /// Returns `None` when the load fails or is cancelled by [`clear`](Self::clear);
    /// failures are not remembered, the next call tries again.
    pub async fn get(&self, url: &str) -> Option<Arc<DecodedImage>> {
        let load = {
            let mut state = self.state.lock();

            if let Some(image) = state.store.peek(url).cloned() {
                state.stats.record_hit();
                return Some(image);
            }

            if let Some(load) = state.in_flight.get(url).map(|f| f.load.clone()) {
                state.stats.record_coalesced();
                load
            } else {
                state.stats.record_miss();
                self.start_load(&mut state, url)
            }
        };

        load.await
    }

    fn start_load(&self, state: &mut CacheState, url: &str) -> SharedLoad {
        let id = state.next_load_id;
        state.next_load_id += 1;

        let key = url.to_string();
        let loader = Arc::clone(&self.loader);
        let shared_state = Arc::clone(&self.state);
        let load_timeout = self.config.load_timeout;

        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(load_timeout, loader.load(&key)).await {
                Ok(Ok(bytes)) => DecodedImage::decode(bytes).map(Arc::new),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::Timeout(format!("Image load for {} timed out", key))),
            };

            let mut state = shared_state.lock();
            let current = state.in_flight.get(&key).is_some_and(|f| f.id == id);
            if !current {
                // Superseded by clear(); whatever arrived is discarded.
                return None;
            }
            state.in_flight.remove(&key);

            match result {
                Ok(image) => {
                    if let Some((evicted, _)) = state.store.push(key.clone(), Arc::clone(&image)) {
                        if evicted != key {
                            state.stats.record_eviction();
                            debug!(url = %evicted, "Evicted oldest image");
                        }
                    }
                    debug!(url = %key, format = %image.format, bytes = image.len(), "Image cached");
                    Some(image)
                }
                Err(e) => {
                    state.stats.record_failure();
                    warn!(url = %key, error = %e, "Image load failed");
                    None
                }
            }
        });

        let abort = task.abort_handle();
        let load = task.map(|joined| joined.ok().flatten()).boxed().shared();

        state.in_flight.insert(
            url.to_string(),
            InFlight {
                id,
                load: load.clone(),
                abort,
            },
        );

        load
    }

    /// Drops every stored image and aborts every in-flight load.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let stored = state.store.len();
        state.store.clear();

        let cancelled = state.in_flight.len();
        for (_, in_flight) in state.in_flight.drain() {
            in_flight.abort.abort();
        }

        debug!(stored, cancelled, "Image cache cleared");
    }

    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `url` is stored. Does not affect eviction order.
    pub fn contains(&self, url: &str) -> bool {
        self.state.lock().store.contains(url)
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().store.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }
}
