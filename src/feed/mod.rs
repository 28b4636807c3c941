pub mod date;
pub mod fetcher;
pub mod parser;

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One normalized news item extracted from a feed document.
///
/// Equality and hashing only look at `(title, link, source)`: the same story
/// re-announced with a new summary or timestamp is the same entry, while the
/// same story carried by two outlets stays two entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEntry {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub summary: String,
}

impl PartialEq for NewsEntry {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.link == other.link && self.source == other.source
    }
}

impl Eq for NewsEntry {}

impl Hash for NewsEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.title.hash(state);
        self.link.hash(state);
        self.source.hash(state);
    }
}

impl NewsEntry {
    /// Static entries shown when every configured source comes back empty.
    ///
    /// Timestamps are relative to `now` so the list still sorts newest first.
    pub fn fallback() -> Vec<NewsEntry> {
        let now = Utc::now();
        let entry = |hours: i64, title: &str, link: &str, source: &str, summary: &str| NewsEntry {
            title: title.to_string(),
            link: link.to_string(),
            published_at: now - Duration::hours(hours),
            source: source.to_string(),
            summary: summary.to_string(),
        };

        vec![
            entry(
                1,
                "Studio Ghibli Announces New Film 'The Last Ember'",
                "https://www.animenewsnetwork.com/news/2026-01-30/article.12345",
                "Anime News Network",
                "The legendary studio behind Spirited Away and My Neighbor Totoro has revealed its first project in over five years, a fantasy epic directed by a newcomer.",
            ),
            entry(
                2,
                "'Jujutsu Kaisen' Season 3 Officially Confirmed for 2025",
                "https://www.crunchyroll.com/news/jujutsu-kaisen-s3-confirmed",
                "Crunchyroll",
                "Following the massive success of the Shibuya Incident arc, MAPPA has confirmed that the Culling Game arc will be adapted next year.",
            ),
            entry(
                3,
                "Classic 'Cowboy Bebop' Vinyl Soundtrack Gets Limited Re-release",
                "https://www.funimation.com/blog/cowboy-bebop-vinyl-rerelease",
                "Funimation",
                "The iconic soundtrack from The Seatbelts is coming back to vinyl for a limited run, featuring a new collector's edition packaging.",
            ),
            entry(
                4,
                "New 'Berserk' Chapter Announcement Excites Fans",
                "https://www.example.com/berserk-chapter",
                "Manga Mogul",
                "A new chapter of the late Kentaro Miura's masterpiece, 'Berserk,' has been announced, continuing the epic journey of Guts.",
            ),
        ]
    }
}

/// Whether requests to a source must pass through the shared throttler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceClass {
    #[default]
    Open,
    RateLimited,
}

/// A named origin of feed data. RSS vs Atom is detected while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub class: SourceClass,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            class: SourceClass::Open,
        }
    }

    pub fn rate_limited(mut self) -> Self {
        self.class = SourceClass::RateLimited;
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.class == SourceClass::RateLimited
    }
}

/// Keeps the first occurrence of every `(title, link, source)` triple, in order.
pub fn dedupe_entries(entries: Vec<NewsEntry>) -> Vec<NewsEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, link: &str, source: &str, summary: &str, hours_ago: i64) -> NewsEntry {
        NewsEntry {
            title: title.to_string(),
            link: link.to_string(),
            published_at: Utc::now() - Duration::hours(hours_ago),
            source: source.to_string(),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_equality_ignores_summary_and_timestamp() {
        let a = entry("Frieren S2", "https://a.example/1", "ANN", "first copy", 1);
        let b = entry("Frieren S2", "https://a.example/1", "ANN", "updated copy", 5);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_equality_respects_source() {
        let a = entry("Frieren S2", "https://a.example/1", "ANN", "", 1);
        let b = entry("Frieren S2", "https://a.example/1", "Crunchyroll", "", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_dedupe_entries_keeps_first() {
        let entries = vec![
            entry("One", "https://x/1", "ANN", "old", 2),
            entry("Two", "https://x/2", "ANN", "", 1),
            entry("One", "https://x/1", "ANN", "new", 0),
            entry("One", "https://x/1", "CR", "", 0),
        ];

        let deduped = dedupe_entries(entries);
        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped[0].summary, "old");
        assert_eq!(deduped[2].source, "CR");
    }

    #[test]
    fn test_fallback_is_non_empty_and_sorted() {
        let fallback = NewsEntry::fallback();
        assert!(!fallback.is_empty());
        assert!(fallback
            .windows(2)
            .all(|w| w[0].published_at >= w[1].published_at));
        assert!(fallback.iter().all(|e| !e.title.is_empty() && !e.link.is_empty()));
    }

    #[test]
    fn test_source_class_deserializes() {
        let source: FeedSource = toml::from_str(
            r#"
name = "Jikan"
url = "https://api.jikan.moe/v4/feed"
class = "rate_limited"
"#,
        )
        .unwrap();
        assert!(source.is_rate_limited());

        let open: FeedSource = toml::from_str(
            r#"
name = "ANN"
url = "https://www.animenewsnetwork.com/all/rss.xml"
"#,
        )
        .unwrap();
        assert_eq!(open.class, SourceClass::Open);
    }
}
