use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Day filter accepted by the schedules endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn today() -> Self {
        chrono::Local::now().weekday().into()
    }

    pub fn as_filter(&self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl FromStr for Weekday {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Weekday::today()),
            "monday" | "mon" => Ok(Weekday::Monday),
            "tuesday" | "tue" => Ok(Weekday::Tuesday),
            "wednesday" | "wed" => Ok(Weekday::Wednesday),
            "thursday" | "thu" => Ok(Weekday::Thursday),
            "friday" | "fri" => Ok(Weekday::Friday),
            "saturday" | "sat" => Ok(Weekday::Saturday),
            "sunday" | "sun" => Ok(Weekday::Sunday),
            other => Err(Error::Invalid(format!("Unknown day: {}", other))),
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

/// Envelope for single-record responses.
#[derive(Debug, Deserialize)]
pub struct JikanItem<T> {
    pub data: T,
}

/// Envelope for list responses.
#[derive(Debug, Deserialize)]
pub struct JikanList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub last_visible_page: u32,
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnimeRecord {
    pub mal_id: u64,
    pub title: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub images: Option<Images>,
}

#[derive(Debug, Deserialize)]
pub struct Images {
    #[serde(default)]
    pub jpg: Option<ImageUrls>,
}

#[derive(Debug, Deserialize)]
pub struct ImageUrls {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The slice of an anime record the client uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anime {
    pub mal_id: u64,
    pub title: String,
    pub score: Option<f64>,
    pub episodes: Option<u32>,
    pub image_url: Option<String>,
}

impl From<AnimeRecord> for Anime {
    fn from(record: AnimeRecord) -> Self {
        Self {
            mal_id: record.mal_id,
            title: record.title,
            score: record.score,
            episodes: record.episodes,
            image_url: record
                .images
                .and_then(|images| images.jpg)
                .and_then(|jpg| jpg.image_url),
        }
    }
}
