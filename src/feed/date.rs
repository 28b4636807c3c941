//! Best-effort conversion of feed date strings into UTC timestamps.
//!
//! Feeds in the wild mix RFC 822 dates with numeric offsets, RFC 822 dates
//! with zone abbreviations and ISO 8601 timestamps, and a fair number wrap
//! them in extra text. Recovery runs in three steps:
//!
//! 1. try each [`DatePattern`] in order against the trimmed input;
//! 2. search the input for something that looks like a date and retry the
//!    same patterns against that substring; when those still fail (no
//!    weekday, or one that disagrees with the date) the day, time and zone
//!    are read directly, with a missing or unknown zone taken as UTC;
//! 3. give up and use the current time, so the entry is still emitted.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use tracing::debug;

/// Fixed patterns tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePattern {
    /// `Fri, 15 Mar 2024 10:00:00 +0000`
    Rfc822Offset,
    /// `Fri, 15 Mar 2024 10:00:00 GMT`
    Rfc822Zone,
    /// `2024-03-15T10:00:00+0000` or `...Z`
    Iso8601,
    /// `2024-03-15T10:00:00.000+0000` or `...Z`
    Iso8601Millis,
}

pub const DATE_PATTERNS: [DatePattern; 4] = [
    DatePattern::Rfc822Offset,
    DatePattern::Rfc822Zone,
    DatePattern::Iso8601,
    DatePattern::Iso8601Millis,
];

impl DatePattern {
    pub fn parse(self, input: &str) -> Option<DateTime<Utc>> {
        let parsed = match self {
            DatePattern::Rfc822Offset => {
                DateTime::parse_from_str(input, "%a, %d %b %Y %H:%M:%S %z").ok()
            }
            DatePattern::Rfc822Zone => parse_rfc822_zone(input),
            DatePattern::Iso8601 => parse_iso(input, "%Y-%m-%dT%H:%M:%S"),
            DatePattern::Iso8601Millis => parse_iso(input, "%Y-%m-%dT%H:%M:%S%.3f"),
        };
        parsed.map(|dt| dt.with_timezone(&Utc))
    }
}

/// Parses `raw` with the fixed patterns, then with the substring search.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(parsed) = parse_with_patterns(trimmed) {
        return Some(parsed);
    }

    let candidate = loose_date_regex().find(trimmed)?.as_str();
    parse_with_patterns(candidate).or_else(|| parse_date_core(candidate))
}

/// Like [`parse_date`] but never fails: unparseable input becomes "now".
pub fn recover_date(raw: &str) -> DateTime<Utc> {
    parse_date(raw).unwrap_or_else(|| {
        if !raw.trim().is_empty() {
            debug!(date = %raw, "Unrecognized date format, using current time");
        }
        Utc::now()
    })
}

fn parse_with_patterns(input: &str) -> Option<DateTime<Utc>> {
    DATE_PATTERNS.iter().find_map(|pattern| pattern.parse(input))
}

fn parse_rfc822_zone(input: &str) -> Option<DateTime<FixedOffset>> {
    let (stamp, zone) = input.rsplit_once(char::is_whitespace)?;
    let offset = FixedOffset::east_opt(zone_offset_seconds(zone)?)?;
    let naive = NaiveDateTime::parse_from_str(stamp.trim_end(), "%a, %d %b %Y %H:%M:%S").ok()?;
    offset.from_local_datetime(&naive).single()
}

fn parse_iso(input: &str, base: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = match input.strip_suffix('Z').or_else(|| input.strip_suffix('z')) {
        Some(stamp) => format!("{stamp}+0000"),
        None => input.to_string(),
    };

    DateTime::parse_from_str(&normalized, &format!("{base}%z"))
        .or_else(|_| DateTime::parse_from_str(&normalized, &format!("{base}%:z")))
        .ok()
}

fn parse_date_core(candidate: &str) -> Option<DateTime<Utc>> {
    let caps = loose_core_regex().captures(candidate)?;

    let (naive, zone) = if let Some(core) = caps.name("core") {
        let core = core.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        let naive = NaiveDateTime::parse_from_str(&core, "%d %b %Y %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&core, "%d %b %Y %H:%M"))
            .ok()?;
        (naive, caps.name("zone").map(|m| m.as_str()))
    } else {
        let iso = caps.name("iso")?.as_str();
        (NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S").ok()?, None)
    };

    let seconds = zone
        .and_then(|zone| numeric_offset_seconds(zone).or_else(|| zone_offset_seconds(zone)))
        .unwrap_or(0);
    FixedOffset::east_opt(seconds)?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `+0900` or `-0530` as seconds east of UTC.
fn numeric_offset_seconds(zone: &str) -> Option<i32> {
    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

fn zone_offset_seconds(zone: &str) -> Option<i32> {
    const HOUR: i32 = 3600;
    let offset = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5 * HOUR,
        "EDT" => -4 * HOUR,
        "CST" => -6 * HOUR,
        "CDT" => -5 * HOUR,
        "MST" => -7 * HOUR,
        "MDT" => -6 * HOUR,
        "PST" => -8 * HOUR,
        "PDT" => -7 * HOUR,
        "BST" | "CET" => HOUR,
        "CEST" => 2 * HOUR,
        "JST" | "KST" => 9 * HOUR,
        "AEST" => 10 * HOUR,
        "AEDT" => 11 * HOUR,
        _ => return None,
    };
    Some(offset)
}

fn loose_date_regex() -> &'static Regex {
    static LOOSE: OnceLock<Regex> = OnceLock::new();
    LOOSE.get_or_init(|| {
        Regex::new(
            r"(?:[A-Za-z]{3},\s*)?\d{1,2}\s+[A-Za-z]{3}\s+\d{4}\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s+(?:[+-]\d{4}|[A-Za-z]{1,5})\b)?|\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{3})?(?:Z|[+-]\d{2}:?\d{2})?",
        )
        .expect("loose date pattern is valid")
    })
}

fn loose_core_regex() -> &'static Regex {
    static CORE: OnceLock<Regex> = OnceLock::new();
    CORE.get_or_init(|| {
        Regex::new(
            r"(?P<core>\d{1,2}\s+[A-Za-z]{3}\s+\d{4}\s+\d{1,2}:\d{2}(?::\d{2})?)(?:\s+(?P<zone>[+-]\d{4}|[A-Za-z]{1,5})\b)?|(?P<iso>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})",
        )
        .expect("date core pattern is valid")
    })
}
