use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::content::strip_markup;
use crate::feed::date::recover_date;
use crate::feed::NewsEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    OutsideEntry,
    InsideEntry,
}

/// Entry fields the parser collects; everything else is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Summary,
    Published,
}

impl Field {
    fn from_element(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" | b"content" => Some(Field::Summary),
            b"pubDate" | b"published" | b"updated" => Some(Field::Published),
            _ => None,
        }
    }
}

fn is_entry_element(name: &[u8]) -> bool {
    matches!(name, b"item" | b"entry")
}

#[derive(Debug, Default)]
struct EntryAccumulator {
    title: String,
    link: String,
    summary: String,
    published: String,
}

#[derive(Debug)]
struct OpenField {
    field: Field,
    depth: usize,
    text: String,
}

/// Outcome of parsing one document.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub entries: Vec<NewsEntry>,
    /// Entries dropped for lacking a title or a link.
    pub skipped: usize,
    /// Set when the document stopped being readable part way through.
    pub error: Option<String>,
}

/// Streaming RSS 2.0 / Atom parser for a single document.
///
/// `parse` consumes the parser, so every document gets a fresh state and
/// concurrent parses never share anything.
#[derive(Debug)]
pub struct FeedParser {
    source: String,
    state: ParserState,
    depth: usize,
    entry_depth: usize,
    entry: EntryAccumulator,
    open_field: Option<OpenField>,
    outcome: ParseOutcome,
}

impl FeedParser {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: ParserState::OutsideEntry,
            depth: 0,
            entry_depth: 0,
            entry: EntryAccumulator::default(),
            open_field: None,
            outcome: ParseOutcome::default(),
        }
    }

    /// Parses `bytes`, never failing: a broken document yields whatever
    /// entries were completed before the break.
    pub fn parse(mut self, bytes: &[u8]) -> ParseOutcome {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);
        reader.config_mut().check_end_names = false;

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => self.on_start(&e, &reader),
                Ok(Event::Empty(e)) => {
                    self.on_start(&e, &reader);
                    self.on_end(e.name().as_ref());
                }
                Ok(Event::End(e)) => self.on_end(e.name().as_ref()),
                Ok(Event::Text(e)) => {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(_) => {
                            let raw = String::from_utf8_lossy(&e);
                            html_escape::decode_html_entities(&raw).into_owned()
                        }
                    };
                    self.on_text(&text);
                }
                Ok(Event::CData(e)) => self.on_text(&String::from_utf8_lossy(&e)),
                Ok(Event::Eof) => break,
                Err(e) => {
                    warn!(
                        source = %self.source,
                        position = reader.buffer_position(),
                        error = %e,
                        "Feed document is malformed, keeping entries parsed so far"
                    );
                    self.outcome.error = Some(e.to_string());
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        if self.state == ParserState::InsideEntry {
            debug!(source = %self.source, "Document ended inside an entry, dropping it");
            self.outcome.skipped += 1;
        }

        self.outcome
    }

    fn on_start(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) {
        self.depth += 1;
        // Qualified name: `media:title` or `atom:link` inside an item are
        // extensions, not the entry's own fields.
        let name = e.name();
        let name = name.as_ref();

        match self.state {
            ParserState::OutsideEntry => {
                if is_entry_element(name) {
                    self.state = ParserState::InsideEntry;
                    self.entry_depth = self.depth;
                    self.entry = EntryAccumulator::default();
                    self.open_field = None;
                }
            }
            ParserState::InsideEntry => {
                if self.open_field.is_some() || self.depth != self.entry_depth + 1 {
                    return;
                }
                let Some(field) = Field::from_element(name) else {
                    return;
                };
                if field == Field::Link {
                    self.capture_link_attribute(e, reader);
                }
                self.open_field = Some(OpenField {
                    field,
                    depth: self.depth,
                    text: String::new(),
                });
            }
        }
    }

    fn on_end(&mut self, name: &[u8]) {
        if self.state == ParserState::InsideEntry {
            if is_entry_element(name) {
                self.finish_entry();
            } else if self
                .open_field
                .as_ref()
                .is_some_and(|open| open.depth == self.depth)
            {
                if let Some(open) = self.open_field.take() {
                    self.commit_field(open);
                }
            }
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn on_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Some(open) = self.open_field.as_mut() {
            push_joined(&mut open.text, text);
        }
    }

    /// Atom carries the link in `href`; the first non-empty link wins.
    fn capture_link_attribute(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) {
        if !self.entry.link.is_empty() {
            return;
        }
        let href = match e.try_get_attribute("href") {
            Ok(Some(attr)) => attr.decode_and_unescape_value(reader.decoder()).ok(),
            Ok(None) => None,
            Err(err) => {
                debug!(source = %self.source, error = %err, "Skipping malformed link attribute");
                None
            }
        };
        if let Some(href) = href {
            let href = href.trim();
            if !href.is_empty() {
                self.entry.link = href.to_string();
            }
        }
    }

    fn commit_field(&mut self, open: OpenField) {
        let text = open.text;
        if text.is_empty() {
            return;
        }
        // A later element of the same kind (Atom `content` after `summary`,
        // `updated` after `published`) never replaces a captured value.
        let slot = match open.field {
            Field::Title => &mut self.entry.title,
            Field::Link => &mut self.entry.link,
            Field::Summary => &mut self.entry.summary,
            Field::Published => &mut self.entry.published,
        };
        if slot.is_empty() {
            *slot = text;
        }
    }

    fn finish_entry(&mut self) {
        let entry = std::mem::take(&mut self.entry);
        self.state = ParserState::OutsideEntry;
        self.open_field = None;
        self.depth = self.entry_depth;

        if entry.title.is_empty() || entry.link.is_empty() {
            debug!(
                source = %self.source,
                has_title = !entry.title.is_empty(),
                has_link = !entry.link.is_empty(),
                "Dropping entry without title or link"
            );
            self.outcome.skipped += 1;
            return;
        }

        self.outcome.entries.push(NewsEntry {
            title: entry.title,
            link: entry.link,
            published_at: recover_date(&entry.published),
            source: self.source.clone(),
            summary: strip_markup(&entry.summary),
        });
    }
}

fn push_joined(target: &mut String, text: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Parses one feed document into entries labelled with `source`.
pub fn parse_feed(bytes: &[u8], source: &str) -> Vec<NewsEntry> {
    FeedParser::new(source).parse(bytes).entries
}
