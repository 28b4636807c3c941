use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

/// Wrap width handed to the renderer; lines are re-joined afterwards.
const RENDER_WIDTH: usize = 1000;

/// Turns feed descriptions into plain text.
///
/// The markup is rendered with `html2text` and the text content kept. When
/// rendering panics or yields nothing for input that clearly has text in it,
/// a regex tag-removal pass is used instead.
pub struct MarkupStripper {
    regex_patterns: RegexPatterns,
}

#[derive(Debug)]
struct RegexPatterns {
    hidden_blocks: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl RegexPatterns {
    fn new() -> Result<Self> {
        Ok(Self {
            hidden_blocks: Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>")
                .map_err(|e| Error::Invalid(e.to_string()))?,
            tag: Regex::new(r"(?s)<[^>]*>").map_err(|e| Error::Invalid(e.to_string()))?,
            whitespace: Regex::new(r"\s+").map_err(|e| Error::Invalid(e.to_string()))?,
        })
    }
}

impl MarkupStripper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            regex_patterns: RegexPatterns::new()?,
        })
    }

    /// Plain-text content of `markup`, whitespace collapsed and trimmed.
    pub fn strip(&self, markup: &str) -> String {
        if markup.trim().is_empty() {
            return String::new();
        }

        if !markup.contains('<') && !markup.contains('&') {
            return self.collapse_whitespace(markup);
        }

        match self.render(markup) {
            Some(text) if !text.is_empty() => text,
            _ => {
                debug!("Markup rendering produced no text, using tag removal");
                self.strip_tags(markup)
            }
        }
    }

    fn render(&self, markup: &str) -> Option<String> {
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
            html2text::from_read_with_decorator(
                markup.as_bytes(),
                RENDER_WIDTH,
                TrivialDecorator::new(),
            )
        }))
        .ok()?;

        Some(self.collapse_whitespace(&rendered))
    }

    /// Regex fallback: drops script/style blocks and tags, then decodes entities.
    pub fn strip_tags(&self, markup: &str) -> String {
        let without_blocks = self.regex_patterns.hidden_blocks.replace_all(markup, " ");
        let without_tags = self.regex_patterns.tag.replace_all(&without_blocks, " ");
        let decoded = html_escape::decode_html_entities(&without_tags);
        self.collapse_whitespace(&decoded)
    }

    fn collapse_whitespace(&self, text: &str) -> String {
        self.regex_patterns
            .whitespace
            .replace_all(text, " ")
            .trim()
            .to_string()
    }
}

/// Strips `markup` with a process-wide [`MarkupStripper`].
pub fn strip_markup(markup: &str) -> String {
    static STRIPPER: OnceLock<MarkupStripper> = OnceLock::new();
    STRIPPER
        .get_or_init(|| MarkupStripper::new().expect("markup patterns are valid"))
        .strip(markup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(strip_markup("  Just   some\ntext  "), "Just some text");
        assert_eq!(strip_markup("   "), "");
    }

    #[test]
    fn test_rendered_markup_keeps_text_only() {
        let text = strip_markup(
            "<p>MAPPA confirms <strong>season 3</strong> of <a href=\"https://x.example\">Jujutsu Kaisen</a>.</p>",
        );
        assert!(text.contains("MAPPA confirms"));
        assert!(text.contains("season 3"));
        assert!(text.contains("Jujutsu Kaisen"));
        assert!(!text.contains('<'));
        assert!(!text.contains("href"));
    }

    #[test]
    fn test_entities_are_decoded() {
        let text = strip_markup("Fish &amp; Chips &lt;3");
        assert_eq!(text, "Fish & Chips <3");
    }

    #[test]
    fn test_strip_tags_fallback() {
        let stripper = MarkupStripper::new().unwrap();
        let text = stripper.strip_tags(
            "<div><script>alert('x')</script><style>p{}</style><p>Hello&nbsp;<em>world</em></p></div>",
        );
        assert!(text.starts_with("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("p{}"));
    }

    #[test]
    fn test_tag_only_markup_is_empty() {
        assert_eq!(strip_markup("<br/><img src=\"x.png\"/>"), "");
    }
}
