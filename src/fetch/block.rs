//! Block-page classification.
//!
//! CDNs sometimes serve a 200 with a challenge page, so the detector
//! inspects both the HTTP status and the rendered body text.

use scraper::{Html, Selector};

/// Built-in block-indicator phrases, matched case-insensitively as
/// substrings of the body text.
pub const DEFAULT_BLOCK_PHRASES: &[&str] = &[
    "access denied",
    "forbidden",
    "blocked",
    "verify you are a human",
    "just a moment",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    Blocked,
}

/// Classifies fetched pages as blocked or normal.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    phrases: Vec<String>,
}

impl BlockDetector {
    /// Detector with the built-in phrase set plus any configured extras.
    pub fn new(extra_phrases: &[String]) -> Self {
        let mut phrases: Vec<String> = DEFAULT_BLOCK_PHRASES
            .iter()
            .map(|p| p.to_string())
            .collect();
        phrases.extend(extra_phrases.iter().map(|p| p.to_lowercase()));
        Self { phrases }
    }

    /// HTTP 403 is blocked regardless of content; otherwise the body
    /// text is scanned for the phrase set.
    pub fn classify(&self, status: u16, text: &str) -> Verdict {
        if status == 403 {
            return Verdict::Blocked;
        }
        let lower = text.to_lowercase();
        if self.phrases.iter().any(|p| lower.contains(p.as_str())) {
            Verdict::Blocked
        } else {
            Verdict::Normal
        }
    }
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Visible text of the document body (falls back to the whole tree
/// for fragments without a body element).
pub fn body_text(html: &Html) -> String {
    let collected = Selector::parse("body")
        .ok()
        .and_then(|sel| html.select(&sel).next())
        .map(|body| body.text().collect::<Vec<_>>().join(" "));
    collected.unwrap_or_else(|| html.root_element().text().collect::<Vec<_>>().join(" "))
}
