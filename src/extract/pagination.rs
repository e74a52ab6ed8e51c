//! Next-page resolution.
//!
//! Three strategies in fixed order: a rel=next anchor, an anchor whose
//! text reads "Next", then a configurable marker element whose nearest
//! anchor carries the link. Whichever strategy produces a target, the
//! same termination rule applies: a next link that resolves back to
//! the current page ends pagination.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{canonicalize, clean_text};

/// Built-in pagination marker element.
pub const DEFAULT_NEXT_MARKER: &str = "div.next";

/// Resolve the next list page, if any.
pub fn resolve_next(document: &Html, current: &Url, marker: &str) -> Option<Url> {
    let href = rel_next(document)
        .or_else(|| text_next(document))
        .or_else(|| marker_next(document, marker))?;
    let target = current.join(&href).ok()?;
    let target = canonicalize(&target);
    if target == canonicalize(current) {
        return None;
    }
    Some(target)
}

fn rel_next(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"a[rel="next"]"#).ok()?;
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .next()
}

fn text_next(document: &Html) -> Option<String> {
    let selector = Selector::parse("a[href]").ok()?;
    let next_word = Regex::new(r"(?i)\bnext\b").ok()?;
    document
        .select(&selector)
        .find(|a| {
            let text = clean_text(&a.text().collect::<String>());
            !text.is_empty() && text.len() <= 16 && next_word.is_match(&text)
        })
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Marker strategy: find the marker element, then the closest anchor
/// (an enclosing one, or the first inside it).
fn marker_next(document: &Html, marker: &str) -> Option<String> {
    let selector = Selector::parse(marker).ok()?;
    for element in document.select(&selector) {
        if let Some(anchor) = enclosing_anchor(&element).or_else(|| inner_anchor(&element)) {
            return Some(anchor);
        }
    }
    None
}

fn enclosing_anchor(element: &ElementRef) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn inner_anchor(element: &ElementRef) -> Option<String> {
    let selector = Selector::parse("a[href]").ok()?;
    element
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .next()
}
