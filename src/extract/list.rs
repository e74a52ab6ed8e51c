//! List-page anchor extraction.
//!
//! Selector alternatives are tried in order; the first one that
//! matches anything wins and later alternatives are ignored. That
//! keeps markup-variant fallbacks from double-counting the same
//! anchors.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::models::{canonicalize, clean_text};

/// Built-in anchor selectors for company-directory result grids.
pub const DEFAULT_LIST_SELECTORS: &[&str] = &[
    "#companyResults a.companyName",
    "#companyResults > div > div.col-md-6 > a",
];

/// One company link lifted off a list page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingAnchor {
    pub name: Option<String>,
    pub url: Url,
}

/// Extract company anchors using the configured selector alternatives,
/// falling back to the built-in set when none are configured.
pub fn extract_anchors(document: &Html, base: &Url, configured: &[String]) -> Vec<ListingAnchor> {
    let mut anchors = Vec::new();
    let mut seen = HashSet::new();

    let alternatives: Vec<&str> = if configured.is_empty() {
        DEFAULT_LIST_SELECTORS.to_vec()
    } else {
        configured.iter().map(String::as_str).collect()
    };

    for alternative in alternatives {
        let selector = match Selector::parse(alternative) {
            Ok(s) => s,
            Err(_) => {
                debug!("Skipping unparsable selector {:?}", alternative);
                continue;
            }
        };
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(resolved) = base.join(href) else {
                continue;
            };
            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                continue;
            }
            let url = canonicalize(&resolved);
            if !seen.insert(url.to_string()) {
                continue;
            }
            let name = clean_text(&element.text().collect::<String>());
            anchors.push(ListingAnchor {
                name: if name.is_empty() { None } else { Some(name) },
                url,
            });
        }
        if !anchors.is_empty() {
            break;
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://directory.example/companies?page=1").unwrap()
    }

    #[test]
    fn extracts_default_anchors_with_relative_hrefs() {
        let html = Html::parse_document(
            r#"<div id="companyResults">
                 <a class="companyName" href="/company/acme">  Acme   Corp </a>
                 <a class="companyName" href="/company/globex">Globex</a>
               </div>"#,
        );
        let anchors = extract_anchors(&html, &base(), &[]);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].name.as_deref(), Some("Acme Corp"));
        assert_eq!(
            anchors[0].url.as_str(),
            "https://directory.example/company/acme"
        );
    }

    #[test]
    fn first_matching_alternative_wins() {
        let html = Html::parse_document(
            r#"<div id="companyResults">
                 <a class="companyName" href="/a">A</a>
                 <div><div class="col-md-6"><a href="/b">B</a></div></div>
               </div>"#,
        );
        let anchors = extract_anchors(&html, &base(), &[]);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].name.as_deref(), Some("A"));
    }

    #[test]
    fn duplicate_targets_are_emitted_once() {
        let html = Html::parse_document(
            r#"<div id="companyResults">
                 <a class="companyName" href="/company/acme">Acme</a>
                 <a class="companyName" href="/company/acme#top">Acme again</a>
               </div>"#,
        );
        let anchors = extract_anchors(&html, &base(), &[]);
        assert_eq!(anchors.len(), 1);
    }

    #[test]
    fn non_http_schemes_are_dropped() {
        let html = Html::parse_document(
            r#"<div id="companyResults">
                 <a class="companyName" href="mailto:hi@acme.example">Acme</a>
                 <a class="companyName" href="javascript:void(0)">Globex</a>
               </div>"#,
        );
        assert!(extract_anchors(&html, &base(), &[]).is_empty());
    }

    #[test]
    fn configured_selectors_replace_defaults() {
        let html = Html::parse_document(
            r#"<ul class="results"><li><a class="hit" href="/x">X Co</a></li></ul>"#,
        );
        let configured = vec!["ul.results a.hit".to_string()];
        let anchors = extract_anchors(&html, &base(), &configured);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].name.as_deref(), Some("X Co"));
    }

    #[test]
    fn missing_text_yields_none_name() {
        let html = Html::parse_document(
            r#"<div id="companyResults"><a class="companyName" href="/y"></a></div>"#,
        );
        let anchors = extract_anchors(&html, &base(), &[]);
        assert_eq!(anchors.len(), 1);
        assert!(anchors[0].name.is_none());
    }
}
