//! Detail-page field extraction.
//!
//! Every field resolves through an ordered fallback chain: configured
//! selector first, then the built-in selectors, then a label scan over
//! common text containers. The first non-empty hit wins and later
//! strategies never run, so a selector match always beats a label
//! match.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::FieldSelectors;
use crate::models::{clean_text, CompanyFields};

/// Containers worth scanning for "Label: value" text.
const LABEL_CONTAINERS: &str = "p, li, dt, dd, td, th, span, strong, b";

/// Sidebar regions where an external company-website link tends to
/// live when no dedicated selector matches.
const WEBSITE_REGIONS: &str = "aside a, .sidebar a, .summary a, .company-summary a";

/// Fallback chain for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    css: Vec<String>,
    labels: Vec<&'static str>,
    /// Resolve to the anchor target instead of the text content.
    link: bool,
}

impl FieldRule {
    fn text(css: &str, labels: &[&'static str]) -> Self {
        Self {
            css: vec![css.to_string()],
            labels: labels.to_vec(),
            link: false,
        }
    }

    fn link(css: &str, labels: &[&'static str]) -> Self {
        Self {
            css: vec![css.to_string()],
            labels: labels.to_vec(),
            link: true,
        }
    }
}

/// Per-field fallback chains for a detail page.
#[derive(Debug, Clone)]
pub struct FieldRules {
    name: FieldRule,
    address: FieldRule,
    phone: FieldRule,
    website: FieldRule,
    industry: FieldRule,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            name: FieldRule::text("h1.company-name, h1", &[]),
            address: FieldRule::text(
                "p.company-address, .address",
                &["address:", "headquarters:", "location:"],
            ),
            phone: FieldRule::text("a.company-phone, a[href^=\"tel:\"]", &["phone:", "tel:"]),
            website: FieldRule::link("a.company-website", &["website:", "web site:"]),
            industry: FieldRule::text("span.company-industry, .industry", &["industry:", "sector:"]),
        }
    }
}

impl FieldRules {
    /// Prepend configured selectors so they are consulted before the
    /// built-in chains.
    pub fn with_overrides(mut self, overrides: &FieldSelectors) -> Self {
        let prepend = |rule: &mut FieldRule, selector: &Option<String>| {
            if let Some(selector) = selector {
                rule.css.insert(0, selector.clone());
            }
        };
        prepend(&mut self.name, &overrides.name);
        prepend(&mut self.address, &overrides.address);
        prepend(&mut self.phone, &overrides.phone);
        prepend(&mut self.website, &overrides.website);
        prepend(&mut self.industry, &overrides.industry);
        self
    }
}

/// Extract company fields from a detail page. A field whose whole
/// chain misses stays `None`; extraction itself never fails.
pub fn extract_fields(document: &Html, base: &Url, rules: &FieldRules) -> CompanyFields {
    let mut website = resolve_field(document, base, &rules.website);
    if website.is_none() {
        website = external_link_fallback(document, base);
    }
    CompanyFields {
        name: resolve_field(document, base, &rules.name),
        address: resolve_field(document, base, &rules.address),
        phone: resolve_field(document, base, &rules.phone),
        website,
        industry: resolve_field(document, base, &rules.industry),
    }
}

fn resolve_field(document: &Html, base: &Url, rule: &FieldRule) -> Option<String> {
    for css in &rule.css {
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(_) => continue,
        };
        for element in document.select(&selector) {
            if let Some(value) = element_value(&element, base, rule.link) {
                return Some(value);
            }
        }
    }
    if rule.labels.is_empty() {
        return None;
    }
    label_scan(document, base, rule)
}

/// Value of a matched element: absolute link target for link fields,
/// cleaned text otherwise. Phone anchors strip the tel: scheme.
fn element_value(element: &ElementRef, base: &Url, link: bool) -> Option<String> {
    if link {
        let href = element.value().attr("href")?;
        let resolved = base.join(href).ok()?;
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            return None;
        }
        return Some(resolved.to_string());
    }
    let text = clean_text(&element.text().collect::<String>());
    if !text.is_empty() {
        return Some(text);
    }
    // Icon-only phone anchors still carry the number in the href.
    if let Some(number) = element
        .value()
        .attr("href")
        .and_then(|href| href.strip_prefix("tel:"))
    {
        let number = clean_text(number);
        if !number.is_empty() {
            return Some(number);
        }
    }
    None
}

/// Scan text containers for "Label: value" patterns. The value is the
/// inline remainder after the label, or the next element sibling's
/// text when the label stands alone (dt/dd and table layouts).
fn label_scan(document: &Html, base: &Url, rule: &FieldRule) -> Option<String> {
    let selector = Selector::parse(LABEL_CONTAINERS).ok()?;
    for element in document.select(&selector) {
        let text = clean_text(&element.text().collect::<String>());
        let lowered = text.to_lowercase();
        let Some(label) = rule.labels.iter().find(|l| lowered.starts_with(**l)) else {
            continue;
        };
        if rule.link {
            if let Some(url) = contained_link(&element, base) {
                return Some(url);
            }
        }
        let remainder = text.get(label.len()..).map(clean_text).unwrap_or_default();
        if !remainder.is_empty() {
            return Some(remainder);
        }
        let sibling_text = element
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .map(|s| clean_text(&s.text().collect::<String>()))
            .find(|t| !t.is_empty());
        if let Some(value) = sibling_text {
            return Some(value);
        }
    }
    None
}

fn contained_link(element: &ElementRef, base: &Url) -> Option<String> {
    let selector = Selector::parse("a[href]").ok()?;
    element
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .find(|url| url.scheme() == "http" || url.scheme() == "https")
        .map(|url| url.to_string())
}

/// Last-resort website resolution: the first off-site link in a
/// sidebar/summary region.
fn external_link_fallback(document: &Html, base: &Url) -> Option<String> {
    let selector = Selector::parse(WEBSITE_REGIONS).ok()?;
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .find(|url| url.host_str() != base.host_str())
        .map(|url| url.to_string())
}
