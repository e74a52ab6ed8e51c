//! Listing records, failure records, and URL identity helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use url::Url;

/// Normalize a URL for identity and dedup comparisons.
///
/// The parser already lowercases the host and drops default ports;
/// this additionally strips the fragment and empty queries so that
/// `…/page#top` and `…/page?` compare equal to `…/page`.
pub fn canonicalize(url: &Url) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);
    if out.query() == Some("") {
        out.set_query(None);
    }
    out
}

/// Deterministic record id: hex SHA-256 of the canonical URL.
pub fn stable_id(url: &Url) -> String {
    let canonical = canonicalize(url);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The extractable company field map. Every field is optional; an
/// exhausted fallback chain leaves the field `None`, never an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyFields {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
}

/// One extracted business-listing record. Immutable after creation;
/// the primary store only ever appends these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub url: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    /// List page that produced this record, when discovered via one.
    #[serde(rename = "sourceList", skip_serializing_if = "Option::is_none")]
    pub source_list: Option<String>,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Record for an anchor found on a list page: name and URL only.
    pub fn from_list_anchor(name: Option<String>, url: &Url, source_list: &Url) -> Self {
        Self {
            id: stable_id(url),
            url: canonicalize(url).to_string(),
            name,
            address: None,
            phone: None,
            website: None,
            industry: None,
            source_list: Some(canonicalize(source_list).to_string()),
            scraped_at: Utc::now(),
        }
    }

    /// Record for a fully extracted detail page.
    pub fn from_fields(url: &Url, fields: CompanyFields, source_list: Option<String>) -> Self {
        Self {
            id: stable_id(url),
            url: canonicalize(url).to_string(),
            name: fields.name,
            address: fields.address,
            phone: fields.phone,
            website: fields.website,
            industry: fields.industry,
            source_list,
            scraped_at: Utc::now(),
        }
    }

    /// Field map for the external merge-upsert. Absent fields are
    /// omitted so a later partial record never nulls out keys an
    /// earlier record already stored.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::String(self.id.clone()));
        fields.insert("url".into(), Value::String(self.url.clone()));
        let optional = [
            ("name", &self.name),
            ("address", &self.address),
            ("phone", &self.phone),
            ("website", &self.website),
            ("industry", &self.industry),
            ("sourceList", &self.source_list),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                fields.insert(key.into(), Value::String(v.clone()));
            }
        }
        fields.insert(
            "scrapedAt".into(),
            Value::String(self.scraped_at.to_rfc3339()),
        );
        fields
    }
}

/// Written to the primary store for every terminally failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub error: String,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            error: "FAILED".to_string(),
            scraped_at: Utc::now(),
        }
    }
}
