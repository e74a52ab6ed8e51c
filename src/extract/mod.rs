//! Pure DOM extraction: list-page anchors, detail-page fields, and
//! next-page resolution. Everything here operates on a parsed
//! document and returns owned data.

mod detail;
mod list;
mod pagination;

pub use detail::{extract_fields, FieldRules};
pub use list::{extract_anchors, ListingAnchor, DEFAULT_LIST_SELECTORS};
pub use pagination::{resolve_next, DEFAULT_NEXT_MARKER};
