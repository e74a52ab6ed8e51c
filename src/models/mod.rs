//! Data models for listcrawl.

mod record;
mod request;

pub use record::{
    canonicalize, clean_text, stable_id, CompanyFields, FailureRecord, ListingRecord,
};
pub use request::{PageLabel, PageRequest, RequestState};
