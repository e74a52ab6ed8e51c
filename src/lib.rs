//! listcrawl - resilient crawler for paginated business-directory listings.
//!
//! Core library exposing the request frontier, session rotation,
//! ordered-fallback extraction, and the dual-sink output policy.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod sink;
