//! Crawl orchestration: the frontier, request pacing, and the worker
//! engine that drives fetch/extract/emit cycles.

mod engine;
mod frontier;
mod throttle;

pub use engine::{CrawlEngine, CrawlStats};
pub use frontier::Frontier;
pub use throttle::Throttle;
