//! Request frontier with URL dedup, a priority lane for retries and
//! login steps, and a hard request budget.

use std::collections::{HashSet, VecDeque};

use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{PageLabel, PageRequest};

struct FrontierState {
    queue: VecDeque<PageRequest>,
    priority: VecDeque<PageRequest>,
    seen: HashSet<(String, PageLabel)>,
    remaining_budget: u64,
    in_flight: usize,
}

/// Shared work queue for crawl workers.
pub struct Frontier {
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new(budget: u64) -> Self {
        Self {
            state: Mutex::new(FrontierState {
                queue: VecDeque::new(),
                priority: VecDeque::new(),
                seen: HashSet::new(),
                remaining_budget: budget,
                in_flight: 0,
            }),
        }
    }

    /// Enqueue a request unless the same (url, label) pair has already
    /// been accepted during this crawl.
    pub async fn enqueue(&self, request: PageRequest) -> bool {
        let mut state = self.state.lock().await;
        if !state.seen.insert(request.dedup_key()) {
            debug!("Skipping already-seen url {}", request.url);
            return false;
        }
        state.queue.push_back(request);
        true
    }

    /// Enqueue ahead of ordinary work. Used for login steps that must
    /// run before listing pages are fetched.
    pub async fn enqueue_priority(&self, request: PageRequest) -> bool {
        let mut state = self.state.lock().await;
        if !state.seen.insert(request.dedup_key()) {
            return false;
        }
        state.priority.push_front(request);
        true
    }

    /// Put a request back for another attempt. Bypasses dedup (the
    /// url is already in `seen`) and jumps the ordinary queue.
    pub async fn requeue(&self, request: PageRequest) {
        let mut state = self.state.lock().await;
        state.priority.push_back(request);
    }

    /// Claim the next request, consuming one unit of budget.
    pub async fn next(&self) -> Option<PageRequest> {
        let mut state = self.state.lock().await;
        if state.remaining_budget == 0 {
            return None;
        }
        let request = state.priority.pop_front().or_else(|| state.queue.pop_front())?;
        state.remaining_budget -= 1;
        state.in_flight += 1;
        Some(request)
    }

    /// Mark a claimed request as finished, pass or fail.
    pub async fn complete(&self) {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    pub async fn remaining_budget(&self) -> u64 {
        self.state.lock().await.remaining_budget
    }

    /// True when no work is queued and nothing is being processed.
    pub async fn is_idle(&self) -> bool {
        let state = self.state.lock().await;
        state.queue.is_empty() && state.priority.is_empty() && state.in_flight == 0
    }
}
