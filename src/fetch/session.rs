//! Rotating session identities with bounded reuse.
//!
//! The pool is the only shared mutable resource in the engine. All
//! checkout/release/retire transitions run under one lock, so no two
//! workers ever hold the same session and no session is reused after
//! retirement.

use tokio::sync::{Mutex, Notify};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Healthy,
    Retired,
}

/// One rotating identity. A worker holds a checked-out session for
/// exactly one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: u64,
    pub usage_count: u32,
    pub max_usage: u32,
    pub status: SessionStatus,
}

struct Slot {
    session: Session,
    checked_out: bool,
}

struct PoolState {
    slots: Vec<Slot>,
    next_id: u64,
    retired_total: u64,
}

/// Bounded pool of rotating sessions.
pub struct SessionPool {
    capacity: usize,
    max_usage: u32,
    state: Mutex<PoolState>,
    freed: Notify,
}

impl SessionPool {
    pub fn new(capacity: usize, max_usage: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            max_usage: max_usage.max(1),
            state: Mutex::new(PoolState {
                slots: Vec::new(),
                next_id: 0,
                retired_total: 0,
            }),
            freed: Notify::new(),
        }
    }

    /// Check out a healthy session, provisioning one lazily while the
    /// pool has capacity. Suspends the caller when saturated.
    pub async fn checkout(&self) -> Session {
        loop {
            let notified = self.freed.notified();
            {
                let mut state = self.state.lock().await;
                // Retired slots leave rotation as soon as they are back.
                state
                    .slots
                    .retain(|s| s.checked_out || s.session.status == SessionStatus::Healthy);
                if let Some(slot) = state
                    .slots
                    .iter_mut()
                    .find(|s| !s.checked_out && s.session.status == SessionStatus::Healthy)
                {
                    slot.checked_out = true;
                    return slot.session.clone();
                }
                if state.slots.len() < self.capacity {
                    let session = Session {
                        id: state.next_id,
                        usage_count: 0,
                        max_usage: self.max_usage,
                        status: SessionStatus::Healthy,
                    };
                    state.next_id += 1;
                    state.slots.push(Slot {
                        session: session.clone(),
                        checked_out: true,
                    });
                    debug!("Provisioned session {}", session.id);
                    return session;
                }
            }
            notified.await;
        }
    }

    /// Return a session to rotation, counting the use and retiring it
    /// once its usage ceiling is reached.
    pub async fn release(&self, session: &Session) {
        {
            let mut state = self.state.lock().await;
            if let Some(slot) = state.slots.iter_mut().find(|s| s.session.id == session.id) {
                slot.checked_out = false;
                slot.session.usage_count += 1;
                if slot.session.usage_count >= slot.session.max_usage {
                    slot.session.status = SessionStatus::Retired;
                    state.retired_total += 1;
                    debug!(
                        "Session {} retired after {} uses",
                        session.id, session.usage_count + 1
                    );
                }
            }
        }
        self.freed.notify_one();
    }

    /// Immediately remove a session from rotation. The next checkout
    /// provisions a replacement identity.
    pub async fn retire(&self, session: &Session) {
        {
            let mut state = self.state.lock().await;
            if let Some(slot) = state.slots.iter_mut().find(|s| s.session.id == session.id) {
                slot.checked_out = false;
                slot.session.status = SessionStatus::Retired;
                state.retired_total += 1;
                debug!("Session {} retired", session.id);
            }
        }
        self.freed.notify_one();
    }

    /// Number of sessions currently checked out.
    pub async fn checked_out(&self) -> usize {
        let state = self.state.lock().await;
        state.slots.iter().filter(|s| s.checked_out).count()
    }

    /// Total sessions retired over the pool's lifetime.
    pub async fn retired_total(&self) -> u64 {
        self.state.lock().await.retired_total
    }
}
