//! Socket session tracking.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Count live sessions for graceful shutdown
//! - Keep the active-session gauge current

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::observability::metrics;

/// Unique identifier for one upgraded connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Tracks live socket sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active: Arc<AtomicU64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new session. The returned guard ends it when dropped.
    pub fn track(&self, endpoint: &str) -> SessionGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::session_opened(active);

        let guard = SessionGuard {
            active: Arc::clone(&self.active),
            id: SessionId::new(),
            endpoint: endpoint.to_string(),
            started: Instant::now(),
        };
        tracing::trace!(session_id = %guard.id, endpoint = %endpoint, "Session opened");
        guard
    }

    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no sessions remain or `timeout` elapses.
    /// Returns true if every session closed in time.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.active_count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }
}

/// Guard for one session's lifetime.
#[derive(Debug)]
pub struct SessionGuard {
    active: Arc<AtomicU64>,
    id: SessionId,
    endpoint: String,
    started: Instant,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::session_closed(&self.endpoint, active, self.started.elapsed());
        tracing::trace!(
            session_id = %self.id,
            endpoint = %self.endpoint,
            duration_ms = self.started.elapsed().as_millis() as u64,
            "Session closed"
        );
    }
}
