//! Session lifecycle: registry, state machine, and stream plumbing.
//!
//! One session per client WebSocket. The runner drives a linear
//! sequence of awaited stages (fetch, prepare, connect, materialize,
//! exec), then the multiplexer forwards terminal I/O until the process
//! exits or the client disconnects.

mod runner;
mod stream;
#[cfg(test)]
mod testing;

pub use runner::handle_socket;

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{SessionInfo, SessionState};

/// Registry of live sessions, for the sessions API.
///
/// Sessions own their remote resources exclusively; this map only
/// tracks summaries for observability.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, SessionInfo>>,
}

impl SessionManager {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new session.
    pub async fn insert(&self, info: SessionInfo) {
        self.sessions.write().await.insert(info.id, info);
    }

    /// Record a state transition.
    pub async fn update_state(&self, id: Uuid, state: SessionState) {
        if let Some(info) = self.sessions.write().await.get_mut(&id) {
            info.state = state;
        }
    }

    /// Stop tracking a finished session.
    pub async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    /// Snapshot of live sessions, newest first.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }
}
