//! Session model: one per client connection attempting execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FileSetRef;

/// States of the session lifecycle.
///
/// `Closed` and `Failed` are terminal; a session is never reused. A new
/// start request always creates a new session with a fresh remote root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, nothing started yet.
    Idle,
    /// Fetching the file set and opening the remote connection.
    Connecting,
    /// Materializing the workspace on the remote host.
    Uploading,
    /// Process running; the exec channel is exclusively owned.
    Executing,
    /// Process exited and the exit code was reported.
    Closed,
    /// Terminal failure; all remote resources released.
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Uploading => "uploading",
            Self::Executing => "executing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Per-connection session value object, owned by the session runner.
#[derive(Debug, Clone)]
pub struct Session {
    /// Identifier of the client channel.
    pub id: Uuid,
    /// Reference used to fetch source files from the sheet store.
    pub file_set: FileSetRef,
    /// Unique scratch directory on the remote host. Never reused.
    pub remote_root: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Entry file, resolved once per session.
    pub entry_path: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with a freshly derived remote root under the
    /// given scratch root. The root combines wall-clock millis with a
    /// random suffix so concurrent sessions never collide.
    pub fn new(id: Uuid, file_set: FileSetRef, scratch_root: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let salt: u32 = rand::random();
        let scratch = scratch_root.trim_end_matches('/');
        Self {
            id,
            file_set,
            remote_root: format!("{scratch}/run-{millis}-{salt:08x}"),
            state: SessionState::Idle,
            entry_path: None,
            created_at: Utc::now(),
        }
    }

    /// Summary for the sessions API.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            sheet_id: self.file_set.sheet_id.clone(),
            version_id: self.file_set.version_id.clone(),
            state: self.state,
            remote_root: self.remote_root.clone(),
            entry_path: self.entry_path.clone(),
            created_at: self.created_at,
        }
    }
}

/// Serializable session summary for listing live sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub id: Uuid,
    /// Sheet the session is running.
    pub sheet_id: String,
    /// Version within the sheet.
    pub version_id: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Remote workspace path.
    pub remote_root: String,
    /// Entry file, once resolved.
    pub entry_path: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
