//! Wire protocol for the client WebSocket channel.
//!
//! One long-lived socket per client. The client starts a run and sends
//! keystrokes; the server streams merged terminal output, a structured
//! error envelope on failure, and a final exit event.

use serde::{Deserialize, Serialize};

/// Events sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Start a run for the referenced file set.
    Start {
        /// Sheet (collection) identifier.
        sheet_id: String,
        /// Version (sub-collection) identifier.
        version_id: String,
    },
    /// Keystrokes for the running process. Only meaningful while the
    /// session is executing; ignored otherwise.
    Input {
        /// Raw input payload, forwarded verbatim.
        input: String,
    },
}

/// Events sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Human-readable status or process output text. Stdout and stderr
    /// are merged into this one stream, matching terminal semantics.
    Message {
        /// The text chunk.
        text: String,
    },
    /// A failure that ended the session. The kind lets clients branch
    /// without string matching; the message is for display.
    Error {
        /// Machine-readable failure category.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },
    /// The process finished. Always the final event of a successful run,
    /// whatever the code.
    Exit {
        /// Process exit code, if the process exited normally.
        code: Option<i32>,
    },
}

/// Failure categories for the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The file set reference resolved to no files.
    NotFound,
    /// The file set's language is not one the runner supports.
    UnsupportedLanguage,
    /// Remote connection handshake failed.
    Connection,
    /// Directory or file provisioning failed.
    Workspace,
    /// The exec channel failed to open.
    Exec,
}
