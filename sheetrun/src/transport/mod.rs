//! Remote transport seam.
//!
//! The orchestration never speaks the SSH wire protocol itself; it
//! drives these traits. The production implementation shells out to the
//! OpenSSH client over a persistent control connection; tests use an
//! in-memory fake so the session state machine runs without a network.

mod fake;
mod openssh;

pub use fake::{ExecScript, FakeRemote, FakeTransport};
pub use openssh::OpenSshTransport;

use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Connection parameters for the remote runner host.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Hostname or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Identity file path, if not relying on the agent.
    pub identity_file: Option<String>,
}

impl RemoteConfig {
    /// `user@host` target string.
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Event from a running remote process.
#[derive(Debug, Clone)]
pub enum ExecEvent {
    /// A chunk of terminal output (stdout and stderr merged).
    Output(String),
    /// The process finished with the given exit code.
    Exit(Option<i32>),
}

/// Handle to one remote process under a pseudo-terminal.
///
/// Exclusively owned by the session that opened it. Dropping the handle
/// without calling [`ExecHandle::shutdown`] leaves the process to run
/// to completion.
#[derive(Debug)]
pub struct ExecHandle {
    /// Stream of output chunks, ending with [`ExecEvent::Exit`].
    pub output: mpsc::Receiver<ExecEvent>,
    input: mpsc::Sender<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ExecHandle {
    /// Assemble a handle from its channel halves.
    pub fn new(
        output: mpsc::Receiver<ExecEvent>,
        input: mpsc::Sender<String>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            output,
            input,
            shutdown: Some(shutdown),
        }
    }

    /// Forward a keystroke payload verbatim to the process's input.
    pub async fn send_input(&self, data: String) -> Result<()> {
        self.input
            .send(data)
            .await
            .context("exec channel input closed")
    }

    /// Kill the remote process driver. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Factory for remote connections.
#[async_trait]
pub trait RemoteTransport: Send + Sync + fmt::Debug {
    /// Perform the connection handshake.
    async fn connect(&self, config: &RemoteConfig) -> Result<Box<dyn RemoteConnection>>;
}

/// One established connection to the remote host.
///
/// File operations back the workspace materializer; `exec` opens the
/// interactive channel. All methods are one session's exclusive use.
#[async_trait]
pub trait RemoteConnection: Send + Sync + fmt::Debug {
    /// Create a single directory (no parents). Fails if it exists.
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Whether a path exists on the remote host.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Write a file in full. Resolves only once the remote stream is
    /// flushed and closed, so subsequent commands see all bytes.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Remove a path recursively. Used for workspace cleanup.
    async fn remove_all(&self, path: &str) -> Result<()>;

    /// Launch a command under a pseudo-terminal with the given extra
    /// environment, returning the interactive channel.
    async fn exec(&self, command: &str, env: &HashMap<String, String>) -> Result<ExecHandle>;

    /// Tear down the connection. Idempotent at the remote end.
    async fn close(&self) -> Result<()>;
}

/// Quote a string for the remote shell.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".into()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_remote_config_target() {
        let config = RemoteConfig {
            host: "runner.example.com".into(),
            port: 22,
            user: "sheets".into(),
            identity_file: None,
        };
        assert_eq!(config.target(), "sheets@runner.example.com");
    }
}
