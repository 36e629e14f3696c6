//! Session failure taxonomy.
//!
//! Every stage of a run reports its own failure kind. A process that
//! exits with a non-zero code is not an error; it is reported through
//! the exit event like any other completion.

use thiserror::Error;

use crate::models::ErrorKind;

/// Terminal failure of one session. There is no retry of connection,
/// upload, or execution.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The file set reference resolved to no files.
    #[error("no files found for sheet {sheet_id}/{version_id}")]
    NotFound {
        /// Sheet identifier.
        sheet_id: String,
        /// Version identifier.
        version_id: String,
    },

    /// The file set's language tag is not supported.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Remote connection handshake failed (auth or network).
    #[error("remote connection failed: {0}")]
    Connection(#[source] anyhow::Error),

    /// Directory or file provisioning failed.
    #[error("workspace provisioning failed at {path}: {source}")]
    Workspace {
        /// The path that failed to provision.
        path: String,
        /// Underlying transport failure.
        #[source]
        source: anyhow::Error,
    },

    /// The exec channel failed to open.
    #[error("failed to start remote process: {0}")]
    Exec(#[source] anyhow::Error),
}

impl SessionError {
    /// Category for the client-facing error envelope.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Workspace { .. } => ErrorKind::Workspace,
            Self::Exec(_) => ErrorKind::Exec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = SessionError::UnsupportedLanguage("ruby".into());
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
        assert_eq!(err.to_string(), "unsupported language: ruby");

        let err = SessionError::Workspace {
            path: "a/b.txt".into(),
            source: anyhow::anyhow!("mkdir failed"),
        };
        assert_eq!(err.kind(), ErrorKind::Workspace);
        assert!(err.to_string().contains("a/b.txt"));
    }
}
