//! Workspace materializer: provisions a session's remote scratch
//! directory and uploads its file set.
//!
//! Processing is strictly sequential in file-set order. Directory
//! creation for sibling files must not race, and the exec step depends
//! on every byte being durably written, so nothing here runs in
//! parallel.

use anyhow::{Context, Result};

use crate::error::SessionError;
use crate::models::FileEntry;
use crate::transport::RemoteConnection;

/// Idempotently create a directory and all its ancestors.
///
/// Walks path prefixes shortest-first, attempting `mkdir` for each; a
/// failure on a prefix that already exists is success. A `mkdir` that
/// fails on a path that does not exist is retried once (the parent was
/// just ensured) and then fatal. The filesystem root is a fixed point
/// and never created.
pub async fn ensure_directory(conn: &dyn RemoteConnection, path: &str) -> Result<()> {
    for prefix in ancestor_prefixes(path) {
        if conn.mkdir(&prefix).await.is_ok() {
            continue;
        }
        if conn.exists(&prefix).await.unwrap_or(false) {
            continue;
        }
        conn.mkdir(&prefix)
            .await
            .with_context(|| format!("failed to create directory {prefix}"))?;
    }
    Ok(())
}

/// Upload every file in file-set order: ensure its containing
/// directory, then write its content. The first failure aborts the
/// remaining uploads and carries the failing path.
pub async fn materialize(
    conn: &dyn RemoteConnection,
    root: &str,
    files: &[FileEntry],
) -> Result<(), SessionError> {
    for file in files {
        let remote_path = join(root, &file.path);
        if let Some(dir) = parent(&remote_path) {
            ensure_directory(conn, dir)
                .await
                .map_err(|source| SessionError::Workspace {
                    path: file.path.clone(),
                    source,
                })?;
        }
        conn.write_file(&remote_path, file.content.as_bytes())
            .await
            .map_err(|source| SessionError::Workspace {
                path: file.path.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Prefixes of a path from shortest to longest, excluding the root.
fn ancestor_prefixes(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);
        prefixes.push(current.clone());
    }
    prefixes
}

fn join(root: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

fn parent(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorKind;
    use crate::transport::{FakeTransport, RemoteConfig, RemoteTransport};

    fn config() -> RemoteConfig {
        RemoteConfig {
            host: "fake".into(),
            port: 22,
            user: "runner".into(),
            identity_file: None,
        }
    }

    #[test]
    fn test_ancestor_prefixes() {
        assert_eq!(ancestor_prefixes("/tmp/r/a"), vec!["/tmp", "/tmp/r", "/tmp/r/a"]);
        assert_eq!(ancestor_prefixes("a/b"), vec!["a", "a/b"]);
        assert!(ancestor_prefixes("/").is_empty());
    }

    #[tokio::test]
    async fn test_ensure_directory_is_idempotent() {
        let transport = FakeTransport::default();
        let conn = transport.connect(&config()).await.unwrap();

        ensure_directory(conn.as_ref(), "/tmp/r/a").await.unwrap();
        ensure_directory(conn.as_ref(), "/tmp/r/a").await.unwrap();

        let dirs = transport.remote.dirs.lock().unwrap().clone();
        assert_eq!(dirs, vec!["/tmp", "/tmp/r", "/tmp/r/a"]);
    }

    #[tokio::test]
    async fn test_ensure_directory_fatal_when_creation_fails() {
        let transport = FakeTransport::default();
        *transport.remote.mkdir_fail.lock().unwrap() = Some("/tmp/r".to_string());
        let conn = transport.connect(&config()).await.unwrap();

        let err = ensure_directory(conn.as_ref(), "/tmp/r/a").await.unwrap_err();
        assert!(err.to_string().contains("/tmp/r"));
    }

    #[tokio::test]
    async fn test_materialize_shares_directories_and_writes_bytes() {
        let transport = FakeTransport::default();
        let conn = transport.connect(&config()).await.unwrap();
        let files = vec![
            FileEntry::new("a/b.txt", "x", "plaintext"),
            FileEntry::new("a/c.txt", "y", "plaintext"),
        ];

        materialize(conn.as_ref(), "/tmp/run", &files).await.unwrap();

        let dirs = transport.remote.dirs.lock().unwrap().clone();
        // "a" is created once even though both files share it.
        assert_eq!(dirs, vec!["/tmp", "/tmp/run", "/tmp/run/a"]);

        let remote_files = transport.remote.files.lock().unwrap().clone();
        assert_eq!(remote_files.get("/tmp/run/a/b.txt").unwrap(), b"x");
        assert_eq!(remote_files.get("/tmp/run/a/c.txt").unwrap(), b"y");
    }

    #[tokio::test]
    async fn test_materialize_aborts_on_first_failure() {
        let transport = FakeTransport::default();
        *transport.remote.mkdir_fail.lock().unwrap() = Some("/tmp/run/broken".to_string());
        let conn = transport.connect(&config()).await.unwrap();
        let files = vec![
            FileEntry::new("ok.txt", "1", "plaintext"),
            FileEntry::new("broken/fail.txt", "2", "plaintext"),
            FileEntry::new("never.txt", "3", "plaintext"),
        ];

        let err = materialize(conn.as_ref(), "/tmp/run", &files).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Workspace);
        assert!(err.to_string().contains("broken/fail.txt"));

        let remote_files = transport.remote.files.lock().unwrap().clone();
        assert!(remote_files.contains_key("/tmp/run/ok.txt"));
        assert!(!remote_files.contains_key("/tmp/run/never.txt"));
    }
}
