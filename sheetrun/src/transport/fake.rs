//! In-memory fake transport for tests and local development.
//!
//! Records every remote interaction (directory creations, file writes,
//! exec commands, inputs, closes) so tests can assert on the exact
//! sequence of side effects, and supports failure injection at each
//! seam of the session state machine.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{ExecEvent, ExecHandle, RemoteConfig, RemoteConnection, RemoteTransport};

/// Scripted behavior for the exec channel.
#[derive(Debug, Clone, Default)]
pub struct ExecScript {
    /// Output chunks emitted before exit.
    pub chunks: Vec<String>,
    /// Exit code reported after the chunks.
    pub exit_code: Option<i32>,
    /// Keep the channel open after the chunks, like a process still
    /// running, until shutdown is signalled.
    pub hold_open: bool,
    /// Fail to open the channel instead of running.
    pub fail_open: bool,
}

/// Shared recording of all remote side effects.
#[derive(Debug, Default)]
pub struct FakeRemote {
    /// Every successful `mkdir`, in call order. Duplicates would show
    /// up here, so tests can assert a directory was created once.
    pub dirs: Mutex<Vec<String>>,
    /// File contents by path.
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Exec invocations: command line plus injected environment.
    pub commands: Mutex<Vec<(String, HashMap<String, String>)>>,
    /// Keystrokes forwarded to the process.
    pub inputs: Arc<Mutex<Vec<String>>>,
    /// Paths removed via `remove_all`.
    pub removed: Mutex<Vec<String>>,
    /// Number of connection handshakes performed.
    pub connects: AtomicUsize,
    /// Number of times the connection was closed.
    pub closes: AtomicUsize,
    /// Path whose `mkdir` fails (simulated permission error).
    pub mkdir_fail: Mutex<Option<String>>,
    /// Script driving the exec channel.
    pub script: Mutex<ExecScript>,
}

/// Transport returning connections backed by one shared [`FakeRemote`].
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    /// The shared remote state, inspectable after a run.
    pub remote: Arc<FakeRemote>,
    /// Make the connection handshake fail.
    pub fail_connect: bool,
}

impl FakeTransport {
    /// Transport whose exec channel emits the given chunks then exits.
    pub fn with_script(script: ExecScript) -> Self {
        let transport = Self::default();
        *transport.remote.script.lock().unwrap() = script;
        transport
    }
}

#[async_trait]
impl RemoteTransport for FakeTransport {
    async fn connect(&self, _config: &RemoteConfig) -> Result<Box<dyn RemoteConnection>> {
        if self.fail_connect {
            bail!("fake handshake refused");
        }
        self.remote.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            remote: Arc::clone(&self.remote),
        }))
    }
}

#[derive(Debug)]
struct FakeConnection {
    remote: Arc<FakeRemote>,
}

#[async_trait]
impl RemoteConnection for FakeConnection {
    async fn mkdir(&self, path: &str) -> Result<()> {
        if self
            .remote
            .mkdir_fail
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|p| p == path)
        {
            bail!("mkdir {path}: permission denied");
        }
        let mut dirs = self.remote.dirs.lock().unwrap();
        if dirs.iter().any(|d| d == path) {
            bail!("mkdir {path}: file exists");
        }
        dirs.push(path.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let in_dirs = self.remote.dirs.lock().unwrap().iter().any(|d| d == path);
        let in_files = self.remote.files.lock().unwrap().contains_key(path);
        Ok(in_dirs || in_files)
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.remote
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> Result<()> {
        self.remote.removed.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn exec(&self, command: &str, env: &HashMap<String, String>) -> Result<ExecHandle> {
        let script = self.remote.script.lock().unwrap().clone();
        if script.fail_open {
            bail!("fake exec channel refused");
        }
        self.remote
            .commands
            .lock()
            .unwrap()
            .push((command.to_string(), env.clone()));

        let (out_tx, out_rx) = mpsc::channel::<ExecEvent>(64);
        let (in_tx, mut in_rx) = mpsc::channel::<String>(64);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let inputs = Arc::clone(&self.remote.inputs);
        tokio::spawn(async move {
            while let Some(data) = in_rx.recv().await {
                inputs.lock().unwrap().push(data);
            }
        });

        tokio::spawn(async move {
            for chunk in script.chunks {
                tokio::select! {
                    sent = out_tx.send(ExecEvent::Output(chunk)) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                    _ = &mut shutdown_rx => return,
                }
            }
            if script.hold_open {
                let _ = (&mut shutdown_rx).await;
                return;
            }
            let _ = out_tx.send(ExecEvent::Exit(script.exit_code)).await;
        });

        Ok(ExecHandle::new(out_rx, in_tx, shutdown_tx))
    }

    async fn close(&self) -> Result<()> {
        self.remote.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            host: "fake".into(),
            port: 22,
            user: "runner".into(),
            identity_file: None,
        }
    }

    #[tokio::test]
    async fn test_mkdir_records_and_rejects_duplicates() {
        let transport = FakeTransport::default();
        let conn = transport.connect(&config()).await.unwrap();

        conn.mkdir("/tmp/a").await.unwrap();
        assert!(conn.mkdir("/tmp/a").await.is_err());
        assert!(conn.exists("/tmp/a").await.unwrap());
        assert_eq!(transport.remote.dirs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_exec_emits_output_then_exit() {
        let transport = FakeTransport::with_script(ExecScript {
            chunks: vec!["hello\n".into()],
            exit_code: Some(0),
            ..ExecScript::default()
        });
        let conn = transport.connect(&config()).await.unwrap();
        let mut handle = conn.exec("node index.js", &HashMap::new()).await.unwrap();

        handle.send_input("y\n".into()).await.unwrap();

        let mut saw_output = false;
        while let Some(event) = handle.output.recv().await {
            match event {
                ExecEvent::Output(chunk) => {
                    assert_eq!(chunk, "hello\n");
                    saw_output = true;
                }
                ExecEvent::Exit(code) => {
                    assert_eq!(code, Some(0));
                    break;
                }
            }
        }
        assert!(saw_output);

        // Input recording runs on a spawned task; give it a beat.
        for _ in 0..10 {
            if !transport.remote.inputs.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.remote.inputs.lock().unwrap()[0], "y\n");
    }
}
