//! OpenSSH-backed transport.
//!
//! Opens one persistent control-master connection per session
//! (`ssh -MNf`), then multiplexes file operations and the interactive
//! exec channel over the control socket. File writes pipe content to a
//! remote `cat > path`, so the returned future resolves only after the
//! remote stream is closed. The exec channel runs under `ssh -tt` for
//! pseudo-terminal semantics.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use super::{shell_quote, ExecEvent, ExecHandle, RemoteConfig, RemoteConnection, RemoteTransport};

/// Buffer size for exec output chunks.
const OUTPUT_CHUNK: usize = 4096;

/// Transport that shells out to the system `ssh` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSshTransport;

#[derive(Debug)]
struct OpenSshConnection {
    target: String,
    control_path: PathBuf,
}

#[async_trait]
impl RemoteTransport for OpenSshTransport {
    async fn connect(&self, config: &RemoteConfig) -> Result<Box<dyn RemoteConnection>> {
        let target = config.target();
        let control_path = build_control_path(&target);

        let mut cmd = Command::new("ssh");
        cmd.arg("-MNf")
            .arg("-o")
            .arg("ControlMaster=yes")
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-p")
            .arg(config.port.to_string());
        if let Some(ref identity) = config.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .context("failed to launch ssh for connection handshake")?;
        if !output.status.success() {
            bail!(
                "ssh handshake to {target} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(Box::new(OpenSshConnection {
            target,
            control_path,
        }))
    }
}

impl OpenSshConnection {
    /// Run a one-shot command over the control socket, optionally
    /// piping bytes to its stdin, and wait for it to finish.
    async fn run_remote(&self, remote_command: &str, stdin: Option<&[u8]>) -> Result<RemoteOutput> {
        let mut cmd = Command::new("ssh");
        cmd.arg("-T")
            .arg("-S")
            .arg(&self.control_path)
            .arg("-o")
            .arg("ControlMaster=no")
            .arg(&self.target)
            .arg(remote_command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn ssh for: {remote_command}"))?;

        if let Some(bytes) = stdin {
            let mut handle = child
                .stdin
                .take()
                .context("ssh child missing stdin handle")?;
            handle.write_all(bytes).await.context("ssh stdin write")?;
            handle.shutdown().await.context("ssh stdin close")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("failed to wait for ssh command")?;
        Ok(RemoteOutput {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[derive(Debug)]
struct RemoteOutput {
    success: bool,
    stderr: String,
}

#[async_trait]
impl RemoteConnection for OpenSshConnection {
    async fn mkdir(&self, path: &str) -> Result<()> {
        let result = self
            .run_remote(&format!("mkdir {}", shell_quote(path)), None)
            .await?;
        if !result.success {
            bail!("mkdir {path} failed: {}", result.stderr);
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let result = self
            .run_remote(&format!("test -e {}", shell_quote(path)), None)
            .await?;
        Ok(result.success)
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        // cat only exits once its stdin is closed, so a successful exit
        // means every byte is visible to subsequent remote commands.
        let result = self
            .run_remote(&format!("cat > {}", shell_quote(path)), Some(content))
            .await?;
        if !result.success {
            bail!("write to {path} failed: {}", result.stderr);
        }
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> Result<()> {
        let result = self
            .run_remote(&format!("rm -rf {}", shell_quote(path)), None)
            .await?;
        if !result.success {
            bail!("rm -rf {path} failed: {}", result.stderr);
        }
        Ok(())
    }

    async fn exec(&self, command: &str, env: &HashMap<String, String>) -> Result<ExecHandle> {
        let remote_command = wrap_with_env(command, env);

        let mut child = Command::new("ssh")
            .arg("-tt")
            .arg("-S")
            .arg(&self.control_path)
            .arg("-o")
            .arg("ControlMaster=no")
            .arg(&self.target)
            .arg(&remote_command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn ssh for exec: {remote_command}"))?;

        let mut stdin = child
            .stdin
            .take()
            .context("exec child missing stdin handle")?;
        let stdout = child
            .stdout
            .take()
            .context("exec child missing stdout handle")?;
        let stderr = child
            .stderr
            .take()
            .context("exec child missing stderr handle")?;

        let (out_tx, out_rx) = mpsc::channel::<ExecEvent>(256);
        let (in_tx, mut in_rx) = mpsc::channel::<String>(64);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        // Keystroke writer.
        tokio::spawn(async move {
            while let Some(data) = in_rx.recv().await {
                if stdin.write_all(data.as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdin.flush().await;
            }
        });

        spawn_output_reader(stdout, out_tx.clone());
        spawn_output_reader(stderr, out_tx.clone());

        // Driver: waits for exit, or kills the child on shutdown.
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let code = status.ok().and_then(|s| s.code());
                    let _ = out_tx.send(ExecEvent::Exit(code)).await;
                }
                _ = &mut shutdown_rx => {
                    let _ = child.kill().await;
                    let _ = out_tx.send(ExecEvent::Exit(None)).await;
                }
            }
        });

        Ok(ExecHandle::new(out_rx, in_tx, shutdown_tx))
    }

    async fn close(&self) -> Result<()> {
        let status = Command::new("ssh")
            .arg("-S")
            .arg(&self.control_path)
            .arg("-O")
            .arg("exit")
            .arg(&self.target)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::debug!(target = %self.target, %status, "ssh control exit failed");
            }
            Err(err) => {
                tracing::debug!(target = %self.target, error = %err, "ssh control exit failed");
            }
        }
        let _ = tokio::fs::remove_file(&self.control_path).await;
        Ok(())
    }
}

fn spawn_output_reader<R>(mut reader: R, tx: mpsc::Sender<ExecEvent>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; OUTPUT_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).to_string();
                    if tx.send(ExecEvent::Output(chunk)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Inject user environment variables around the synthesized command.
fn wrap_with_env(command: &str, env: &HashMap<String, String>) -> String {
    if env.is_empty() {
        return command.to_string();
    }
    let mut pairs: Vec<_> = env.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let assignments = pairs
        .iter()
        .map(|(k, v)| shell_quote(&format!("{k}={v}")))
        .collect::<Vec<_>>()
        .join(" ");
    format!("env {assignments} sh -c {}", shell_quote(command))
}

fn build_control_path(target: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    target.hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    let hash = hasher.finish();
    std::env::temp_dir().join(format!("sheetrun-ssh-{hash:x}.sock"))
}
