//! Session state machine.
//!
//! Each stage is a small async function returning a tagged result, so
//! the lifecycle (fetch → prepare → connect → materialize → exec) is
//! inspectable and testable without a network or a live socket. The
//! socket loop at the top is a thin shell around the stages.
//!
//! Correctness properties enforced here:
//! - Lookup and language failures happen before any remote resource
//!   is allocated.
//! - The exec command never starts before materialization completes.
//! - Every path out of an established connection closes it exactly
//!   once (teardown consumes the connection).
//! - A client disconnect in any state tears down remote resources and
//!   emits nothing further; the remote stages race against the client
//!   stream so a mid-stage disconnect cancels the stage.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Stream, StreamExt};
use uuid::Uuid;

use super::stream::{pump, send_event, PumpOutcome};
use crate::command::{self, RunPlan};
use crate::envfile;
use crate::error::SessionError;
use crate::models::{ClientEvent, FileEntry, FileSetRef, ServerEvent, Session, SessionState};
use crate::server::AppState;
use crate::store::SheetStore;
use crate::transport::{ExecHandle, RemoteConfig, RemoteConnection, RemoteTransport};
use crate::workspace;

/// Drive one client socket through a full session lifecycle.
pub async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    let Some(file_set) = await_start(&mut stream).await else {
        return;
    };

    let mut session = Session::new(Uuid::now_v7(), file_set, &state.config.scratch_root);
    state.sessions.insert(session.info()).await;
    tracing::info!(
        session = %session.id,
        sheet = %session.file_set,
        remote_root = %session.remote_root,
        "session started"
    );

    if let Err(err) = drive(&state, &mut session, &mut sink, &mut stream).await {
        tracing::warn!(session = %session.id, error = %err, "session failed");
        transition(&state, &mut session, SessionState::Failed).await;
        let _ = send_event(
            &mut sink,
            &ServerEvent::Error {
                kind: err.kind(),
                message: err.to_string(),
            },
        )
        .await;
    }

    state.sessions.remove(session.id).await;
    tracing::info!(session = %session.id, state = %session.state, "session ended");
}

/// Wait for the start request. Anything else before it is ignored.
async fn await_start(stream: &mut SplitStream<WebSocket>) -> Option<FileSetRef> {
    while let Some(Ok(message)) = stream.next().await {
        if let Message::Text(text) = message {
            if let Ok(ClientEvent::Start {
                sheet_id,
                version_id,
            }) = serde_json::from_str(&text)
            {
                return Some(FileSetRef {
                    sheet_id,
                    version_id,
                });
            }
        }
    }
    None
}

/// The linear stage sequence. On error the remote connection, if one
/// was opened, has already been torn down.
async fn drive(
    state: &AppState,
    session: &mut Session,
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
) -> Result<(), SessionError> {
    transition(state, session, SessionState::Connecting).await;

    // Pure preparation first: both failures here require no cleanup.
    let files = fetch_stage(state.store.as_ref(), &session.file_set).await?;
    let plan = command::synthesize(&files, &session.remote_root, &state.config.python_bin)?;
    session.entry_path = Some(plan.entry_path.clone());
    state.sessions.insert(session.info()).await;
    let env = envfile::resolve(&files);

    let status = ServerEvent::Message {
        text: "Connecting to runner...\r\n".into(),
    };
    if send_event(sink, &status).await.is_err() {
        transition(state, session, SessionState::Failed).await;
        return Ok(());
    }

    let conn = match until_disconnect(
        stream,
        connect_stage(
            state.transport.as_ref(),
            &state.config.remote,
            state.config.connect_timeout,
        ),
    )
    .await
    {
        Some(result) => result?,
        None => {
            tracing::info!(session = %session.id, "client disconnected while connecting");
            transition(state, session, SessionState::Failed).await;
            return Ok(());
        }
    };

    transition(state, session, SessionState::Uploading).await;
    let status = ServerEvent::Message {
        text: format!("Uploading {} file(s)...\r\n", files.len()),
    };
    if send_event(sink, &status).await.is_err() {
        teardown(state, session, conn).await;
        transition(state, session, SessionState::Failed).await;
        return Ok(());
    }

    match until_disconnect(
        stream,
        upload_stage(
            conn.as_ref(),
            &session.remote_root,
            &files,
            state.config.upload_timeout,
        ),
    )
    .await
    {
        Some(Ok(())) => {}
        Some(Err(err)) => {
            teardown(state, session, conn).await;
            return Err(err);
        }
        None => {
            tracing::info!(session = %session.id, "client disconnected during upload");
            teardown(state, session, conn).await;
            transition(state, session, SessionState::Failed).await;
            return Ok(());
        }
    }

    transition(state, session, SessionState::Executing).await;
    let mut exec = match until_disconnect(stream, exec_stage(conn.as_ref(), &plan, &env)).await {
        Some(Ok(handle)) => handle,
        Some(Err(err)) => {
            teardown(state, session, conn).await;
            return Err(err);
        }
        None => {
            tracing::info!(session = %session.id, "client disconnected before launch");
            teardown(state, session, conn).await;
            transition(state, session, SessionState::Failed).await;
            return Ok(());
        }
    };

    let status = ServerEvent::Message {
        text: format!("$ {}\r\n", plan.command),
    };
    if send_event(sink, &status).await.is_err() {
        exec.shutdown();
        teardown(state, session, conn).await;
        transition(state, session, SessionState::Failed).await;
        return Ok(());
    }

    match pump(sink, stream, &mut exec).await {
        PumpOutcome::Exited(code) => {
            tracing::info!(session = %session.id, code = ?code, "process exited");
            transition(state, session, SessionState::Closed).await;
            teardown(state, session, conn).await;
        }
        PumpOutcome::Disconnected => {
            tracing::info!(session = %session.id, "client disconnected while executing");
            exec.shutdown();
            transition(state, session, SessionState::Failed).await;
            teardown(state, session, conn).await;
        }
    }
    Ok(())
}

/// Fetch the file set. Missing or empty sets fail before any remote
/// resource is allocated; store failures are terminal for the session.
async fn fetch_stage(
    store: &dyn SheetStore,
    file_set: &FileSetRef,
) -> Result<Vec<FileEntry>, SessionError> {
    let not_found = || SessionError::NotFound {
        sheet_id: file_set.sheet_id.clone(),
        version_id: file_set.version_id.clone(),
    };
    match store.fetch_file_set(file_set).await {
        Ok(Some(files)) if !files.is_empty() => Ok(files),
        Ok(_) => Err(not_found()),
        Err(source) => {
            tracing::warn!(sheet = %file_set, error = %source, "store lookup failed");
            Err(not_found())
        }
    }
}

/// Open the remote connection within the configured handshake budget.
async fn connect_stage(
    transport: &dyn RemoteTransport,
    remote: &RemoteConfig,
    budget: Duration,
) -> Result<Box<dyn RemoteConnection>, SessionError> {
    match tokio::time::timeout(budget, transport.connect(remote)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(source)) => Err(SessionError::Connection(source)),
        Err(_) => Err(SessionError::Connection(anyhow!(
            "handshake timed out after {}s",
            budget.as_secs()
        ))),
    }
}

/// Materialize the workspace within the configured upload budget.
async fn upload_stage(
    conn: &dyn RemoteConnection,
    remote_root: &str,
    files: &[FileEntry],
    budget: Duration,
) -> Result<(), SessionError> {
    match tokio::time::timeout(budget, workspace::materialize(conn, remote_root, files)).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::Workspace {
            path: remote_root.to_string(),
            source: anyhow!("upload timed out after {}s", budget.as_secs()),
        }),
    }
}

/// Open the interactive exec channel.
async fn exec_stage(
    conn: &dyn RemoteConnection,
    plan: &RunPlan,
    env: &HashMap<String, String>,
) -> Result<ExecHandle, SessionError> {
    conn.exec(&plan.command, env).await.map_err(SessionError::Exec)
}

/// Race a stage against the client stream. A disconnect mid-stage
/// cancels the stage and returns `None`; other frames (early input,
/// pings) are ignored.
async fn until_disconnect<R, E, T>(stream: &mut R, stage: impl Future<Output = T>) -> Option<T>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    tokio::pin!(stage);
    loop {
        tokio::select! {
            out = &mut stage => return Some(out),
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => {}
            }
        }
    }
}

/// Release remote resources. Consumes the connection, so every path
/// closes it exactly once; failures here are logged, not surfaced.
async fn release(conn: Box<dyn RemoteConnection>, remote_root: &str, cleanup: bool) {
    if cleanup {
        if let Err(err) = conn.remove_all(remote_root).await {
            tracing::debug!(remote_root, error = %err, "workspace cleanup failed");
        }
    }
    if let Err(err) = conn.close().await {
        tracing::debug!(remote_root, error = %err, "connection close failed");
    }
}

async fn teardown(state: &AppState, session: &Session, conn: Box<dyn RemoteConnection>) {
    release(conn, &session.remote_root, state.config.cleanup_workspace).await;
}

async fn transition(state: &AppState, session: &mut Session, next: SessionState) {
    tracing::debug!(session = %session.id, from = %session.state, to = %next, "state transition");
    session.state = next;
    state.sessions.update_state(session.id, next).await;
}
