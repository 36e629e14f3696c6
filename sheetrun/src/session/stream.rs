//! Stream multiplexer: bridges one exec channel and one client socket.
//!
//! Process output chunks become `message` events; client `input`
//! events become keystrokes on the exec channel's input side. Stdout
//! and stderr arrive already merged, matching terminal semantics.
//! Input is only ever forwarded to this session's channel.
//!
//! Generic over the socket halves so the loop runs against in-memory
//! doubles in tests.

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};

use crate::models::{ClientEvent, ServerEvent};
use crate::transport::{ExecEvent, ExecHandle};

/// How the multiplexing loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The process finished; the exit event was already sent.
    Exited(Option<i32>),
    /// The client went away mid-run.
    Disconnected,
}

/// Serialize and send one server event. An error means the client
/// channel is gone.
pub async fn send_event<W>(sink: &mut W, event: &ServerEvent) -> Result<(), W::Error>
where
    W: Sink<Message> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(_) => Ok(()),
    }
}

/// Forward I/O in both directions until process exit or disconnect.
///
/// On exit, the final `exit` event carrying the code is emitted before
/// returning, so it reaches the client before the connection is torn
/// down. On disconnect nothing further is sent.
pub async fn pump<W, R, E>(sink: &mut W, stream: &mut R, exec: &mut ExecHandle) -> PumpOutcome
where
    W: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        tokio::select! {
            event = exec.output.recv() => match event {
                Some(ExecEvent::Output(chunk)) => {
                    let message = ServerEvent::Message { text: chunk };
                    if send_event(sink, &message).await.is_err() {
                        return PumpOutcome::Disconnected;
                    }
                }
                Some(ExecEvent::Exit(code)) => {
                    let _ = send_event(sink, &ServerEvent::Exit { code }).await;
                    return PumpOutcome::Exited(code);
                }
                None => return PumpOutcome::Exited(None),
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(ClientEvent::Input { input }) = serde_json::from_str(&text) {
                        // A full input channel or dead process driver is
                        // not fatal here; exit arrives via the output side.
                        let _ = exec.send_input(input).await;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    return PumpOutcome::Disconnected;
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::CaptureSink;
    use crate::transport::{ExecScript, FakeTransport, RemoteConfig, RemoteTransport};
    use std::collections::HashMap;

    async fn open_exec(script: ExecScript) -> ExecHandle {
        let transport = FakeTransport::with_script(script);
        let config = RemoteConfig {
            host: "fake".into(),
            port: 22,
            user: "runner".into(),
            identity_file: None,
        };
        let conn = transport.connect(&config).await.unwrap();
        conn.exec("python3 main.py", &HashMap::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_pump_forwards_output_then_exit() {
        let mut exec = open_exec(ExecScript {
            chunks: vec!["hi\r\n".into()],
            exit_code: Some(0),
            ..ExecScript::default()
        })
        .await;
        let mut sink = CaptureSink::default();
        let mut stream = futures_util::stream::pending::<Result<Message, axum::Error>>();

        let outcome = pump(&mut sink, &mut stream, &mut exec).await;

        assert_eq!(outcome, PumpOutcome::Exited(Some(0)));
        assert_eq!(
            sink.texts(),
            vec![
                r#"{"type":"message","text":"hi\r\n"}"#,
                r#"{"type":"exit","code":0}"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_stops_on_close_frame() {
        let mut exec = open_exec(ExecScript {
            hold_open: true,
            ..ExecScript::default()
        })
        .await;
        let mut sink = CaptureSink::default();
        let mut stream = futures_util::stream::iter(vec![Ok::<_, axum::Error>(
            Message::Close(None),
        )]);

        let outcome = pump(&mut sink, &mut stream, &mut exec).await;

        assert_eq!(outcome, PumpOutcome::Disconnected);
        assert!(sink.texts().is_empty());
    }
}
