//! In-memory socket doubles for session tests.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::ws::Message;
use futures_util::Sink;

/// Sink recording every frame written to it.
#[derive(Debug, Default)]
pub struct CaptureSink {
    /// Frames in send order.
    pub sent: Vec<Message>,
}

impl CaptureSink {
    /// Text payloads of the recorded frames, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .iter()
            .filter_map(|frame| match frame {
                Message::Text(text) => Some(text.to_string()),
                _ => None,
            })
            .collect()
    }
}

impl Sink<Message> for CaptureSink {
    type Error = axum::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.get_mut().sent.push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
