//! Reader and writer tasks for one WebSocket connection.
//!
//! The writer drains an unbounded queue of outgoing frames so callers never
//! wait on the socket. The reader hands every text frame to the session and
//! reports the end of the stream exactly once.

use super::SessionInner;
use crate::error::FlapiError;
use futures::{SinkExt, StreamExt};
use std::sync::Weak;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

/// Item queued for the writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(String),
    /// Send a close frame and stop.
    Close,
}

/// A live connection owned by the session.
#[derive(Debug)]
pub(crate) struct Link {
    pub(crate) outbound: mpsc::UnboundedSender<Outbound>,
    /// Distinguishes this connection from earlier ones on the same session.
    pub(crate) generation: u64,
    /// Set once the handshake has succeeded.
    pub(crate) ready: bool,
    writer: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
}

impl Link {
    pub(crate) fn send(&self, frame: String) -> bool {
        self.outbound.send(Outbound::Frame(frame)).is_ok()
    }

    /// Send a close frame, wait for the writer to flush it, then stop reading.
    pub(crate) async fn shutdown(mut self) {
        let _ = self.outbound.send(Outbound::Close);
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Split `ws` and spawn its reader and writer tasks.
pub(crate) fn attach<S>(
    ws: WebSocketStream<S>,
    session: Weak<SessionInner>,
    generation: u64,
) -> Link
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let writer = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Frame(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        warn!("Failed to send frame: {}", e);
                        break;
                    }
                }
                Outbound::Close => {
                    if let Err(e) = sink.close().await {
                        debug!("Close handshake did not complete: {}", e);
                    }
                    break;
                }
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            let Some(inner) = session.upgrade() else {
                break;
            };
            match message {
                Ok(Message::Text(text)) => inner.handle_frame(text.as_str()),
                Ok(Message::Close(frame)) => {
                    debug!("Server closed the connection: {:?}", frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    debug!("Ignoring {} byte binary frame", data.len());
                }
                Ok(_) => {}
                Err(e) => {
                    inner.report(&FlapiError::from(e));
                    break;
                }
            }
        }

        if let Some(inner) = session.upgrade() {
            inner.transport_closed(generation);
        }
    });

    Link {
        outbound: tx,
        generation,
        ready: false,
        writer: Some(writer),
        reader,
    }
}
