use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::types::Event;
use crate::{HostError, Result};

// ─── EventStream ──────────────────────────────────────────────────────────

/// A live subscription to a host's job event stream.
///
/// Backed by a Tokio mpsc channel. A background task owns the HTTP response
/// body, decodes its server-sent-event frames and forwards each [`Event`] until
/// the host closes the connection. The stream ends (`None`) on EOF; a
/// transport failure is surfaced as a single `Err` item before the end.
///
/// Dropping the stream, or calling [`EventStream::close`], aborts the
/// background task and releases the subscription.
pub struct EventStream {
    rx: mpsc::Receiver<Result<Event>>,
    task: Option<JoinHandle<()>>,
}

impl EventStream {
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(32);

        let task = tokio::spawn(async move {
            let mut frames = response.bytes_stream().eventsource();

            while let Some(frame) = frames.next().await {
                let data = match frame {
                    Ok(f) => f.data,
                    Err(e) => {
                        let _ = tx.send(Err(HostError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                if data.is_empty() {
                    continue;
                }
                let item = match serde_json::from_str::<Event>(&data) {
                    Ok(event) => Ok(event),
                    Err(source) => Err(HostError::Parse {
                        frame: data,
                        source,
                    }),
                };
                if tx.send(item).await.is_err() {
                    return; // Receiver dropped
                }
            }
            debug!("host event stream reached EOF");
        });

        Self {
            rx,
            task: Some(task),
        }
    }

    /// Wrap a channel as an event stream.
    ///
    /// Used by [`crate::Host`] implementations that do not speak HTTP, and by
    /// tests that inject pre-built event sequences. Closing the sender ends
    /// the stream.
    pub fn from_channel(rx: mpsc::Receiver<Result<Event>>) -> Self {
        Self { rx, task: None }
    }

    /// Stop receiving events and release the underlying subscription.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx.close();
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl Stream for EventStream {
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
