//! Pending-call table and the deferred result handed to callers.

use crate::error::{FlapiError, Result};
use crate::value::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Outstanding calls keyed by correlation id.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: HashMap<u64, oneshot::Sender<Result<Value>>>,
}

impl PendingCalls {
    /// Record a call and return the caller's half.
    pub fn insert(&mut self, id: u64) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        self.calls.insert(id, tx);
        PendingReply { id, rx }
    }

    /// Settle and remove the call for `id`.
    ///
    /// Returns `false` when no such call is pending (duplicate or late
    /// response).
    pub fn complete(&mut self, id: u64, outcome: Result<Value>) -> bool {
        match self.calls.remove(&id) {
            Some(tx) => {
                // The caller may have stopped waiting.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drop the call for `id` without settling it.
    pub fn remove(&mut self, id: u64) -> bool {
        self.calls.remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.calls.contains_key(&id)
    }

    /// Reject every outstanding call with `ConnectionClosed`.
    pub fn fail_all(&mut self) -> usize {
        let count = self.calls.len();
        for (_, tx) in self.calls.drain() {
            let _ = tx.send(Err(FlapiError::ConnectionClosed));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Deferred result of a call.
///
/// Resolves to the decoded `result`, the remote error, or
/// `ConnectionClosed` if the session goes away first.
#[derive(Debug)]
#[must_use = "a call's reply does nothing unless awaited"]
pub struct PendingReply {
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingReply {
    /// Correlation id of the call.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(FlapiError::ConnectionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
