use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Status;

/// Execution context carried through every remote call.
///
/// Holds a cancellation token, an optional deadline, and request metadata
/// (sent by transports as headers). Contexts are immutable: the `with_*`
/// methods return a derived context and leave `self` untouched. Clone is a
/// cheap refcount bump, so one context can back many concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    metadata: Arc<BTreeMap<String, String>>,
}

impl Context {
    /// A context with no deadline, no metadata, and a fresh cancellation token.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context whose cancellation is triggered by `self` or by the
    /// returned context's own [`cancel`](Self::cancel).
    pub fn with_cancel(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            metadata: Arc::clone(&self.metadata),
        }
    }

    /// Derive a context that expires after `timeout`. An earlier deadline
    /// inherited from `self` is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let mut ctx = self.with_cancel();
        ctx.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        ctx
    }

    /// Derive a context carrying an additional metadata entry.
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut metadata = (*self.metadata).clone();
        metadata.insert(key.into(), value.into());
        Self {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            metadata: Arc::new(metadata),
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Drive `call` to completion unless the context is cancelled or its
    /// deadline passes first, in which case the call is dropped and a
    /// `Cancelled` / `DeadlineExceeded` status is returned.
    pub async fn run<T, F>(&self, call: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Status::cancelled("context cancelled"));
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                Err(Status::deadline_exceeded("context deadline exceeded"))
            }
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Status::cancelled("context cancelled")),
                    _ = tokio::time::sleep_until(deadline) => {
                        Err(Status::deadline_exceeded("context deadline exceeded"))
                    }
                    result = call => result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(Status::cancelled("context cancelled")),
                    result = call => result,
                }
            }
        }
    }
}
