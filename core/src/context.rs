//! Task context: disposal notification and failure sink
//!
//! A [`TaskContext`] stands in for the host framework's lifecycle object. It
//! carries the two collaborator interfaces the supervision layer consumes:
//!
//! - a **disposal hook**: a watch flag flipped exactly once when the context
//!   begins disposing, observable by any number of subscribers;
//! - a **failure sink**: a channel through which event handlers can inject an
//!   asynchronous failure into the enclosing unit of work, outside the
//!   task's own control flow.
//!
//! The context is cheap to clone; clones share the same disposal flag and
//! failure sink.

use crate::CoreError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Lifecycle context for a supervised unit of work
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Disposal flag; flipped to true exactly once
    dispose_tx: watch::Sender<bool>,
    /// Failure sink draining into the host
    failure_tx: mpsc::UnboundedSender<CoreError>,
}

impl TaskContext {
    /// Create a new context together with the receiving end of its failure
    /// sink. The host keeps the receiver and treats any delivered error as a
    /// failure of the enclosing unit of work.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoreError>) {
        let (dispose_tx, _) = watch::channel(false);
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();

        (
            Self {
                dispose_tx,
                failure_tx,
            },
            failure_rx,
        )
    }

    /// Begin disposing the context. Idempotent: subscribers are notified
    /// only on the first call.
    pub fn dispose(&self) {
        let flipped = self.dispose_tx.send_if_modified(|disposed| {
            if *disposed {
                false
            } else {
                *disposed = true;
                true
            }
        });
        if flipped {
            debug!("Context disposed");
        }
    }

    /// Check whether the context has been disposed
    pub fn is_disposed(&self) -> bool {
        *self.dispose_tx.borrow()
    }

    /// Subscribe to the disposal notification
    ///
    /// The returned receiver marks the current value as seen; callers that
    /// may subscribe after disposal should check [`is_disposed`] first.
    ///
    /// [`is_disposed`]: TaskContext::is_disposed
    pub fn disposed(&self) -> watch::Receiver<bool> {
        self.dispose_tx.subscribe()
    }

    /// Inject a failure into the enclosing unit of work
    ///
    /// Best-effort: if the host has already dropped the failure receiver,
    /// the error is logged and discarded.
    pub fn fail(&self, err: CoreError) {
        if let Err(e) = self.failure_tx.send(err) {
            warn!("Failure sink closed, dropping error: {}", e.0);
        }
    }
}
