//! Caller-driven cancellation and deadlines for store operations.
//!
//! A [`CancelHandle`] and its [`CancelToken`]s share a watch channel. An [`Interrupt`] couples an
//! optional token with an optional deadline and races them against an operation future.

use std::future::{Future, pending};
use std::time::Duration;

use tokio::sync::watch;

use crate::error::Interrupted;

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

/// Observer side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Create a handle with no outstanding cancellation.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Issue a token observing this handle.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }

    /// Signal cancellation to every token.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Whether cancellation has already been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is requested. Never resolves if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                pending::<()>().await;
            }
        }
    }
}

/// Cancellation and deadline policy applied to each store operation.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    token: Option<CancelToken>,
    deadline: Option<Duration>,
}

impl Interrupt {
    /// Policy that never interrupts.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            token: None,
            deadline: None,
        }
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Bound every operation by `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Configured deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Drive `operation` to completion unless cancellation or the deadline wins first.
    ///
    /// # Errors
    ///
    /// Propagates the operation's own error, or converts [`Interrupted`] into `E` when the
    /// operation was stopped.
    pub async fn run<T, E, F>(&self, operation: &'static str, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<(&'static str, Interrupted)> + Send,
    {
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(E::from((operation, Interrupted::Cancelled)));
        }

        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };

        let bounded = async {
            match self.deadline {
                Some(limit) => match tokio::time::timeout(limit, future).await {
                    Ok(result) => result,
                    Err(_) => Err(E::from((
                        operation,
                        Interrupted::DeadlineExceeded { limit },
                    ))),
                },
                None => future.await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(E::from((operation, Interrupted::Cancelled))),
            result = bounded => result,
        }
    }
}

impl From<(&'static str, Interrupted)> for crate::DataError {
    fn from((operation, reason): (&'static str, Interrupted)) -> Self {
        Self::Interrupted { operation, reason }
    }
}
