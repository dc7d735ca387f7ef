//! Cancellation and deadline propagation for insertion calls.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason an operation was abandoned before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    /// The caller cancelled the context.
    #[error("operation was cancelled")]
    Cancelled,
    /// The context deadline passed.
    #[error("operation exceeded its deadline")]
    DeadlineExceeded,
}

/// Cancellable, deadline-bearing context handed to consumers.
///
/// Cloning shares the cancellation state; [`ExecutionContext::child`] derives
/// a context that is cancelled with its parent but can also be cancelled on
/// its own.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use geosink_core::{ExecutionContext, Interrupted};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = ExecutionContext::with_timeout(Duration::from_secs(1));
/// assert_eq!(ctx.run(async { 7 }).await, Ok(7));
///
/// ctx.cancel();
/// assert_eq!(ctx.run(async { 7 }).await, Err(Interrupted::Cancelled));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    /// A context with no deadline that is never cancelled unless asked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    /// Bind a deadline, keeping the earlier one if a deadline is already set.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(
            self.deadline
                .map_or(deadline, |current| current.min(deadline)),
        );
        self
    }

    /// The bound deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a context cancelled together with this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `future` to completion unless the context is cancelled or its
    /// deadline passes first. The future is dropped when interrupted.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            () = expired => Err(Interrupted::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn completes_before_deadline() {
        let ctx = ExecutionContext::with_timeout(Duration::from_secs(1));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                "done"
            })
            .await;
        assert_eq!(result, Ok("done"));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn reports_deadline_exceeded() {
        let ctx = ExecutionContext::with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
        assert_eq!(ctx.check(), Err(Interrupted::DeadlineExceeded));
    }

    #[rstest]
    #[tokio::test]
    async fn cancelling_parent_cancels_child() {
        let parent = ExecutionContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.run(async {}).await, Err(Interrupted::Cancelled));
    }

    #[rstest]
    #[tokio::test]
    async fn cancelling_child_leaves_parent_running() {
        let parent = ExecutionContext::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
        assert_eq!(parent.check(), Ok(()));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn keeps_the_earlier_deadline() {
        let soon = Instant::now() + Duration::from_millis(10);
        let later = soon + Duration::from_secs(10);
        let ctx = ExecutionContext::new().with_deadline(soon).with_deadline(later);
        assert_eq!(ctx.deadline(), Some(soon));
    }
}
