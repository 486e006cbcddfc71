//! Per-call deadline and cancellation.
//!
//! [`OpContext::run`] races an operation against the caller's cancellation
//! token and deadline. When the operation loses, its future is dropped before
//! it commits, and dropping an open SeaORM transaction rolls it back, so nothing
//! it wrote becomes visible.

use crate::errors::{Error, Result};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Caller-supplied bounds for one operation.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl OpContext {
    /// No deadline, never cancelled unless [`OpContext::cancellation_token`] is triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Ties this context to an existing token (e.g. a request's token).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Tightens the deadline to `now + timeout` if that is sooner than the current one.
    #[must_use]
    pub fn bounded_by(self, timeout: Duration) -> Self {
        let fallback = Instant::now() + timeout;
        match self.deadline {
            Some(deadline) if deadline <= fallback => self,
            _ => self.with_deadline(fallback),
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drives `fut` to completion unless cancellation or the deadline comes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Error::DeadlineExceeded);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = deadline => Err(Error::DeadlineExceeded),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let ctx = OpContext::new();
        let value = ctx.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = ctx
            .run(async { Err::<(), _>(Error::EmptyOrder) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyOrder));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_polls() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::new().with_cancellation(token);
        let polled = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&polled);
        let result = ctx
            .run(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_operation() {
        let ctx = OpContext::new().with_timeout(Duration::from_millis(10));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_cancel_during_operation() {
        let ctx = OpContext::new();
        let token = ctx.cancellation_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_bounded_by_keeps_earlier_deadline() {
        let early = Instant::now() + Duration::from_millis(5);
        let ctx = OpContext::new()
            .with_deadline(early)
            .bounded_by(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(early));

        let ctx = OpContext::new().bounded_by(Duration::from_secs(60));
        assert!(ctx.deadline().is_some());
    }
}
