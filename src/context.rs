use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a guarded step stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("request context cancelled")]
    Cancelled,
    #[error("request context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation and deadline scope for one resolution.
///
/// Every blocking step of a resolution runs through [`RequestContext::guard`],
/// so cancelling the token or passing the deadline drops the in-flight future
/// and the step fails with [`Interrupted`].
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the reason the context is no longer usable, if any.
    pub fn interrupted(&self) -> Option<Interrupted> {
        if self.token.is_cancelled() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Runs `step` until it completes or the context is interrupted.
    pub async fn guard<T, E, F>(&self, step: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<Interrupted>,
    {
        if let Some(reason) = self.interrupted() {
            return Err(reason.into());
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled.into()),
            _ = expired => Err(Interrupted::DeadlineExceeded.into()),
            result = step => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum StepError {
        Interrupted(Interrupted),
    }

    impl From<Interrupted> for StepError {
        fn from(value: Interrupted) -> Self {
            StepError::Interrupted(value)
        }
    }

    #[tokio::test]
    async fn test_guard_passes_through_result() {
        let ctx = RequestContext::new();
        let actual: Result<u8, StepError> = ctx.guard(async { Ok(7) }).await;
        assert_eq!(actual, Ok(7));
    }

    #[tokio::test]
    async fn test_guard_fails_fast_when_already_cancelled() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let actual: Result<u8, StepError> = ctx.guard(async { Ok(7) }).await;
        assert_eq!(actual, Err(StepError::Interrupted(Interrupted::Cancelled)));
    }

    #[tokio::test]
    async fn test_guard_aborts_in_flight_step_on_cancel() {
        let ctx = RequestContext::new();
        let canceller = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let actual: Result<u8, StepError> = ctx
            .guard(async {
                std::future::pending::<()>().await;
                Ok(1)
            })
            .await;
        assert_eq!(actual, Err(StepError::Interrupted(Interrupted::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_enforces_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
        let actual: Result<u8, StepError> = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            })
            .await;
        assert_eq!(
            actual,
            Err(StepError::Interrupted(Interrupted::DeadlineExceeded))
        );
    }
}
