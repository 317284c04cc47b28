use core::{future::Future, pin::pin, time::Duration};

use futures::future::{Either, select};
use tokio_util::sync::CancellationToken;

use crate::SleepProvider;

/// Resolves to `Some(output)` if `fut` completes within `dur`, `None`
/// otherwise. `fut` is dropped on timeout.
pub(crate) async fn timeout<S, F>(dur: Duration, fut: F) -> Option<F::Output>
where
    S: SleepProvider,
    F: Future,
{
    match select(pin!(fut), pin!(S::sleep_for(dur))).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(((), _)) => None,
    }
}

/// Resolves to `Some(output)` unless `token` is cancelled first.
pub(crate) async fn until_cancelled<F>(token: &CancellationToken, fut: F) -> Option<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return None;
    }
    match select(pin!(token.cancelled()), pin!(fut)).await {
        Either::Left(((), _)) => None,
        Either::Right((output, _)) => Some(output),
    }
}

#[cfg(all(test, feature = "async-tokio"))]
mod tests {
    use super::*;
    use crate::TokioRuntime;

    #[tokio::test]
    async fn timeout_returns_output_when_ready() {
        let out = timeout::<TokioRuntime, _>(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(out, Some(7));
    }

    #[tokio::test]
    async fn timeout_expires() {
        let out = timeout::<TokioRuntime, _>(
            Duration::from_millis(10),
            futures::future::pending::<()>(),
        )
        .await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(until_cancelled(&token, async { 1 }).await, None);
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_future() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });
        let out = until_cancelled(&token, futures::future::pending::<()>()).await;
        assert_eq!(out, None);
    }
}
