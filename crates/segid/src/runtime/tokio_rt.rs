use core::{future::Future, time::Duration};

use crate::{Error, Result, Runtime, SleepProvider};

/// Runs the refill loop on the current [`tokio`](https://docs.rs/tokio)
/// runtime and uses its timer for backoff and timeouts.
///
/// Allocators must be constructed from within a Tokio runtime context.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRuntime;

impl SleepProvider for TokioRuntime {
    type Sleep = tokio::time::Sleep;

    fn sleep_for(dur: Duration) -> Self::Sleep {
        tokio::time::sleep(dur)
    }
}

impl Runtime for TokioRuntime {
    fn spawn<F>(fut: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|e| Error::RuntimeUnavailable {
                reason: e.to_string(),
            })?;
        // Detached: the loop stops itself on shutdown or when every
        // allocator handle is dropped.
        drop(handle.spawn(fut));
        Ok(())
    }
}
