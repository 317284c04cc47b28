use core::{future::Future, time::Duration};

use crate::Result;

/// A trait that abstracts over how to sleep for a given [`Duration`] in async
/// contexts.
///
/// This allows the allocator to be generic over runtimes like `Tokio` or
/// `Smol`.
pub trait SleepProvider {
    /// We require `Send` so that the refill loop can be moved across threads.
    type Sleep: Future<Output = ()> + Send;

    fn sleep_for(dur: Duration) -> Self::Sleep;
}

/// An async runtime able to host the refill loop.
pub trait Runtime: SleepProvider + 'static {
    /// Spawns `fut` as a detached background task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] if no runtime is available to run
    /// the task.
    ///
    /// [`Error::RuntimeUnavailable`]: crate::Error::RuntimeUnavailable
    fn spawn<F>(fut: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static;
}
