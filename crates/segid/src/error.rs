//! Error types surfaced by the allocator.
//!
//! Only two kinds of failure ever reach a caller of [`Allocator::get`]:
//! [`Error::Timeout`] when the buffer stayed empty for the whole wait window,
//! and [`Error::Shutdown`] once the refill loop has stopped and the buffer is
//! drained. Counter store failures are never surfaced to callers; they are
//! retried inside the refill loop and reported to the configured
//! [`ErrorSink`].
//!
//! [`Allocator::get`]: crate::Allocator::get
//! [`ErrorSink`]: crate::ErrorSink

use crate::store::StoreError;

/// A result type defaulting to the crate's [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `segid` can produce.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No identifier became available within the configured wait window.
    ///
    /// Nothing is consumed and no reload is triggered. Callers may retry at
    /// their own discretion.
    #[error("timed out waiting for an id")]
    Timeout,

    /// The refill loop has stopped and every buffered identifier has been
    /// handed out.
    #[error("allocator has been shut down")]
    Shutdown,

    /// The allocator configuration was rejected at construction time.
    #[error("invalid allocator configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The async runtime could not spawn the refill loop.
    #[error("async runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    /// A counter store operation failed when invoked directly.
    #[error(transparent)]
    Store(#[from] StoreError),
}
