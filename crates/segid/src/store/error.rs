/// Boxed error returned by concrete store backends.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Failures of a single reserve-and-advance attempt.
///
/// Every variant is treated as transient by the refill loop: it is reported
/// to the [`ErrorSink`] and the reservation is retried after the backoff.
///
/// [`ErrorSink`]: crate::ErrorSink
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No counter row exists for the business key.
    #[error("no counter registered for business `{business}`")]
    NotFound { business: String },

    /// The stored step would yield an empty or inverted segment.
    #[error("counter for business `{business}` has non-positive step {step}")]
    InvalidStep { business: String, step: i64 },

    /// Advancing the high-water mark would overflow a 64-bit integer.
    #[error("counter for business `{business}` overflows at {max_value} + {step}")]
    Overflow {
        business: String,
        max_value: i64,
        step: i64,
    },

    /// The transaction lost a race with another writer.
    #[error("transaction conflict: {context}")]
    Conflict { context: String },

    /// The store could not be reached.
    #[error("counter store unavailable: {context}")]
    Unavailable { context: String },

    /// Any other backend failure.
    #[error("counter store backend error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    /// Wraps an arbitrary backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Backend(err.into())
    }
}
