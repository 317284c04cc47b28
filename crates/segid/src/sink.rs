use crate::store::StoreError;

/// Receives transient counter store failures from the refill loop.
///
/// [`ErrorSink::report`] is invoked exactly once per failed reload attempt,
/// before the loop backs off and retries. Implementations must not block;
/// the refill loop stops producing while `report` runs.
///
/// Any `Fn(&str, &StoreError) + Send + Sync` closure is a sink.
pub trait ErrorSink: Send + Sync + 'static {
    fn report(&self, business: &str, error: &StoreError);
}

impl<F> ErrorSink for F
where
    F: Fn(&str, &StoreError) + Send + Sync + 'static,
{
    fn report(&self, business: &str, error: &StoreError) {
        self(business, error);
    }
}

/// The sink used when none is supplied.
///
/// Emits a `tracing` warning when the `tracing` feature is enabled and
/// writes to standard error otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticSink;

impl ErrorSink for DiagnosticSink {
    fn report(&self, business: &str, error: &StoreError) {
        #[cfg(feature = "tracing")]
        tracing::warn!(business, %error, "segment reload failed, retrying");
        #[cfg(not(feature = "tracing"))]
        eprintln!("segid: segment reload for `{business}` failed, retrying: {error}");
    }
}
