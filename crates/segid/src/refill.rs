//! The background task that keeps the buffer topped up.
//!
//! One [`RefillLoop`] runs per allocator. It owns the current [`Segment`],
//! pushes its identifiers into the bounded buffer one at a time and reserves a
//! new segment from the [`CounterStore`] whenever the current one runs out.
//!
//! A full buffer suspends the push until a caller consumes an identifier, which
//! bounds memory use to the buffer capacity. Reload failures are reported to
//! the [`ErrorSink`] and retried after a fixed backoff, indefinitely; they never
//! reach a caller of `get`.
//!
//! The loop stops when the allocator is shut down or when every allocator
//! handle (and with it every receiver) has been dropped. A store transaction
//! that is already in flight is always allowed to finish.

use core::{marker::PhantomData, time::Duration};
use std::sync::Arc;

use crate::{
    allocator::Shared,
    runtime::{Runtime, until_cancelled},
    segment::Segment,
    sink::ErrorSink,
    store::{CounterStore, StoreError},
};

pub(crate) struct RefillLoop<S, R> {
    store: Arc<S>,
    shared: Arc<Shared>,
    segment: Segment,
    tx: flume::Sender<i64>,
    sink: Arc<dyn ErrorSink>,
    backoff: Duration,
    _runtime: PhantomData<fn() -> R>,
}

impl<S, R> RefillLoop<S, R>
where
    S: CounterStore,
    R: Runtime,
{
    pub(crate) fn new(
        store: Arc<S>,
        shared: Arc<Shared>,
        tx: flume::Sender<i64>,
        sink: Arc<dyn ErrorSink>,
        backoff: Duration,
    ) -> Self {
        Self {
            store,
            shared,
            segment: Segment::default(),
            tx,
            sink,
            backoff,
            _runtime: PhantomData,
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(name = "refill", skip_all, fields(business = %self.shared.business)))]
    pub(crate) async fn run(mut self) {
        #[cfg(feature = "tracing")]
        tracing::trace!("refill loop started");

        // Nothing is produced before the first segment arrives.
        if self.reload().await {
            loop {
                let Some(id) = self.segment.next_id() else {
                    if self.reload().await {
                        continue;
                    }
                    break;
                };

                // Blocks while the buffer is full.
                match until_cancelled(&self.shared.token, self.tx.send_async(id)).await {
                    Some(Ok(())) => {}
                    // Every receiver is gone or the allocator was shut down.
                    Some(Err(_)) | None => break,
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("refill loop stopped");
    }

    /// Replaces the exhausted segment with a fresh reservation.
    ///
    /// Retries until the store succeeds. Returns `false` only if the loop
    /// should stop instead.
    async fn reload(&mut self) -> bool {
        loop {
            if self.shared.token.is_cancelled() || self.tx.is_disconnected() {
                return false;
            }

            let result = self.store.reserve(&self.shared.business).await;
            let err = match result {
                Ok(reservation) if !reservation.is_empty() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        min = reservation.min,
                        max = reservation.max,
                        "reserved segment"
                    );
                    self.segment = Segment::from(&reservation);
                    self.shared.counters.record_reload();
                    return true;
                }
                Ok(reservation) => StoreError::InvalidStep {
                    business: reservation.business.clone(),
                    step: reservation.len(),
                },
                Err(err) => err,
            };

            self.shared.counters.record_failure();
            self.sink.report(&self.shared.business, &err);

            if until_cancelled(&self.shared.token, R::sleep_for(self.backoff))
                .await
                .is_none()
            {
                return false;
            }
        }
    }
}
