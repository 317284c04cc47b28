use core::{marker::PhantomData, time::Duration};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    Error, Result,
    allocator::{AllocatorConfig, AllocatorStats, stats::Counters},
    refill::RefillLoop,
    runtime::{Runtime, timeout},
    sink::{DiagnosticSink, ErrorSink},
    store::CounterStore,
};

/// State shared between every handle of one allocator and its refill loop.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) business: Arc<str>,
    pub(crate) get_timeout: Duration,
    pub(crate) token: CancellationToken,
    pub(crate) counters: Counters,
}

/// Hands out unique, increasing identifiers for one business key.
///
/// Construction spawns a background refill loop on runtime `R` which reserves
/// segments from the [`CounterStore`] and keeps a bounded buffer filled. Each
/// [`Allocator::get`] removes exactly one identifier from that buffer, so no
/// identifier is ever delivered twice, across clones or concurrent callers.
///
/// Identifiers enter the buffer in strictly increasing order and leave it in
/// FIFO order. Uniqueness across processes comes from the store: every
/// reservation grants a range no other allocator will see.
///
/// Clones share the same buffer and refill loop. The loop runs until
/// [`Allocator::shutdown`] is called or every handle has been dropped.
/// Identifiers still buffered at that point are lost; the counter store never
/// reclaims them.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use std::sync::Arc;
/// use segid::{MemoryCounterStore, TokioAllocator};
///
/// let store = Arc::new(MemoryCounterStore::new().with_counter("orders", 0, 100));
/// let allocator = TokioAllocator::new(store, "orders", 16).unwrap();
///
/// assert_eq!(allocator.get().await.unwrap(), 1);
/// assert_eq!(allocator.get().await.unwrap(), 2);
/// allocator.shutdown();
/// # }
/// ```
pub struct Allocator<R> {
    shared: Arc<Shared>,
    rx: flume::Receiver<i64>,
    _runtime: PhantomData<fn() -> R>,
}

/// An [`Allocator`] whose refill loop runs on Tokio.
#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
#[cfg(feature = "async-tokio")]
pub type TokioAllocator = Allocator<crate::TokioRuntime>;

/// An [`Allocator`] whose refill loop runs on smol.
#[cfg_attr(docsrs, doc(cfg(feature = "async-smol")))]
#[cfg(feature = "async-smol")]
pub type SmolAllocator = Allocator<crate::SmolRuntime>;

impl<R> Allocator<R>
where
    R: Runtime,
{
    /// Creates an allocator with default timings and the [`DiagnosticSink`],
    /// and starts its refill loop.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `business` is empty or `capacity` is 0.
    /// - [`Error::RuntimeUnavailable`] if the refill loop cannot be spawned.
    pub fn new<S>(store: Arc<S>, business: impl Into<String>, capacity: usize) -> Result<Self>
    where
        S: CounterStore,
    {
        Self::with_config(store, AllocatorConfig::new(business, capacity))
    }

    /// Creates an allocator from an explicit configuration, reporting reload
    /// failures to the [`DiagnosticSink`].
    ///
    /// # Errors
    ///
    /// See [`Allocator::with_sink`].
    pub fn with_config<S>(store: Arc<S>, config: AllocatorConfig) -> Result<Self>
    where
        S: CounterStore,
    {
        Self::with_sink(store, config, DiagnosticSink)
    }

    /// Creates an allocator that reports every failed reload attempt to
    /// `sink`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if [`AllocatorConfig::validate`] fails.
    /// - [`Error::RuntimeUnavailable`] if the refill loop cannot be spawned.
    pub fn with_sink<S, K>(store: Arc<S>, config: AllocatorConfig, sink: K) -> Result<Self>
    where
        S: CounterStore,
        K: ErrorSink,
    {
        config.validate()?;

        let (tx, rx) = flume::bounded(config.capacity);
        let shared = Arc::new(Shared {
            business: Arc::from(config.business),
            get_timeout: config.get_timeout,
            token: CancellationToken::new(),
            counters: Counters::default(),
        });

        let refill = RefillLoop::<S, R>::new(
            store,
            Arc::clone(&shared),
            tx,
            Arc::new(sink),
            config.retry_backoff,
        );
        R::spawn(refill.run())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            business = %shared.business,
            capacity = config.capacity,
            "allocator started"
        );

        Ok(Self {
            shared,
            rx,
            _runtime: PhantomData,
        })
    }

    /// Waits for the next identifier.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the buffer stayed empty for the whole
    ///   configured timeout. Nothing is consumed.
    /// - [`Error::Shutdown`] if the refill loop has stopped and the buffer is
    ///   drained.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all, fields(business = %self.shared.business)))]
    pub async fn get(&self) -> Result<i64> {
        match timeout::<R, _>(self.shared.get_timeout, self.rx.recv_async()).await {
            Some(Ok(id)) => Ok(id),
            Some(Err(_)) => Err(Error::Shutdown),
            None => Err(Error::Timeout),
        }
    }
}

impl<R> Allocator<R> {
    /// Blocking counterpart of [`Allocator::get`] for synchronous callers.
    ///
    /// Must not be called from within an async task.
    ///
    /// # Errors
    ///
    /// Same as [`Allocator::get`].
    pub fn get_blocking(&self) -> Result<i64> {
        match self.rx.recv_timeout(self.shared.get_timeout) {
            Ok(id) => Ok(id),
            Err(flume::RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(flume::RecvTimeoutError::Disconnected) => Err(Error::Shutdown),
        }
    }

    /// Stops the refill loop.
    ///
    /// Identifiers already buffered can still be retrieved; after that `get`
    /// fails with [`Error::Shutdown`]. Affects every clone of this allocator.
    pub fn shutdown(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(business = %self.shared.business, "allocator shutting down");
        self.shared.token.cancel();
    }

    /// Returns `true` while the refill loop is producing identifiers.
    pub fn is_running(&self) -> bool {
        !self.shared.token.is_cancelled() && !self.rx.is_disconnected()
    }

    /// The business key this allocator reserves segments for.
    pub fn business(&self) -> &str {
        &self.shared.business
    }

    /// Buffer capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or_default()
    }

    /// Point-in-time snapshot of reload counters and buffer occupancy.
    pub fn stats(&self) -> AllocatorStats {
        self.shared.counters.snapshot(self.rx.len())
    }
}

impl<R> Clone for Allocator<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            rx: self.rx.clone(),
            _runtime: PhantomData,
        }
    }
}

impl<R> core::fmt::Debug for Allocator<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Allocator")
            .field("business", &self.shared.business)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}
