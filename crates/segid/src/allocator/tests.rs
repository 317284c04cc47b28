use core::time::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;

use crate::{
    AllocatorConfig, CounterStore, Error, MemoryCounterStore, Reservation, StoreError,
    TokioAllocator,
};

const FAST_BACKOFF: Duration = Duration::from_millis(10);

/// Records every reservation granted by the wrapped store.
struct RecordingStore {
    inner: MemoryCounterStore,
    granted: Mutex<Vec<Reservation>>,
}

impl RecordingStore {
    fn new(inner: MemoryCounterStore) -> Self {
        Self {
            inner,
            granted: Mutex::new(Vec::new()),
        }
    }

    fn granted(&self) -> Vec<Reservation> {
        self.granted.lock().clone()
    }
}

impl CounterStore for RecordingStore {
    async fn reserve(&self, business: &str) -> Result<Reservation, StoreError> {
        let reservation = self.inner.reserve(business).await?;
        self.granted.lock().push(reservation.clone());
        Ok(reservation)
    }
}

/// Always grants the same empty range.
struct EmptyRangeStore;

impl CounterStore for EmptyRangeStore {
    async fn reserve(&self, business: &str) -> Result<Reservation, StoreError> {
        Ok(Reservation {
            business: business.to_owned(),
            min: 5,
            max: 5,
        })
    }
}

/// Grants a range whose bounds are swapped end to end.
struct InvertedRangeStore;

impl CounterStore for InvertedRangeStore {
    async fn reserve(&self, business: &str) -> Result<Reservation, StoreError> {
        Ok(Reservation {
            business: business.to_owned(),
            min: i64::MAX,
            max: i64::MIN,
        })
    }
}

#[derive(Clone, Default)]
struct CollectingSink {
    reports: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    fn count(&self) -> usize {
        self.reports.lock().len()
    }

    fn as_fn(&self) -> impl Fn(&str, &StoreError) + Send + Sync + 'static {
        let reports = Arc::clone(&self.reports);
        move |business: &str, error: &StoreError| {
            reports.lock().push(format!("{business}: {error}"));
        }
    }
}

fn fast_config(business: &str, capacity: usize) -> AllocatorConfig {
    AllocatorConfig::new(business, capacity).with_retry_backoff(FAST_BACKOFF)
}

#[tokio::test]
async fn first_segment_then_reload_on_exhaustion() {
    let store = Arc::new(RecordingStore::new(
        MemoryCounterStore::new().with_counter("b1", 0, 100),
    ));
    let allocator = TokioAllocator::new(Arc::clone(&store), "b1", 10).unwrap();

    for expected in 1..=100 {
        assert_eq!(allocator.get().await.unwrap(), expected);
    }
    assert_eq!(allocator.get().await.unwrap(), 101);

    let granted = store.granted();
    assert_eq!(granted[0].min, 0);
    assert_eq!(granted[0].max, 100);
    assert_eq!(granted[1].min, 100);
    assert_eq!(granted[1].max, 200);
    allocator.shutdown();
}

#[tokio::test]
async fn ids_are_consecutive_across_many_segments() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 7));
    let allocator = TokioAllocator::new(store, "b1", 3).unwrap();

    let mut previous = 0;
    for _ in 0..50 {
        let id = allocator.get().await.unwrap();
        assert_eq!(id, previous + 1);
        previous = id;
    }
}

#[tokio::test]
async fn exhausted_segment_is_reloaded_exactly_once() {
    let store = Arc::new(RecordingStore::new(
        MemoryCounterStore::new().with_counter("b1", 0, 10),
    ));
    let allocator = TokioAllocator::new(Arc::clone(&store), "b1", 1).unwrap();

    for expected in 1..=35 {
        assert_eq!(allocator.get().await.unwrap(), expected);
    }
    // Let the loop run until it blocks on the full buffer.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 36 is buffered and 37 is waiting to be pushed, both from the fourth
    // segment.
    let granted = store.granted();
    assert_eq!(granted.len(), 4);
    for pair in granted.windows(2) {
        assert_eq!(pair[0].max, pair[1].min);
    }
    assert_eq!(allocator.stats().reloads, 4);
    assert_eq!(allocator.get().await.unwrap(), 36);
}

#[tokio::test]
async fn transient_failures_are_reported_then_recovered() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 100));
    store.fail_next(3);
    let sink = CollectingSink::default();

    let allocator = TokioAllocator::with_sink(store, fast_config("b1", 4), sink.as_fn()).unwrap();

    assert_eq!(allocator.get().await.unwrap(), 1);
    assert_eq!(sink.count(), 3);
    let stats = allocator.stats();
    assert_eq!(stats.failed_reloads, 3);
    assert_eq!(stats.reloads, 1);
    assert!(sink.reports.lock()[0].starts_with("b1: counter store unavailable"));
}

#[tokio::test]
async fn get_times_out_while_store_is_down() {
    let store = Arc::new(MemoryCounterStore::new());
    let sink = CollectingSink::default();
    let config = fast_config("b1", 4).with_get_timeout(Duration::from_millis(50));
    let allocator = TokioAllocator::with_sink(Arc::clone(&store), config, sink.as_fn()).unwrap();

    let start = Instant::now();
    assert!(matches!(allocator.get().await, Err(Error::Timeout)));
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert!(sink.count() >= 1);
    assert!(allocator.is_running());

    // Once the counter exists the loop recovers and nothing was consumed by
    // the timed-out call.
    store.register("b1", 0, 10);
    let id = loop {
        match allocator.get().await {
            Ok(id) => break id,
            Err(Error::Timeout) => continue,
            Err(err) => panic!("unexpected error: {err}"),
        }
    };
    assert_eq!(id, 1);
}

#[tokio::test]
async fn value_arriving_before_deadline_is_delivered() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 10));
    store.fail_next(1);
    let config = AllocatorConfig::new("b1", 4)
        .with_retry_backoff(Duration::from_millis(100))
        .with_get_timeout(Duration::from_millis(500));
    let allocator =
        TokioAllocator::with_sink(store, config, CollectingSink::default().as_fn()).unwrap();

    // The first identifier is only produced after the 100ms backoff.
    assert_eq!(allocator.get().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_reservations_are_treated_as_failures() {
    let sink = CollectingSink::default();
    let config = fast_config("b1", 4).with_get_timeout(Duration::from_millis(60));
    let allocator =
        TokioAllocator::with_sink(Arc::new(EmptyRangeStore), config, sink.as_fn()).unwrap();

    assert!(matches!(allocator.get().await, Err(Error::Timeout)));
    assert!(sink.count() >= 2);
    assert!(sink.reports.lock()[0].contains("non-positive step 0"));
    assert_eq!(allocator.stats().reloads, 0);
    allocator.shutdown();
}

#[tokio::test]
async fn inverted_reservations_keep_the_loop_alive() {
    let sink = CollectingSink::default();
    let config = fast_config("b1", 4).with_get_timeout(Duration::from_millis(100));
    let allocator =
        TokioAllocator::with_sink(Arc::new(InvertedRangeStore), config, sink.as_fn()).unwrap();

    assert!(matches!(allocator.get().await, Err(Error::Timeout)));
    assert!(allocator.is_running());
    assert!(sink.count() >= 2);
    assert!(sink.reports.lock()[0].contains("non-positive step"));
    assert_eq!(allocator.stats().reloads, 0);
    allocator.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_callers_receive_distinct_ids() {
    const CALLERS: i64 = 200;
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 50));
    let allocator = TokioAllocator::new(store, "b1", 16).unwrap();

    let handles = (0..CALLERS).map(|_| {
        let allocator = allocator.clone();
        tokio::spawn(async move { allocator.get().await })
    });

    let mut ids: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=CALLERS).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn allocators_sharing_a_counter_never_collide() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 13));
    let first = TokioAllocator::new(Arc::clone(&store), "b1", 8).unwrap();
    let second = TokioAllocator::new(Arc::clone(&store), "b1", 8).unwrap();

    let mut seen = HashSet::new();
    for _ in 0..100 {
        assert!(seen.insert(first.get().await.unwrap()));
        assert!(seen.insert(second.get().await.unwrap()));
    }
    assert_eq!(seen.len(), 200);
}

#[tokio::test]
async fn shutdown_drains_buffer_then_reports_shutdown() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 100));
    let allocator = TokioAllocator::new(store, "b1", 4).unwrap();
    assert_eq!(allocator.get().await.unwrap(), 1);

    allocator.shutdown();
    assert!(!allocator.is_running());

    let mut previous = 1;
    loop {
        match allocator.get().await {
            Ok(id) => {
                assert!(id > previous);
                assert!(id <= 1 + 4 + 1, "loop kept producing after shutdown");
                previous = id;
            }
            Err(Error::Shutdown) => break,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}

#[tokio::test]
async fn dropping_every_handle_stops_the_loop() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 100));
    let allocator = TokioAllocator::new(Arc::clone(&store), "b1", 2).unwrap();
    let clone = allocator.clone();
    assert_eq!(clone.get().await.unwrap(), 1);

    drop(allocator);
    drop(clone);

    // The loop releases its store handle once it notices.
    let deadline = Instant::now() + Duration::from_secs(1);
    while Arc::strong_count(&store) > 1 {
        assert!(Instant::now() < deadline, "refill loop still alive");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn stats_track_buffer_and_reloads() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 1000));
    let allocator = TokioAllocator::new(store, "b1", 8).unwrap();
    assert_eq!(allocator.business(), "b1");
    assert_eq!(allocator.capacity(), 8);

    allocator.get().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stats = allocator.stats();
    assert_eq!(stats.reloads, 1);
    assert_eq!(stats.failed_reloads, 0);
    assert_eq!(stats.buffered, 8);
}

#[tokio::test]
async fn rejects_invalid_construction() {
    let store = Arc::new(MemoryCounterStore::new());
    assert!(matches!(
        TokioAllocator::new(Arc::clone(&store), "b1", 0),
        Err(Error::InvalidConfig { .. })
    ));
    assert!(matches!(
        TokioAllocator::new(store, "", 8),
        Err(Error::InvalidConfig { .. })
    ));
}

#[test]
fn construction_outside_runtime_fails() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 10));
    assert!(matches!(
        TokioAllocator::new(store, "b1", 8),
        Err(Error::RuntimeUnavailable { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_callers_are_served() {
    let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 10));
    let allocator = TokioAllocator::new(store, "b1", 4).unwrap();

    let ids = tokio::task::spawn_blocking(move || {
        (0..25)
            .map(|_| allocator.get_blocking())
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(ids, (1..=25).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_callers_see_timeout_then_shutdown() {
    let store = Arc::new(MemoryCounterStore::new());
    let config = fast_config("b1", 4).with_get_timeout(Duration::from_millis(50));
    let allocator =
        TokioAllocator::with_sink(Arc::clone(&store), config, CollectingSink::default().as_fn())
            .unwrap();

    let blocking = allocator.clone();
    let timed_out = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let result = blocking.get_blocking();
        (result, start.elapsed())
    })
    .await
    .unwrap();
    assert!(matches!(timed_out.0, Err(Error::Timeout)));
    assert!(timed_out.1 >= Duration::from_millis(50));

    store.register("b1", 0, 100);
    allocator.shutdown();

    let (ids, err) = tokio::task::spawn_blocking(move || {
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut ids = Vec::new();
        loop {
            match allocator.get_blocking() {
                Ok(id) => ids.push(id),
                // The loop may still be winding down.
                Err(Error::Timeout) if Instant::now() < deadline => {}
                Err(err) => break (ids, err),
            }
        }
    })
    .await
    .unwrap();
    assert!(ids.len() <= 5, "loop kept producing after shutdown");
    assert!(matches!(err, Error::Shutdown), "unexpected error: {err}");
}

#[cfg(feature = "async-smol")]
#[test]
fn runs_on_smol() {
    use crate::SmolAllocator;

    smol::block_on(async {
        let store = Arc::new(MemoryCounterStore::new().with_counter("b1", 0, 5));
        let allocator = SmolAllocator::new(store, "b1", 2).unwrap();
        for expected in 1..=12 {
            assert_eq!(allocator.get().await.unwrap(), expected);
        }
        allocator.shutdown();
    });
}
