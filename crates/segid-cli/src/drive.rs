//! Fans a fetch request out over concurrent callers sharing one allocator.

use std::time::Instant;

use anyhow::{Context, bail};
use futures::future::try_join_all;
use segid::{AllocatorStats, Error, TokioAllocator};
use serde::Serialize;

/// What a run handed out.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub business: String,
    pub requested: usize,
    pub delivered: usize,
    pub timeouts: usize,
    pub first: Option<i64>,
    pub last: Option<i64>,
    pub unique: bool,
    pub elapsed_ms: f64,
    pub high_water_mark: Option<i64>,
    pub stats: AllocatorStats,
}

/// Splits `total` fetches across `callers`, spreading the remainder over the
/// first callers.
pub fn split_work(total: usize, callers: usize) -> Vec<usize> {
    let base = total / callers;
    let extra = total % callers;
    (0..callers)
        .map(|i| base + usize::from(i < extra))
        .collect()
}

/// Fetches `count` ids across `concurrency` tasks.
///
/// Each caller retries timed-out fetches up to `max_timeouts` times in a row.
/// Returns the ids in ascending order and the total number of timeouts.
pub async fn drive(
    allocator: &TokioAllocator,
    count: usize,
    concurrency: usize,
    max_timeouts: usize,
) -> anyhow::Result<(Vec<i64>, usize)> {
    let handles = split_work(count, concurrency)
        .into_iter()
        .enumerate()
        .map(|(caller, quota)| {
            let allocator = allocator.clone();
            tokio::spawn(async move { fetch(caller, &allocator, quota, max_timeouts).await })
        });

    let mut ids = Vec::with_capacity(count);
    let mut timeouts = 0;
    for joined in try_join_all(handles).await.context("caller task panicked")? {
        let (mut fetched, caller_timeouts) = joined?;
        ids.append(&mut fetched);
        timeouts += caller_timeouts;
    }
    ids.sort_unstable();
    Ok((ids, timeouts))
}

#[tracing::instrument(skip(allocator))]
async fn fetch(
    caller: usize,
    allocator: &TokioAllocator,
    quota: usize,
    max_timeouts: usize,
) -> anyhow::Result<(Vec<i64>, usize)> {
    let mut ids = Vec::with_capacity(quota);
    let mut timeouts = 0;
    let mut consecutive = 0;

    while ids.len() < quota {
        match allocator.get().await {
            Ok(id) => {
                ids.push(id);
                consecutive = 0;
            }
            Err(Error::Timeout) => {
                timeouts += 1;
                consecutive += 1;
                tracing::warn!(caller, consecutive, "timed out waiting for an id");
                if consecutive >= max_timeouts {
                    bail!("caller {caller} gave up after {consecutive} consecutive timeouts");
                }
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok((ids, timeouts))
}

pub fn summarize(
    allocator: &TokioAllocator,
    requested: usize,
    ids: &[i64],
    timeouts: usize,
    started: Instant,
    high_water_mark: Option<i64>,
) -> Summary {
    Summary {
        business: allocator.business().to_owned(),
        requested,
        delivered: ids.len(),
        timeouts,
        first: ids.first().copied(),
        last: ids.last().copied(),
        unique: ids.windows(2).all(|w| w[0] < w[1]),
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        high_water_mark,
        stats: allocator.stats(),
    }
}
