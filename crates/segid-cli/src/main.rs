#![doc = include_str!("../README.md")]

mod config;
mod drive;
mod telemetry;

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use config::{AppConfig, CliArgs};
use segid::{MemoryCounterStore, TokioAllocator};
use telemetry::init_telemetry;
use tokio::signal;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry()?;

    let business = config.allocator.business.clone();
    let store = Arc::new(MemoryCounterStore::new().with_counter(
        business.as_str(),
        config.initial_max_value,
        config.step,
    ));
    store.fail_next(config.inject_failures);

    if cfg!(debug_assertions) {
        tracing::info!("Starting allocator with full config: {config:#?}");
    } else {
        tracing::info!(
            business = %business,
            capacity = config.allocator.capacity,
            step = config.step,
            "Starting allocator"
        );
    }

    let allocator = TokioAllocator::with_config(Arc::clone(&store), config.allocator.clone())?;
    let started = Instant::now();

    let result = tokio::select! {
        res = drive::drive(&allocator, config.count, config.concurrency, config.max_timeouts) => res,
        () = shutdown_signal() => {
            allocator.shutdown();
            anyhow::bail!("interrupted");
        }
    };
    allocator.shutdown();
    let (ids, timeouts) = result?;

    if config.print {
        for id in &ids {
            println!("{id}");
        }
    }

    let high_water_mark = store.get(&business).await.map(|row| row.max_value);
    let summary = drive::summarize(
        &allocator,
        config.count,
        &ids,
        timeouts,
        started,
        high_water_mark,
    );

    if config.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{}: delivered {}/{} ids ({:?}..={:?}) in {:.2}ms, {} reloads, {} failed reloads, {} timeouts, high-water mark {:?}",
            summary.business,
            summary.delivered,
            summary.requested,
            summary.first,
            summary.last,
            summary.elapsed_ms,
            summary.stats.reloads,
            summary.stats.failed_reloads,
            summary.timeouts,
            summary.high_water_mark,
        );
    }

    if !summary.unique {
        anyhow::bail!("duplicate ids delivered");
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
