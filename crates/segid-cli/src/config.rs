use core::time::Duration;

use anyhow::bail;
use clap::Parser;
use segid::AllocatorConfig;

/// Runtime configuration for the `segid` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first), with defaults that mirror the library's.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "segid",
    version,
    about = "Drain segment-buffered IDs from an in-process counter store"
)]
pub struct CliArgs {
    /// Business key naming the identifier series.
    ///
    /// Environment variable: `SEGID_BUSINESS`
    #[arg(long, env = "SEGID_BUSINESS", default_value_t = String::from("default"))]
    pub business: String,

    /// Number of IDs buffered ahead of demand.
    ///
    /// Larger buffers absorb bursts at the cost of IDs lost on shutdown.
    ///
    /// Environment variable: `SEGID_BUFFER_CAPACITY`
    #[arg(long, env = "SEGID_BUFFER_CAPACITY", default_value_t = 1024)]
    pub capacity: usize,

    /// High-water mark the in-process counter starts from.
    ///
    /// Environment variable: `SEGID_INITIAL_MAX_VALUE`
    #[arg(long, env = "SEGID_INITIAL_MAX_VALUE", default_value_t = 0)]
    pub initial_max_value: i64,

    /// Number of IDs reserved per segment.
    ///
    /// Environment variable: `SEGID_STEP`
    #[arg(long, env = "SEGID_STEP", default_value_t = 1000)]
    pub step: i64,

    /// Total number of IDs to fetch.
    ///
    /// Environment variable: `SEGID_COUNT`
    #[arg(long, env = "SEGID_COUNT", default_value_t = 100)]
    pub count: usize,

    /// Number of concurrent callers sharing the allocator.
    ///
    /// Environment variable: `SEGID_CONCURRENCY`
    #[arg(long, env = "SEGID_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// How long a single fetch waits before timing out, in milliseconds.
    ///
    /// Environment variable: `SEGID_GET_TIMEOUT_MS`
    #[arg(long, env = "SEGID_GET_TIMEOUT_MS", default_value_t = 1000)]
    pub get_timeout_ms: u64,

    /// Pause between failed segment reloads, in milliseconds.
    ///
    /// Environment variable: `SEGID_RETRY_BACKOFF_MS`
    #[arg(long, env = "SEGID_RETRY_BACKOFF_MS", default_value_t = 1000)]
    pub retry_backoff_ms: u64,

    /// Consecutive timeouts a caller tolerates before giving up.
    ///
    /// Environment variable: `SEGID_MAX_TIMEOUTS`
    #[arg(long, env = "SEGID_MAX_TIMEOUTS", default_value_t = 5)]
    pub max_timeouts: usize,

    /// Make the first N segment reloads fail to exercise the retry path.
    ///
    /// Environment variable: `SEGID_INJECT_FAILURES`
    #[arg(long, env = "SEGID_INJECT_FAILURES", default_value_t = 0)]
    pub inject_failures: u64,

    /// Print every fetched ID, one per line.
    #[arg(short, long, default_value_t = false)]
    pub print: bool,

    /// Print the summary as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub allocator: AllocatorConfig,
    pub initial_max_value: i64,
    pub step: i64,
    pub count: usize,
    pub concurrency: usize,
    pub max_timeouts: usize,
    pub inject_failures: u64,
    pub print: bool,
    pub json: bool,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.step <= 0 {
            bail!("SEGID_STEP must be greater than 0");
        }

        if args.concurrency == 0 {
            bail!("SEGID_CONCURRENCY must be greater than 0");
        }

        if args.max_timeouts == 0 {
            bail!("SEGID_MAX_TIMEOUTS must be greater than 0");
        }

        let allocator = AllocatorConfig::new(args.business, args.capacity)
            .with_get_timeout(Duration::from_millis(args.get_timeout_ms))
            .with_retry_backoff(Duration::from_millis(args.retry_backoff_ms));
        allocator.validate()?;

        Ok(Self {
            allocator,
            initial_max_value: args.initial_max_value,
            step: args.step,
            count: args.count,
            concurrency: args.concurrency,
            max_timeouts: args.max_timeouts,
            inject_failures: args.inject_failures,
            print: args.print,
            json: args.json,
        })
    }
}
