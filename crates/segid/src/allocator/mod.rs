mod config;
mod handle;
mod stats;
#[cfg(all(test, feature = "async-tokio"))]
mod tests;

pub use config::*;
pub use handle::*;
pub(crate) use handle::Shared;
pub use stats::*;
