#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocator;
mod error;
mod refill;
mod runtime;
mod segment;
mod sink;
mod store;

pub use crate::allocator::*;
pub use crate::error::*;
pub use crate::runtime::*;
pub use crate::segment::*;
pub use crate::sink::*;
pub use crate::store::*;
