mod interface;
#[cfg(feature = "async-smol")]
mod smol_rt;
#[cfg(feature = "async-tokio")]
mod tokio_rt;
mod util;

pub use interface::*;
#[cfg_attr(docsrs, doc(cfg(feature = "async-smol")))]
#[cfg(feature = "async-smol")]
pub use smol_rt::*;
#[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
#[cfg(feature = "async-tokio")]
pub use tokio_rt::*;
pub(crate) use util::*;
