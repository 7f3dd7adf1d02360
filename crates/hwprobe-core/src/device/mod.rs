//! One-shot device identity readers.
//!
//! Each reader fetches a single file through [`Prober::read_text`] (direct
//! first, then privileged) and parses it into a plain struct.
//!
//! [`Prober::read_text`]: crate::Prober::read_text

pub mod emmc;
pub mod iosched;
pub mod kernel;
pub mod memory;
pub mod processor;

pub use emmc::{EmmcImpact, EmmcInfo};
pub use iosched::IoScheduler;
pub use kernel::KernelInfo;
pub use memory::{MemoryInfo, MemoryUnit};
pub use processor::ProcessorInfo;
