//! hwprobe core library
//!
//! Collects CPU, GPU, memory, kernel and storage facts from `/proc` and
//! `/sys`. Reads are attempted directly first; fields that fail are retried
//! through a root shell when one is available.

pub mod acquire;
pub mod cpu;
pub mod device;
pub mod error;
pub mod field;
pub mod fieldset;
pub mod gpu;
pub mod monitor;
pub mod paths;
pub mod privileged;
pub mod publish;
pub mod reader;
pub mod shell;
pub mod subsystem;
pub mod testing;

pub use acquire::{AcquisitionState, ProbeOptions, Prober, Snapshot};
pub use cpu::CpuInformation;
pub use error::{Error, Result};
pub use field::{Field, INITIALIZATION_STARTED, INVALID, NOT_INITIALIZED};
pub use fieldset::{Attribute, FieldSet, Value};
pub use gpu::GpuInformation;
pub use monitor::{CoreMonitor, CpuCore, MonitorHandle};
pub use privileged::PrivilegedReader;
pub use publish::{Delivery, ResultPublisher};
pub use reader::{FileReader, SysfsReader};
pub use shell::{CommandExecutor, RootShell, ShellConfig};
pub use subsystem::Subsystem;
