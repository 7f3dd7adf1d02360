//! Hardware subsystems that can be snapshotted.

use crate::{Error, Result};
use serde::Serialize;
use std::str::FromStr;

/// A hardware subsystem with its own field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    /// CPU frequencies, governor, temperature and core count.
    #[default]
    Cpu,
    /// GPU frequencies.
    Gpu,
}

impl Subsystem {
    /// All subsystems, in acquisition order.
    pub const ALL: [Subsystem; 2] = [Subsystem::Cpu, Subsystem::Gpu];

    /// Frequency unit the kernel reports for this subsystem, in Hz.
    ///
    /// cpufreq reports kHz, GPU devfreq/kgsl nodes report Hz.
    pub fn frequency_scale(&self) -> i64 {
        match self {
            Subsystem::Cpu => 1_000,
            Subsystem::Gpu => 1,
        }
    }

    /// Formats a raw frequency as whole MHz, e.g. `"1400 MHz"`.
    ///
    /// Empty, unparseable or negative input yields `None`.
    pub fn to_mhz(&self, raw: &str) -> Option<String> {
        let value = raw.trim().parse::<i64>().ok().filter(|v| *v >= 0)?;
        let hz = value.checked_mul(self.frequency_scale())?;
        Some(format!("{} MHz", hz / 1_000_000))
    }
}

impl FromStr for Subsystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Subsystem::Cpu),
            "gpu" => Ok(Subsystem::Gpu),
            _ => Err(Error::InvalidSubsystem(s.to_string())),
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subsystem::Cpu => write!(f, "cpu"),
            Subsystem::Gpu => write!(f, "gpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("cpu".parse::<Subsystem>().unwrap(), Subsystem::Cpu);
        assert_eq!(" GPU ".parse::<Subsystem>().unwrap(), Subsystem::Gpu);
        assert!(matches!(
            "npu".parse::<Subsystem>(),
            Err(Error::InvalidSubsystem(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        for subsystem in Subsystem::ALL {
            assert_eq!(
                subsystem.to_string().parse::<Subsystem>().unwrap(),
                subsystem
            );
        }
    }

    #[test]
    fn test_frequency_scale() {
        assert_eq!(Subsystem::Cpu.frequency_scale(), 1_000);
        assert_eq!(Subsystem::Gpu.frequency_scale(), 1);
    }

    #[test]
    fn test_to_mhz() {
        assert_eq!(Subsystem::Cpu.to_mhz("1400000").as_deref(), Some("1400 MHz"));
        assert_eq!(Subsystem::Gpu.to_mhz("450000000").as_deref(), Some("450 MHz"));
        assert_eq!(Subsystem::Cpu.to_mhz(""), None);
        assert_eq!(Subsystem::Cpu.to_mhz("fast"), None);
        assert_eq!(Subsystem::Cpu.to_mhz("-1"), None);
    }
}
