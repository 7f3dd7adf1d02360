//! Memory counters from `/proc/meminfo`.

use crate::paths::PATH_PROC_MEMINFO;
use crate::{Error, Prober, Result};
use serde::Serialize;
use std::str::FromStr;

/// Unit for reported memory sizes. The kernel reports KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryUnit {
    B,
    #[default]
    Kb,
    Mb,
}

impl MemoryUnit {
    /// Converts a KiB count into this unit.
    pub fn from_kib(&self, kib: u64) -> u64 {
        match self {
            MemoryUnit::B => kib.saturating_mul(1024),
            MemoryUnit::Kb => kib,
            MemoryUnit::Mb => kib / 1024,
        }
    }
}

impl FromStr for MemoryUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "b" => Ok(MemoryUnit::B),
            "kb" => Ok(MemoryUnit::Kb),
            "mb" => Ok(MemoryUnit::Mb),
            _ => Err(Error::InvalidMemoryUnit(s.to_string())),
        }
    }
}

impl std::fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryUnit::B => write!(f, "B"),
            MemoryUnit::Kb => write!(f, "KB"),
            MemoryUnit::Mb => write!(f, "MB"),
        }
    }
}

/// Total, free and cached memory in one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemoryInfo {
    pub unit: MemoryUnit,
    pub total: u64,
    pub free: u64,
    pub cached: u64,
}

impl MemoryInfo {
    /// Parses `/proc/meminfo`. Missing or garbage counters read as zero.
    pub fn parse(content: &str, unit: MemoryUnit) -> Self {
        let mut info = MemoryInfo {
            unit,
            ..Default::default()
        };

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let kib = parse_kib(value);
            match key.trim() {
                "MemTotal" => info.total = unit.from_kib(kib),
                "MemFree" => info.free = unit.from_kib(kib),
                "Cached" => info.cached = unit.from_kib(kib),
                _ => {}
            }
        }

        info
    }

    /// Reads memory counters; an unreadable file yields zeros.
    pub async fn read(prober: &Prober, unit: MemoryUnit) -> Self {
        match prober.read_text(PATH_PROC_MEMINFO).await {
            Some(content) => Self::parse(&content, unit),
            None => MemoryInfo {
                unit,
                ..Default::default()
            },
        }
    }
}

/// Negative or unparseable values clamp to zero.
fn parse_kib(value: &str) -> u64 {
    value
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse::<i64>()
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryReader, ScriptedExecutor};
    use std::sync::Arc;

    const MEMINFO: &str = "MemTotal:       16314260 kB\n\
                           MemFree:         1024000 kB\n\
                           MemAvailable:    8000000 kB\n\
                           Buffers:          300000 kB\n\
                           Cached:          4096000 kB\n\
                           SwapCached:          512 kB\n";

    #[test]
    fn test_parse_units() {
        let kb = MemoryInfo::parse(MEMINFO, MemoryUnit::Kb);
        assert_eq!(kb.total, 16314260);
        assert_eq!(kb.free, 1024000);
        assert_eq!(kb.cached, 4096000);

        let mb = MemoryInfo::parse(MEMINFO, MemoryUnit::Mb);
        assert_eq!(mb.free, 1000);
        assert_eq!(mb.cached, 4000);

        let b = MemoryInfo::parse(MEMINFO, MemoryUnit::B);
        assert_eq!(b.free, 1024000 * 1024);
    }

    #[test]
    fn test_garbage_clamps_to_zero() {
        let info = MemoryInfo::parse("MemTotal: -5 kB\nMemFree: lots\n", MemoryUnit::Kb);
        assert_eq!(info.total, 0);
        assert_eq!(info.free, 0);
        assert_eq!(info.cached, 0);
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("MB".parse::<MemoryUnit>().unwrap(), MemoryUnit::Mb);
        assert_eq!("b".parse::<MemoryUnit>().unwrap(), MemoryUnit::B);
        assert!(matches!(
            "gb".parse::<MemoryUnit>(),
            Err(Error::InvalidMemoryUnit(_))
        ));
    }

    #[tokio::test]
    async fn test_read_unreadable_is_zero() {
        let prober = Prober::new(
            Arc::new(MemoryReader::new()),
            Arc::new(ScriptedExecutor::unavailable()),
        );
        let info = MemoryInfo::read(&prober, MemoryUnit::Mb).await;
        assert_eq!(info.total, 0);
        assert_eq!(info.unit, MemoryUnit::Mb);
    }

    #[tokio::test]
    async fn test_read_direct() {
        let prober = Prober::new(
            Arc::new(MemoryReader::new().with_file(PATH_PROC_MEMINFO, MEMINFO)),
            Arc::new(ScriptedExecutor::unavailable()),
        );
        let info = MemoryInfo::read(&prober, MemoryUnit::Kb).await;
        assert_eq!(info.total, 16314260);
    }
}
