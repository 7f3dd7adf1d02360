//! Block device I/O scheduler.

use crate::paths;
use crate::Prober;
use serde::Serialize;

/// Block devices probed, in order.
pub const BLOCK_DEVICES: &[&str] = &["mmcblk0", "mmcblk1", "sda", "nvme0n1", "vda"];

/// Scheduler selection of one block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoScheduler {
    pub device: String,
    pub available: Vec<String>,
    /// The bracketed entry; empty if none is marked.
    pub current: String,
    pub read_ahead_kb: Option<i64>,
}

impl IoScheduler {
    /// Parses a selector line such as `noop [cfq] deadline`.
    pub fn parse(device: &str, content: &str) -> Option<Self> {
        let mut available = Vec::new();
        let mut current = String::new();

        for token in content.split_whitespace() {
            match token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                Some(name) => {
                    current = name.to_string();
                    available.push(name.to_string());
                }
                None => available.push(token.to_string()),
            }
        }

        if available.is_empty() {
            return None;
        }

        Some(Self {
            device: device.to_string(),
            available,
            current,
            read_ahead_kb: None,
        })
    }

    /// Reads the scheduler of the first known block device that exists.
    pub async fn read(prober: &Prober) -> Option<Self> {
        let device = BLOCK_DEVICES
            .iter()
            .find(|dev| prober.reader().exists(&paths::block_scheduler(dev)))?;

        let content = prober.read_text(&paths::block_scheduler(device)).await?;
        let mut scheduler = Self::parse(device, &content)?;
        scheduler.read_ahead_kb = prober
            .read_text(&paths::block_read_ahead(device))
            .await
            .and_then(|v| v.trim().parse().ok());
        Some(scheduler)
    }
}
