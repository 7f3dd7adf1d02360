//! Kernel identity from `/proc/version`.

use crate::paths::PATH_PROC_VERSION;
use crate::Prober;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

static PROC_VERSION: OnceLock<Option<Regex>> = OnceLock::new();

fn proc_version_regex() -> Option<&'static Regex> {
    PROC_VERSION
        .get_or_init(|| {
            Regex::new(concat!(
                r"^Linux version (\S+) ",
                r"\((\S+?)\) ",
                r"\((.+?)\)\s*",
                r"(#\S+) ?",
                r"(.*?)\s*",
                r"((?:Sun|Mon|Tue|Wed|Thu|Fri|Sat) .+)?$",
            ))
            .ok()
        })
        .as_ref()
}

/// Parsed `/proc/version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelInfo {
    /// Release, e.g. `6.1.0-18-amd64`.
    pub version: String,
    /// Builder, e.g. `buildd@host`.
    pub host: String,
    pub toolchain: String,
    /// Build number, e.g. `#1`.
    pub revision: String,
    /// Flags such as `SMP PREEMPT`; may be empty.
    pub extras: String,
    /// Build date, when it starts with a weekday.
    pub date: Option<String>,
}

impl KernelInfo {
    /// Parses the content of `/proc/version`; `None` if it does not match.
    pub fn parse(content: &str) -> Option<Self> {
        let content = content.replace('\n', " ");
        let captures = proc_version_regex()?.captures(content.trim())?;
        let group = |i: usize| {
            captures
                .get(i)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        Some(Self {
            version: group(1),
            host: group(2),
            toolchain: group(3),
            revision: group(4),
            extras: group(5),
            date: captures.get(6).map(|m| m.as_str().trim().to_string()),
        })
    }

    pub async fn read(prober: &Prober) -> Option<Self> {
        let content = prober.read_text(PATH_PROC_VERSION).await?;
        let info = Self::parse(&content);
        if info.is_none() {
            debug!("Unrecognised {} format", PATH_PROC_VERSION);
        }
        info
    }
}
