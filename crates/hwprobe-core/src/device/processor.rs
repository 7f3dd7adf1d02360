//! Processor identity from `/proc/cpuinfo`.

use crate::paths::PATH_PROC_CPUINFO;
use crate::Prober;
use serde::Serialize;

/// Identity lines of `/proc/cpuinfo` plus build-target facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorInfo {
    pub processor: Option<String>,
    pub bogomips: Option<String>,
    pub features: Option<String>,
    pub hardware: Option<String>,
    pub is_64bit: bool,
    pub supported_abis: Vec<String>,
}

impl ProcessorInfo {
    pub fn parse(content: &str) -> Self {
        let mut info = Self {
            processor: None,
            bogomips: None,
            features: None,
            hardware: None,
            is_64bit: is_64bit(),
            supported_abis: supported_abis(),
        };

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "Processor" | "model name" => info.processor.get_or_insert(value),
                key if key.eq_ignore_ascii_case("bogomips") => info.bogomips.get_or_insert(value),
                "Features" | "flags" => info.features.get_or_insert(value),
                "Hardware" => info.hardware.get_or_insert(value),
                _ => continue,
            };
        }

        info
    }

    /// Reads `/proc/cpuinfo`; `None` if it cannot be read at all.
    pub async fn read(prober: &Prober) -> Option<Self> {
        let content = prober.read_text(PATH_PROC_CPUINFO).await?;
        Some(Self::parse(&content))
    }

    /// ABIs joined with `", "`.
    pub fn abis_joined(&self) -> String {
        self.supported_abis.join(", ")
    }
}

/// Whether this build targets a 64-bit architecture.
pub fn is_64bit() -> bool {
    cfg!(target_pointer_width = "64")
}

/// ABIs this build can run, most specific first.
pub fn supported_abis() -> Vec<String> {
    let abis: &[&str] = match std::env::consts::ARCH {
        "aarch64" => &["arm64-v8a", "armeabi-v7a", "armeabi"],
        "arm" => &["armeabi-v7a", "armeabi"],
        "x86_64" => &["x86_64", "x86"],
        "x86" => &["x86"],
        other => return vec![other.to_string()],
    };
    abis.iter().map(|s| s.to_string()).collect()
}
