//! Configuration management.

use anyhow::{Context, Result};
use hwprobe_core::shell::DEFAULT_SU_PATHS;
use hwprobe_core::{ProbeOptions, ShellConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Root shell fallback
    #[serde(default)]
    pub privilege: PrivilegeConfig,

    /// Snapshot acquisition
    #[serde(default)]
    pub acquire: AcquireConfig,

    /// Per-core monitor
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// GPU path discovery
    #[serde(default)]
    pub gpu: GpuConfig,

    /// Temperature source
    #[serde(default)]
    pub thermal: ThermalConfig,
}

/// Privileged read configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeConfig {
    /// Retry failed reads through a root shell
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Elevation command (e.g., "su")
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Binaries whose presence means root is available
    #[serde(default = "default_su_paths")]
    pub su_paths: Vec<String>,
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            shell: default_shell(),
            su_paths: default_su_paths(),
        }
    }
}

/// Acquisition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AcquireConfig {
    /// Give up on privileged reads after this many milliseconds (0 = wait forever)
    #[serde(default)]
    pub deadline_ms: u64,
}

/// Monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
        }
    }
}

/// GPU configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuConfig {
    /// Candidate sysfs base directories, probed in order
    #[serde(default = "default_gpu_base_paths")]
    pub base_paths: Vec<String>,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            base_paths: default_gpu_base_paths(),
        }
    }
}

/// Thermal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// Thermal zone temperature file (millidegrees Celsius)
    #[serde(default = "default_zone_path")]
    pub zone_path: String,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            zone_path: default_zone_path(),
        }
    }
}

// Default value functions
fn default_enabled() -> bool {
    true
}

fn default_shell() -> String {
    "su".to_string()
}

fn default_su_paths() -> Vec<String> {
    DEFAULT_SU_PATHS.iter().map(|s| s.to_string()).collect()
}

fn default_interval() -> u64 {
    2000
}

fn default_gpu_base_paths() -> Vec<String> {
    ProbeOptions::default().gpu_base_paths
}

fn default_zone_path() -> String {
    ProbeOptions::default().temperature_path
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
        Ok(())
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Acquisition options for the core library.
    pub fn probe_options(&self) -> ProbeOptions {
        let deadline = match self.acquire.deadline_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        ProbeOptions::default()
            .with_privileged_fallback(self.privilege.enabled)
            .with_deadline(deadline)
            .with_temperature_path(self.thermal.zone_path.clone())
            .with_gpu_base_paths(self.gpu.base_paths.clone())
    }

    /// How to start the root shell.
    pub fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            program: self.privilege.shell.clone(),
            args: Vec::new(),
            su_paths: self.privilege.su_paths.clone(),
        }
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.interval_ms)
    }
}
