//! GPU path discovery and the typed GPU view.
//!
//! GPU nodes differ per vendor, so paths come from candidate lists: the
//! first existing base directory, then the first existing file under it.

use crate::field::Field;
use crate::fieldset::{Attribute, Decoder, FieldSet, FieldSpec};
use crate::reader::FileReader;
use crate::subsystem::Subsystem;
use serde::Serialize;
use tracing::debug;

/// Known GPU sysfs base directories.
pub const DEFAULT_BASE_PATHS: &[&str] = &[
    "/sys/class/kgsl/kgsl-3d0/",
    "/sys/devices/platform/kgsl-3d0.0/kgsl/kgsl-3d0/",
    "/sys/devices/fdb00000.qcom,kgsl-3d0/kgsl/kgsl-3d0/",
    "/sys/class/misc/mali0/device/",
    "/sys/devices/platform/mali.0/",
];

/// Available-frequency file names, relative to the base.
const FREQ_AVAILABLE_FILES: &[&str] = &[
    "gpu_available_frequencies",
    "devfreq/available_frequencies",
];

/// Current-frequency file names, relative to the base.
const FREQ_CURRENT_FILES: &[&str] = &["gpuclk", "devfreq/cur_freq", "clock"];

/// Resolved GPU file locations. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GpuPaths {
    pub base: Option<String>,
    pub freq_available: Option<String>,
    pub freq_current: Option<String>,
}

impl GpuPaths {
    /// Probes the candidate lists once.
    pub fn resolve<S: AsRef<str>>(reader: &dyn FileReader, bases: &[S]) -> Self {
        let base = bases
            .iter()
            .map(|b| b.as_ref())
            .find(|b| reader.exists(b))
            .map(|b| b.to_string());

        let Some(base) = base else {
            debug!("No GPU base directory found");
            return Self::default();
        };

        let find = |files: &[&str]| {
            files
                .iter()
                .map(|f| join(&base, f))
                .find(|path| reader.exists(path))
        };

        let paths = Self {
            freq_available: find(FREQ_AVAILABLE_FILES),
            freq_current: find(FREQ_CURRENT_FILES),
            base: Some(base.clone()),
        };
        debug!("GPU paths: {:?}", paths);
        paths
    }

    /// GPU fields; min and max share the available-frequency file.
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        let spec = |attribute: Attribute, path: &Option<String>, decoder: Decoder| match path {
            Some(path) => FieldSpec::new(attribute, path.clone(), decoder),
            None => FieldSpec::unlocated(attribute, decoder),
        };
        vec![
            spec(Attribute::FreqAvailable, &self.freq_available, Decoder::IntList),
            spec(Attribute::FreqMax, &self.freq_available, Decoder::ListMax),
            spec(Attribute::FreqMin, &self.freq_available, Decoder::ListMin),
            spec(Attribute::FreqCurrent, &self.freq_current, Decoder::Int),
        ]
    }
}

fn join(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file)
}

/// Formats a Hz value as MHz.
pub fn hz_to_mhz(raw: &str) -> Option<String> {
    Subsystem::Gpu.to_mhz(raw)
}

/// Typed view of a GPU snapshot. Frequencies are in Hz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuInformation {
    pub freq_available: Vec<i64>,
    pub freq_current: Field<i64>,
    pub freq_max: Field<i64>,
    pub freq_min: Field<i64>,
}

impl GpuInformation {
    pub fn from_fields(set: &FieldSet) -> Self {
        Self {
            freq_available: set.int_list(Attribute::FreqAvailable).raw(),
            freq_current: set.int(Attribute::FreqCurrent),
            freq_max: set.int(Attribute::FreqMax),
            freq_min: set.int(Attribute::FreqMin),
        }
    }

    /// Formats as `"450000000 (450 MHz)"`.
    pub fn freq_as_mhz_readable(frequency: i64) -> String {
        match hz_to_mhz(&frequency.to_string()) {
            Some(mhz) => format!("{} ({})", frequency, mhz),
            None => frequency.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryReader;

    const KGSL: &str = "/sys/class/kgsl/kgsl-3d0/";

    #[test]
    fn test_resolve_first_existing() {
        let reader = MemoryReader::new()
            .with_file(
                "/sys/class/kgsl/kgsl-3d0/gpu_available_frequencies",
                "450000000 200000000",
            )
            .with_file("/sys/class/kgsl/kgsl-3d0/devfreq/cur_freq", "200000000")
            .with_dir("/sys/class/misc/mali0/device");

        let paths = GpuPaths::resolve(&reader, DEFAULT_BASE_PATHS);
        assert_eq!(paths.base.as_deref(), Some(KGSL));
        assert_eq!(
            paths.freq_available.as_deref(),
            Some("/sys/class/kgsl/kgsl-3d0/gpu_available_frequencies")
        );
        assert_eq!(
            paths.freq_current.as_deref(),
            Some("/sys/class/kgsl/kgsl-3d0/devfreq/cur_freq")
        );
    }

    #[test]
    fn test_resolve_nothing() {
        let paths = GpuPaths::resolve(&MemoryReader::new(), DEFAULT_BASE_PATHS);
        assert_eq!(paths, GpuPaths::default());
        assert!(paths.field_specs().iter().all(|s| s.path.is_none()));
    }

    #[test]
    fn test_min_max_share_path() {
        let paths = GpuPaths {
            base: Some(KGSL.to_string()),
            freq_available: Some("/avail".to_string()),
            freq_current: None,
        };
        let specs = paths.field_specs();
        let shared = specs
            .iter()
            .filter(|s| s.path.as_deref() == Some("/avail"))
            .count();
        assert_eq!(shared, 3);
    }

    #[test]
    fn test_hz_to_mhz() {
        assert_eq!(hz_to_mhz("450000000").as_deref(), Some("450 MHz"));
        assert_eq!(hz_to_mhz(""), None);
        assert_eq!(
            GpuInformation::freq_as_mhz_readable(450_000_000),
            "450000000 (450 MHz)"
        );
    }
}
