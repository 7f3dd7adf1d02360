//! CPU field layout, parsing and the typed CPU view.

use crate::field::{Field, INVALID};
use crate::fieldset::{Attribute, Decoder, FieldSet, FieldSpec, Value};
use crate::paths;
use crate::reader::FileReader;
use crate::subsystem::Subsystem;
use serde::Serialize;
use tracing::debug;

/// Core counts above this get a representative core.
const OCTA_CORE_THRESHOLD: i64 = 4;

/// Parses a core range list such as `0-7` into a core count.
///
/// The count is the highest listed index plus one.
pub fn parse_core_count(content: &str) -> Option<i64> {
    content
        .split(|c: char| !c.is_ascii_digit())
        .rfind(|token| !token.is_empty())
        .and_then(|token| token.parse::<i64>().ok())
        .and_then(|last| last.checked_add(1))
}

/// Parses whitespace-separated frequencies, skipping junk, sorted ascending.
pub fn parse_frequencies(content: &str) -> Vec<i64> {
    let mut frequencies: Vec<i64> = content
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect();
    frequencies.sort_unstable();
    frequencies
}

/// Parses a whitespace-separated governor list, sorted.
pub fn parse_governors(content: &str) -> Vec<String> {
    let mut governors: Vec<String> = content.split_whitespace().map(str::to_string).collect();
    governors.sort();
    governors
}

/// Formats a kHz value as MHz, e.g. `"1400000"` to `"1400 MHz"`.
pub fn khz_to_mhz(raw: &str) -> Option<String> {
    Subsystem::Cpu.to_mhz(raw)
}

/// Inverse of [`khz_to_mhz`]: `"2457 MHz"` to `2457000`.
///
/// A bare number passes through unchanged; anything else is `INVALID`.
pub fn from_mhz(value: &str) -> i64 {
    let value = value.trim();
    match value.strip_suffix("MHz") {
        Some(mhz) => mhz
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|v| v.checked_mul(1_000))
            .unwrap_or(INVALID),
        None => value.parse().unwrap_or(INVALID),
    }
}

/// Formats a frequency list as `"200 MHz, 800 MHz"`, or `"-"` when empty.
pub fn list_frequencies_formatted(frequencies: &[i64]) -> String {
    if frequencies.is_empty() {
        return "-".to_string();
    }
    frequencies
        .iter()
        .filter_map(|f| khz_to_mhz(&f.to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Picks the core to read frequencies from.
///
/// Some big.LITTLE parts leave cpu0's cpufreq node missing, so on more than
/// four cores the first of cpu0..cpu3 with a cpufreq directory is used.
pub fn representative_core(reader: &dyn FileReader, core_count: i64) -> usize {
    if core_count <= OCTA_CORE_THRESHOLD {
        return 0;
    }
    let core = (0..OCTA_CORE_THRESHOLD as usize)
        .find(|core| reader.exists(&paths::core_cpufreq(*core)))
        .unwrap_or(0);
    debug!("Using cpu{} to read from", core);
    core
}

/// CPU fields for one core.
pub fn field_specs(core: usize, temperature_path: &str) -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(Attribute::CoreCount, paths::PATH_CPU_PRESENT, Decoder::CoreRange),
        FieldSpec::new(
            Attribute::FreqAvailable,
            paths::freq_available(core),
            Decoder::IntList,
        ),
        FieldSpec::new(Attribute::FreqCurrent, paths::freq_current(core), Decoder::Int),
        FieldSpec::new(Attribute::FreqMax, paths::freq_max(core), Decoder::Int),
        FieldSpec::new(Attribute::FreqMin, paths::freq_min(core), Decoder::Int),
        FieldSpec::new(
            Attribute::GovernorAvailable,
            paths::governors_available(core),
            Decoder::TextList,
        ),
        FieldSpec::new(Attribute::Governor, paths::governor(core), Decoder::Text),
        FieldSpec::new(Attribute::Temperature, temperature_path, Decoder::Int),
    ]
}

/// Fills unresolved min/max from the ends of the available-frequency list.
pub fn derive_frequency_bounds(set: &mut FieldSet) {
    let available = set.int_list(Attribute::FreqAvailable).raw();
    let (first, last) = match (available.first(), available.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return,
    };

    if set.int(Attribute::FreqMin).is_invalid() {
        debug!("Deriving min frequency from available list");
        set.set(Attribute::FreqMin, Field::Resolved(Value::Int(first)));
    }
    if set.int(Attribute::FreqMax).is_invalid() {
        debug!("Deriving max frequency from available list");
        set.set(Attribute::FreqMax, Field::Resolved(Value::Int(last)));
    }
}

/// Typed view of a CPU snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuInformation {
    pub core_count: Field<i64>,
    pub is_octa_core: bool,
    pub freq_available: Vec<i64>,
    pub freq_current: Field<i64>,
    pub freq_max: Field<i64>,
    pub freq_min: Field<i64>,
    pub governors_available: Vec<String>,
    pub governor: Field<String>,
    pub temperature: Field<i64>,
}

impl CpuInformation {
    pub fn from_fields(set: &FieldSet) -> Self {
        let core_count = set.int(Attribute::CoreCount);
        let is_octa_core = core_count
            .value()
            .is_some_and(|count| *count > OCTA_CORE_THRESHOLD);
        Self {
            core_count,
            is_octa_core,
            freq_available: set.int_list(Attribute::FreqAvailable).raw(),
            freq_current: set.int(Attribute::FreqCurrent),
            freq_max: set.int(Attribute::FreqMax),
            freq_min: set.int(Attribute::FreqMin),
            governors_available: set.text_list(Attribute::GovernorAvailable).raw(),
            governor: set.text(Attribute::Governor),
            temperature: set.int(Attribute::Temperature),
        }
    }

    /// Formats a frequency of this CPU in MHz.
    pub fn freq_as_mhz(frequency: &Field<i64>) -> Option<String> {
        frequency.value().and_then(|f| khz_to_mhz(&f.to_string()))
    }
}
