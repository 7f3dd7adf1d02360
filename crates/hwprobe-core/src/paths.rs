//! Pseudo-file path table.
//!
//! Pure formatting: an out-of-range core index yields a path that simply
//! fails to read later.

/// Kernel identity.
pub const PATH_PROC_VERSION: &str = "/proc/version";
/// Processor identity.
pub const PATH_PROC_CPUINFO: &str = "/proc/cpuinfo";
/// Memory counters.
pub const PATH_PROC_MEMINFO: &str = "/proc/meminfo";

/// Root of the CPU topology tree.
pub const PATH_CPU_BASE: &str = "/sys/devices/system/cpu";
/// Present cores as a range list, e.g. `0-7`.
pub const PATH_CPU_PRESENT: &str = "/sys/devices/system/cpu/present";
/// Default thermal zone (millidegrees Celsius).
pub const PATH_TEMPERATURE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Directory of a single core.
pub fn core_base(core: usize) -> String {
    format!("{}/cpu{}", PATH_CPU_BASE, core)
}

/// cpufreq directory of a single core.
pub fn core_cpufreq(core: usize) -> String {
    format!("{}/cpufreq", core_base(core))
}

pub fn freq_available(core: usize) -> String {
    format!("{}/scaling_available_frequencies", core_cpufreq(core))
}

pub fn freq_current(core: usize) -> String {
    format!("{}/scaling_cur_freq", core_cpufreq(core))
}

pub fn freq_max(core: usize) -> String {
    format!("{}/scaling_max_freq", core_cpufreq(core))
}

pub fn freq_min(core: usize) -> String {
    format!("{}/scaling_min_freq", core_cpufreq(core))
}

pub fn governor(core: usize) -> String {
    format!("{}/scaling_governor", core_cpufreq(core))
}

pub fn governors_available(core: usize) -> String {
    format!("{}/scaling_available_governors", core_cpufreq(core))
}

/// I/O scheduler selector of a block device.
pub fn block_scheduler(device: &str) -> String {
    format!("/sys/block/{}/queue/scheduler", device)
}

/// Read-ahead size of a block device, in KiB.
pub fn block_read_ahead(device: &str) -> String {
    format!("/sys/block/{}/queue/read_ahead_kb", device)
}

/// Device directory of the first eMMC.
pub const PATH_EMMC_DEVICE: &str = "/sys/class/block/mmcblk0/device";

/// An attribute file of the first eMMC, e.g. `cid` or `manfid`.
pub fn emmc_attribute(name: &str) -> String {
    format!("{}/{}", PATH_EMMC_DEVICE, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_paths() {
        assert_eq!(
            freq_current(0),
            "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq"
        );
        assert_eq!(
            freq_max(3),
            "/sys/devices/system/cpu/cpu3/cpufreq/scaling_max_freq"
        );
        assert_eq!(
            freq_min(7),
            "/sys/devices/system/cpu/cpu7/cpufreq/scaling_min_freq"
        );
        assert_eq!(
            freq_available(1),
            "/sys/devices/system/cpu/cpu1/cpufreq/scaling_available_frequencies"
        );
        assert_eq!(
            governor(2),
            "/sys/devices/system/cpu/cpu2/cpufreq/scaling_governor"
        );
        assert_eq!(
            governors_available(0),
            "/sys/devices/system/cpu/cpu0/cpufreq/scaling_available_governors"
        );
    }

    #[test]
    fn test_large_index_is_just_formatted() {
        assert_eq!(core_base(4096), "/sys/devices/system/cpu/cpu4096");
    }

    #[test]
    fn test_block_paths() {
        assert_eq!(
            block_scheduler("mmcblk0"),
            "/sys/block/mmcblk0/queue/scheduler"
        );
        assert_eq!(
            block_read_ahead("sda"),
            "/sys/block/sda/queue/read_ahead_kb"
        );
    }
}
