//! Human-readable rendering.

use hwprobe_core::cpu::{khz_to_mhz, list_frequencies_formatted};
use hwprobe_core::device::{EmmcInfo, IoScheduler, KernelInfo, MemoryInfo, ProcessorInfo};
use hwprobe_core::field::UNAVAILABLE;
use hwprobe_core::gpu::hz_to_mhz;
use hwprobe_core::{CpuCore, Field, Snapshot};
use std::fmt::Write;

fn frequency(field: &Field<i64>, to_mhz: fn(&str) -> Option<String>) -> String {
    match field {
        Field::Resolved(value) => {
            to_mhz(&value.to_string()).unwrap_or_else(|| UNAVAILABLE.to_string())
        }
        other => other.display_or_unavailable(),
    }
}

fn temperature(field: &Field<i64>) -> String {
    match field {
        Field::Resolved(millis) => format!("{:.1} °C", *millis as f64 / 1000.0),
        other => other.display_or_unavailable(),
    }
}

fn optional(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNAVAILABLE)
}

fn header(out: &mut String, title: &str, snapshot: &Snapshot) {
    let _ = write!(out, "{} ({}", title, snapshot.state);
    if snapshot.escalated {
        out.push_str(", via root");
    }
    out.push_str("):\n");
}

pub fn render_cpu(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let Some(cpu) = snapshot.cpu() else {
        return out;
    };

    header(&mut out, "CPU", snapshot);
    let cores = cpu.core_count.display_or_unavailable();
    if cpu.is_octa_core {
        let _ = writeln!(out, "  Cores: {} (octa-core)", cores);
    } else {
        let _ = writeln!(out, "  Cores: {}", cores);
    }
    let _ = writeln!(out, "  Current: {}", frequency(&cpu.freq_current, khz_to_mhz));
    let _ = writeln!(out, "  Min: {}", frequency(&cpu.freq_min, khz_to_mhz));
    let _ = writeln!(out, "  Max: {}", frequency(&cpu.freq_max, khz_to_mhz));
    let _ = writeln!(
        out,
        "  Available: {}",
        list_frequencies_formatted(&cpu.freq_available)
    );
    let _ = writeln!(out, "  Governor: {}", cpu.governor.display_or_unavailable());
    let governors = if cpu.governors_available.is_empty() {
        "-".to_string()
    } else {
        cpu.governors_available.join(", ")
    };
    let _ = writeln!(out, "  Governors: {}", governors);
    let _ = writeln!(out, "  Temperature: {}", temperature(&cpu.temperature));
    out
}

pub fn render_gpu(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let Some(gpu) = snapshot.gpu() else {
        return out;
    };

    header(&mut out, "GPU", snapshot);
    let _ = writeln!(out, "  Current: {}", frequency(&gpu.freq_current, hz_to_mhz));
    let _ = writeln!(out, "  Min: {}", frequency(&gpu.freq_min, hz_to_mhz));
    let _ = writeln!(out, "  Max: {}", frequency(&gpu.freq_max, hz_to_mhz));
    let available: Vec<String> = gpu
        .freq_available
        .iter()
        .filter_map(|f| hz_to_mhz(&f.to_string()))
        .collect();
    let available = if available.is_empty() {
        "-".to_string()
    } else {
        available.join(", ")
    };
    let _ = writeln!(out, "  Available: {}", available);
    out
}

pub fn render_kernel(info: Option<&KernelInfo>) -> String {
    let Some(info) = info else {
        return format!("Kernel: {}\n", UNAVAILABLE);
    };
    let mut out = String::from("Kernel:\n");
    let _ = writeln!(out, "  Version: {}", info.version);
    let _ = writeln!(out, "  Host: {}", info.host);
    let _ = writeln!(out, "  Toolchain: {}", info.toolchain);
    let _ = writeln!(out, "  Revision: {}", info.revision);
    if !info.extras.is_empty() {
        let _ = writeln!(out, "  Extras: {}", info.extras);
    }
    let _ = writeln!(out, "  Date: {}", optional(&info.date));
    out
}

pub fn render_memory(info: &MemoryInfo) -> String {
    let mut out = String::from("Memory:\n");
    let _ = writeln!(out, "  Total: {} {}", info.total, info.unit);
    let _ = writeln!(out, "  Free: {} {}", info.free, info.unit);
    let _ = writeln!(out, "  Cached: {} {}", info.cached, info.unit);
    out
}

pub fn render_processor(info: Option<&ProcessorInfo>) -> String {
    let Some(info) = info else {
        return format!("Processor: {}\n", UNAVAILABLE);
    };
    let mut out = String::from("Processor:\n");
    let _ = writeln!(out, "  Processor: {}", optional(&info.processor));
    let _ = writeln!(out, "  BogoMIPS: {}", optional(&info.bogomips));
    let _ = writeln!(out, "  Features: {}", optional(&info.features));
    let _ = writeln!(out, "  Hardware: {}", optional(&info.hardware));
    let _ = writeln!(out, "  64-bit: {}", if info.is_64bit { "yes" } else { "no" });
    let _ = writeln!(out, "  ABIs: {}", info.abis_joined());
    out
}

pub fn render_io_scheduler(info: Option<&IoScheduler>) -> String {
    let Some(info) = info else {
        return format!("I/O scheduler: {}\n", UNAVAILABLE);
    };
    let mut out = format!("I/O scheduler ({}):\n", info.device);
    let current = if info.current.is_empty() {
        UNAVAILABLE
    } else {
        info.current.as_str()
    };
    let _ = writeln!(out, "  Current: {}", current);
    let _ = writeln!(out, "  Available: {}", info.available.join(", "));
    match info.read_ahead_kb {
        Some(kb) => {
            let _ = writeln!(out, "  Read-ahead: {} KB", kb);
        }
        None => {
            let _ = writeln!(out, "  Read-ahead: {}", UNAVAILABLE);
        }
    }
    out
}

pub fn render_emmc(info: &EmmcInfo) -> String {
    if info.name.is_none() && info.cid.is_none() {
        return format!("eMMC: {}\n", UNAVAILABLE);
    }
    let mut out = String::from("eMMC:\n");
    let _ = writeln!(out, "  Name: {}", optional(&info.name));
    let _ = writeln!(out, "  Manufacturer: {}", optional(&info.manfid));
    let _ = writeln!(out, "  CID: {}", optional(&info.cid));
    let _ = writeln!(out, "  Date: {}", optional(&info.date));
    let _ = writeln!(out, "  Revision: {}", info.rev);
    let impact = info
        .bug_impact()
        .map(|impact| impact.to_string())
        .unwrap_or_else(|| "none known".to_string());
    let _ = writeln!(out, "  Firmware bug: {}", impact);
    let _ = writeln!(out, "  Can brick: {}", if info.can_brick() { "yes" } else { "no" });
    out
}

pub fn render_cores(timestamp: &str, cores: &[CpuCore]) -> String {
    let mut out = format!("[{}]\n", timestamp);
    for core in cores {
        let _ = writeln!(out, "  {}", core);
    }
    out
}
