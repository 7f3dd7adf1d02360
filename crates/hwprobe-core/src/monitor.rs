//! Periodic per-core frequency sampling.

use crate::cpu::{khz_to_mhz, parse_core_count};
use crate::paths;
use crate::privileged::shell_quote;
use crate::publish::{Delivery, ResultPublisher};
use crate::reader::read_int;
use crate::Prober;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default sampling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// One core's sampled state. Unreadable values are `0` / `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuCore {
    pub core: usize,
    /// Current frequency in kHz.
    pub current: i64,
    /// Maximum frequency in kHz.
    pub max: i64,
    pub governor: String,
}

impl CpuCore {
    /// A core with nothing read yet, or offline.
    pub fn idle(core: usize) -> Self {
        Self {
            core,
            current: 0,
            max: 0,
            governor: "0".to_string(),
        }
    }

    fn from_parts(
        core: usize,
        current: Option<&str>,
        max: Option<&str>,
        governor: Option<&str>,
    ) -> Self {
        Self {
            core,
            current: current.and_then(|v| v.trim().parse().ok()).unwrap_or(0),
            max: max.and_then(|v| v.trim().parse().ok()).unwrap_or(0),
            governor: governor
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .unwrap_or("0")
                .to_string(),
        }
    }
}

impl std::fmt::Display for CpuCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mhz = |v: i64| khz_to_mhz(&v.to_string()).unwrap_or_else(|| "0 MHz".to_string());
        write!(
            f,
            "cpu{}: {} / {} ({})",
            self.core,
            mhz(self.current),
            mhz(self.max),
            self.governor
        )
    }
}

/// Shell script printing `"<cur> <max> <governor>"` for each core, one line
/// per core, `0 0 0` for cores without cpufreq.
pub fn batch_script(core_count: usize) -> String {
    let cat = |path: String| format!("$(cat {} 2>/dev/null || echo 0)", shell_quote(&path));
    (0..core_count)
        .map(|core| {
            format!(
                "if [ -d {} ]; then echo \"{} {} {}\"; else echo \"0 0 0\"; fi",
                shell_quote(&paths::core_cpufreq(core)),
                cat(paths::freq_current(core)),
                cat(paths::freq_max(core)),
                cat(paths::governor(core)),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses [`batch_script`] output. Missing lines yield idle cores.
pub fn parse_batch_output(output: &str, core_count: usize) -> Vec<CpuCore> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    (0..core_count)
        .map(|core| match lines.next() {
            Some(line) => {
                let mut parts = line.split_whitespace();
                CpuCore::from_parts(core, parts.next(), parts.next(), parts.next())
            }
            None => CpuCore::idle(core),
        })
        .collect()
}

/// Samples every core's current/max frequency and governor.
pub struct CoreMonitor {
    prober: Arc<Prober>,
    core_count: usize,
}

impl CoreMonitor {
    /// Creates a monitor, reading the core count once.
    pub fn new(prober: Arc<Prober>) -> Self {
        let core_count = prober
            .reader()
            .read(paths::PATH_CPU_PRESENT)
            .and_then(|content| parse_core_count(&content))
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(1);
        Self::with_core_count(prober, core_count)
    }

    pub fn with_core_count(prober: Arc<Prober>, core_count: usize) -> Self {
        Self { prober, core_count }
    }

    pub fn core_count(&self) -> usize {
        self.core_count
    }

    /// True if any per-core file is unreadable directly and root is usable.
    pub fn should_use_root(&self) -> bool {
        if !self.prober.privilege_available() {
            return false;
        }
        let reader = self.prober.reader();
        (0..self.core_count)
            .filter(|core| reader.exists(&paths::core_cpufreq(*core)))
            .flat_map(|core| {
                [
                    paths::freq_current(core),
                    paths::freq_max(core),
                    paths::freq_min(core),
                    paths::governor(core),
                ]
            })
            .any(|path| reader.read(&path).is_none())
    }

    /// Takes one sample of every core.
    pub async fn sample(&self) -> Vec<CpuCore> {
        if self.should_use_root() {
            if let Some(cores) = self.sample_privileged().await {
                return cores;
            }
        }
        self.sample_direct()
    }

    async fn sample_privileged(&self) -> Option<Vec<CpuCore>> {
        let script = batch_script(self.core_count);
        let Some(handle) = self.prober.privileged().executor().execute(&script) else {
            warn!("Could not run core sampling script, reading directly");
            return None;
        };
        let output = handle.collect().await;
        output.exit_code?;
        Some(parse_batch_output(&output.text(), self.core_count))
    }

    fn sample_direct(&self) -> Vec<CpuCore> {
        let reader = self.prober.reader();
        (0..self.core_count)
            .map(|core| {
                if !reader.exists(&paths::core_cpufreq(core)) {
                    return CpuCore::idle(core);
                }
                // INVALID reads clamp to the idle 0.
                CpuCore {
                    core,
                    current: read_int(reader, &paths::freq_current(core)).max(0),
                    max: read_int(reader, &paths::freq_max(core)).max(0),
                    governor: reader
                        .read(&paths::governor(core))
                        .filter(|g| !g.is_empty())
                        .unwrap_or_else(|| "0".to_string()),
                }
            })
            .collect()
    }

    /// Samples forever, publishing each sample to `listener`.
    ///
    /// The next sample is taken `interval` after the previous one was
    /// published. Must be called from within a Tokio runtime.
    pub fn start<F>(self, interval: Duration, listener: F, delivery: Delivery) -> MonitorHandle
    where
        F: Fn(Vec<CpuCore>) + Send + Sync + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let listener = Arc::new(listener);

        let task = tokio::spawn(async move {
            loop {
                let cores = self.sample().await;
                if *stop_rx.borrow() {
                    break;
                }

                let listener = Arc::clone(&listener);
                ResultPublisher::new(move |cores: Vec<CpuCore>| listener(cores))
                    .on(delivery.clone())
                    .publish(cores);

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("Core monitor stopped");
        });

        MonitorHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Running monitor. Dropping it stops the loop too.
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signals the loop to end. A sample in progress is discarded.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn join(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!("Core monitor task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryReader, ScriptedExecutor};
    use std::sync::Mutex;

    fn two_core_reader() -> MemoryReader {
        MemoryReader::new()
            .with_file(paths::PATH_CPU_PRESENT, "0-1")
            .with_file(&paths::freq_current(0), "800000")
            .with_file(&paths::freq_max(0), "1400000")
            .with_file(&paths::freq_min(0), "200000")
            .with_file(&paths::governor(0), "schedutil")
    }

    #[test]
    fn test_batch_script_shape() {
        let script = batch_script(2);
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("if [ -d '/sys/devices/system/cpu/cpu1/cpufreq' ]"));
        assert!(lines[1].contains("scaling_governor"));
        assert!(lines[1].ends_with("else echo \"0 0 0\"; fi"));
    }

    #[test]
    fn test_parse_batch_output() {
        let cores = parse_batch_output("162000 1890000 interactive\n0 0 0\n", 3);
        assert_eq!(cores[0].current, 162000);
        assert_eq!(cores[0].max, 1890000);
        assert_eq!(cores[0].governor, "interactive");
        assert_eq!(cores[1], CpuCore::idle(1));
        assert_eq!(cores[2], CpuCore::idle(2));
    }

    #[test]
    fn test_display() {
        let core = CpuCore {
            core: 3,
            current: 800000,
            max: 1400000,
            governor: "schedutil".to_string(),
        };
        assert_eq!(core.to_string(), "cpu3: 800 MHz / 1400 MHz (schedutil)");
    }

    #[tokio::test]
    async fn test_sample_direct() {
        let prober = Arc::new(Prober::new(
            Arc::new(two_core_reader()),
            Arc::new(ScriptedExecutor::unavailable()),
        ));
        let monitor = CoreMonitor::new(prober);
        assert_eq!(monitor.core_count(), 2);
        assert!(!monitor.should_use_root());

        let cores = monitor.sample().await;
        assert_eq!(cores[0].current, 800000);
        assert_eq!(cores[0].governor, "schedutil");
        assert_eq!(cores[1], CpuCore::idle(1));
    }

    #[tokio::test]
    async fn test_sample_direct_unparseable_is_zero() {
        let reader = MemoryReader::new()
            .with_file(paths::PATH_CPU_PRESENT, "0")
            .with_file(&paths::freq_current(0), "<unsupported>")
            .with_file(&paths::freq_max(0), "1400000");
        let prober = Arc::new(Prober::new(
            Arc::new(reader),
            Arc::new(ScriptedExecutor::unavailable()),
        ));

        let cores = CoreMonitor::new(prober).sample().await;
        assert_eq!(cores.len(), 1);
        assert_eq!(cores[0].current, 0);
        assert_eq!(cores[0].max, 1400000);
        assert_eq!(cores[0].governor, "0");
    }

    #[tokio::test]
    async fn test_sample_privileged_when_unreadable() {
        let reader = two_core_reader().with_dir("/sys/devices/system/cpu/cpu1/cpufreq");
        let executor = Arc::new(
            ScriptedExecutor::available()
                .with_script(&batch_script(2), "800000 1400000 schedutil\n300000 2000000 performance"),
        );
        let prober = Arc::new(Prober::new(Arc::new(reader), executor.clone()));
        let monitor = CoreMonitor::new(prober);
        assert!(monitor.should_use_root());

        let cores = monitor.sample().await;
        assert_eq!(cores[1].max, 2000000);
        assert_eq!(cores[1].governor, "performance");
        assert_eq!(executor.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_start_publishes_until_stopped() {
        let prober = Arc::new(Prober::new(
            Arc::new(two_core_reader()),
            Arc::new(ScriptedExecutor::unavailable()),
        ));
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = CoreMonitor::new(prober).start(
            Duration::from_millis(10),
            move |cores| {
                sink.lock().unwrap().push(cores);
                let _ = tx.send(());
            },
            Delivery::Inline,
        );

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        handle.join().await;

        let count = samples.lock().unwrap().len();
        assert!(count >= 2);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(samples.lock().unwrap().len(), count);
    }
}
