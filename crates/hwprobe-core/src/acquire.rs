//! The acquisition loop.
//!
//! A snapshot starts with a direct read of every field. If anything failed
//! and privilege is available, the failed fields are retried through the
//! root shell: one read per distinct path, all in flight at once, each
//! completion decoded as it lands. The pass ends when nothing is unset or
//! pending (`Resolved`), or when the shell cannot be engaged or the deadline
//! passes (`Stalled`).

use crate::cpu::{self, CpuInformation};
use crate::field::INVALID;
use crate::fieldset::{FieldSet, FieldSpec};
use crate::gpu::{self, GpuInformation, GpuPaths};
use crate::paths;
use crate::privileged::PrivilegedReader;
use crate::publish::ResultPublisher;
use crate::reader::{FileReader, SysfsReader};
use crate::shell::{CommandExecutor, RootShell, ShellConfig};
use crate::subsystem::Subsystem;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How a snapshot ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionState {
    /// Every field is resolved or invalid.
    Resolved,
    /// Privileged reads were needed but could not all be completed.
    Stalled,
}

impl std::fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionState::Resolved => write!(f, "resolved"),
            AcquisitionState::Stalled => write!(f, "stalled"),
        }
    }
}

/// The result of one acquisition.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub subsystem: Subsystem,
    pub state: AcquisitionState,
    /// Whether the privileged pass ran.
    pub escalated: bool,
    pub fields: FieldSet,
}

impl Snapshot {
    pub fn is_stalled(&self) -> bool {
        self.state == AcquisitionState::Stalled
    }

    /// Typed CPU view, if this is a CPU snapshot.
    pub fn cpu(&self) -> Option<CpuInformation> {
        (self.subsystem == Subsystem::Cpu).then(|| CpuInformation::from_fields(&self.fields))
    }

    /// Typed GPU view, if this is a GPU snapshot.
    pub fn gpu(&self) -> Option<GpuInformation> {
        (self.subsystem == Subsystem::Gpu).then(|| GpuInformation::from_fields(&self.fields))
    }
}

/// Tunables for a [`Prober`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Retry failed direct reads through the root shell.
    pub privileged_fallback: bool,
    /// Give up waiting on privileged reads after this long.
    pub deadline: Option<Duration>,
    pub temperature_path: String,
    /// GPU base directories to probe, in order.
    pub gpu_base_paths: Vec<String>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            privileged_fallback: true,
            deadline: None,
            temperature_path: paths::PATH_TEMPERATURE.to_string(),
            gpu_base_paths: gpu::DEFAULT_BASE_PATHS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ProbeOptions {
    pub fn with_privileged_fallback(mut self, enabled: bool) -> Self {
        self.privileged_fallback = enabled;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_temperature_path(mut self, path: impl Into<String>) -> Self {
        self.temperature_path = path.into();
        self
    }

    pub fn with_gpu_base_paths(mut self, paths: Vec<String>) -> Self {
        self.gpu_base_paths = paths;
        self
    }
}

/// Acquires hardware snapshots.
///
/// Holds the direct reader and the privileged executor as injected
/// capabilities; share it behind an `Arc` to run acquisitions concurrently.
pub struct Prober {
    reader: Arc<dyn FileReader>,
    privileged: PrivilegedReader,
    options: ProbeOptions,
}

impl Prober {
    pub fn new(reader: Arc<dyn FileReader>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            reader,
            privileged: PrivilegedReader::new(executor),
            options: ProbeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProbeOptions) -> Self {
        self.options = options;
        self
    }

    /// A prober over the real filesystem and a `su` shell.
    pub fn system(shell: ShellConfig) -> Self {
        Self::new(
            Arc::new(SysfsReader::new()),
            Arc::new(RootShell::new(shell)),
        )
    }

    pub fn reader(&self) -> &dyn FileReader {
        self.reader.as_ref()
    }

    pub fn privileged(&self) -> &PrivilegedReader {
        &self.privileged
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    /// Whether failed reads may be retried with privileges right now.
    pub fn privilege_available(&self) -> bool {
        self.options.privileged_fallback && self.privileged.is_available()
    }

    /// Resolves where each field of a subsystem is read from.
    ///
    /// Runs once per snapshot, before any field is read: picks the
    /// representative CPU core and probes the GPU candidate paths.
    pub fn field_specs(&self, subsystem: Subsystem) -> Vec<FieldSpec> {
        match subsystem {
            Subsystem::Cpu => {
                let core_count = self
                    .reader
                    .read(paths::PATH_CPU_PRESENT)
                    .and_then(|content| cpu::parse_core_count(&content))
                    .unwrap_or(INVALID);
                let core = cpu::representative_core(self.reader.as_ref(), core_count);
                cpu::field_specs(core, &self.options.temperature_path)
            }
            Subsystem::Gpu => {
                GpuPaths::resolve(self.reader.as_ref(), &self.options.gpu_base_paths)
                    .field_specs()
            }
        }
    }

    /// Acquires one snapshot.
    pub async fn acquire(&self, subsystem: Subsystem) -> Snapshot {
        let mut fields = FieldSet::new(subsystem, self.field_specs(subsystem));
        self.direct_pass(&mut fields);

        if fields.is_valid() || !self.privilege_available() {
            debug!("{} snapshot resolved after direct pass", subsystem);
            finish(&mut fields);
            return Snapshot {
                subsystem,
                state: AcquisitionState::Resolved,
                escalated: false,
                fields,
            };
        }

        fields.reset_invalid();
        info!("Escalating {} snapshot to privileged reads", subsystem);
        let state = self.privileged_pass(&mut fields).await;
        finish(&mut fields);

        Snapshot {
            subsystem,
            state,
            escalated: true,
            fields,
        }
    }

    /// Acquires one snapshot on the current thread.
    ///
    /// Drives its own single-threaded runtime, so it must not be called from
    /// inside an async context.
    pub fn acquire_blocking(&self, subsystem: Subsystem) -> Snapshot {
        match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.acquire(subsystem)),
            Err(e) => {
                warn!("Failed to start runtime for {} snapshot: {}", subsystem, e);
                let mut fields = FieldSet::new(subsystem, self.field_specs(subsystem));
                self.direct_pass(&mut fields);
                finish(&mut fields);
                let state = if fields.is_valid() || !self.privilege_available() {
                    AcquisitionState::Resolved
                } else {
                    AcquisitionState::Stalled
                };
                Snapshot {
                    subsystem,
                    state,
                    escalated: false,
                    fields,
                }
            }
        }
    }

    /// Acquires a snapshot on a spawned task and publishes it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn acquire_async(
        self: &Arc<Self>,
        subsystem: Subsystem,
        publisher: ResultPublisher<Snapshot>,
    ) -> JoinHandle<()> {
        let prober = Arc::clone(self);
        tokio::spawn(async move {
            let snapshot = prober.acquire(subsystem).await;
            publisher.publish(snapshot);
        })
    }

    /// Reads one file, escalating if the direct read fails.
    pub async fn read_text(&self, path: &str) -> Option<String> {
        if let Some(content) = self.reader.read(path) {
            return Some(content);
        }
        if !self.privilege_available() {
            return None;
        }

        debug!("Escalating read of {}", path);
        match self.options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.privileged.read(path))
                .await
                .ok()
                .flatten(),
            None => self.privileged.read(path).await,
        }
    }

    fn direct_pass(&self, fields: &mut FieldSet) {
        for path in fields.paths() {
            let content = self.reader.read(&path);
            if content.is_none() {
                debug!("Direct read failed: {}", path);
            }
            fields.apply(&path, content.as_deref());
        }
        fields.abandon_pathless();
    }

    async fn privileged_pass(&self, fields: &mut FieldSet) -> AcquisitionState {
        fields.abandon_pathless();
        let deadline = self.options.deadline.map(|d| Instant::now() + d);
        let mut in_flight = FuturesUnordered::new();

        loop {
            for path in fields.unset_paths() {
                match self.privileged.read_async(&path) {
                    Some(read) => {
                        fields.mark_pending(&path);
                        in_flight.push(read);
                    }
                    None => {
                        warn!("Could not issue privileged read for {}", path);
                        return AcquisitionState::Stalled;
                    }
                }
            }

            if !fields.is_initializing() {
                return AcquisitionState::Resolved;
            }

            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, in_flight.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            warn!(
                                "Deadline passed with {} privileged reads pending",
                                in_flight.len()
                            );
                            return AcquisitionState::Stalled;
                        }
                    }
                }
                None => in_flight.next().await,
            };

            match next {
                Some(completion) => {
                    if completion.content.is_none() {
                        debug!("Privileged read failed: {}", completion.path);
                    }
                    fields.apply(&completion.path, completion.content.as_deref());
                }
                None => {
                    warn!("No privileged reads in flight but fields still pending");
                    return AcquisitionState::Stalled;
                }
            }
        }
    }
}

/// Post-processing shared by every exit path.
fn finish(fields: &mut FieldSet) {
    if fields.subsystem() == Subsystem::Cpu {
        cpu::derive_frequency_bounds(fields);
    }
}
