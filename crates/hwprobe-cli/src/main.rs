//! hwprobe
//!
//! Prints CPU, GPU, kernel, memory and storage facts, escalating to a root
//! shell for anything the current user cannot read.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use hwprobe_core::device::{
    EmmcInfo, IoScheduler, KernelInfo, MemoryInfo, MemoryUnit, ProcessorInfo,
};
use hwprobe_core::{CoreMonitor, Delivery, Prober, Snapshot, Subsystem};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Parser)]
#[command(name = "hwprobe")]
#[command(about = "Inspect CPU, GPU and system hardware attributes")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: config/default.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Never escalate to a root shell
    #[arg(long)]
    no_root: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// CPU frequencies, governors and temperature
    Cpu,
    /// GPU frequencies
    Gpu,
    /// Kernel version string
    Kernel,
    /// Memory totals
    Memory {
        /// Unit: b, kb, mb
        #[arg(long, default_value = "kb")]
        unit: String,
    },
    /// Processor model and features
    Processor,
    /// Block device I/O scheduler
    IoScheduler,
    /// eMMC identity and known firmware bugs
    Emmc,
    /// Sample per-core frequencies periodically
    Monitor {
        /// Sampling interval in milliseconds (default from config)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many samples
        #[arg(long)]
        count: Option<usize>,
    },
    /// Everything except the monitor
    All,
    /// Configuration file commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to a file
    Write {
        /// Output file path
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct SnapshotReport<T: Serialize> {
    state: hwprobe_core::AcquisitionState,
    escalated: bool,
    #[serde(flatten)]
    info: T,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = log_filter(cli.verbose, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)?,
    };
    debug!("Configuration: {:?}", config);

    let mut options = config.probe_options();
    if cli.no_root {
        options = options.with_privileged_fallback(false);
    }
    let prober = Arc::new(Prober::system(config.shell_config()).with_options(options));
    if prober.options().privileged_fallback && !prober.privilege_available() {
        info!("No root shell available, reading as the current user only");
    }

    match cli.command {
        Commands::Cpu => handle_cpu(&prober, cli.json).await,
        Commands::Gpu => handle_gpu(&prober, cli.json).await,
        Commands::Kernel => handle_kernel(&prober, cli.json).await,
        Commands::Memory { unit } => handle_memory(&prober, &unit, cli.json).await,
        Commands::Processor => handle_processor(&prober, cli.json).await,
        Commands::IoScheduler => handle_io_scheduler(&prober, cli.json).await,
        Commands::Emmc => handle_emmc(&prober, cli.json).await,
        Commands::Monitor { interval, count } => {
            let interval = interval
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.monitor_interval());
            handle_monitor(prober, interval, count, cli.json).await
        }
        Commands::All => handle_all(&prober, cli.json).await,
        Commands::Config { action } => handle_config(action, &config),
    }
}

/// `RUST_LOG` directives win over `--verbose` when they parse.
fn log_filter(verbose: bool, directives: Option<String>) -> EnvFilter {
    let level = if verbose { "debug" } else { "warn" };
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

fn report<T: Serialize>(snapshot: &Snapshot, info: T) -> SnapshotReport<T> {
    SnapshotReport {
        state: snapshot.state,
        escalated: snapshot.escalated,
        info,
    }
}

async fn handle_cpu(prober: &Prober, json: bool) -> Result<()> {
    let snapshot = prober.acquire(Subsystem::Cpu).await;
    if json {
        return print_json(&report(&snapshot, snapshot.cpu()));
    }
    print!("{}", output::render_cpu(&snapshot));
    Ok(())
}

async fn handle_gpu(prober: &Prober, json: bool) -> Result<()> {
    let snapshot = prober.acquire(Subsystem::Gpu).await;
    if json {
        return print_json(&report(&snapshot, snapshot.gpu()));
    }
    print!("{}", output::render_gpu(&snapshot));
    Ok(())
}

async fn handle_kernel(prober: &Prober, json: bool) -> Result<()> {
    let info = KernelInfo::read(prober).await;
    if json {
        return print_json(&info);
    }
    print!("{}", output::render_kernel(info.as_ref()));
    Ok(())
}

async fn handle_memory(prober: &Prober, unit: &str, json: bool) -> Result<()> {
    let unit: MemoryUnit = unit.parse()?;
    let info = MemoryInfo::read(prober, unit).await;
    if json {
        return print_json(&info);
    }
    print!("{}", output::render_memory(&info));
    Ok(())
}

async fn handle_processor(prober: &Prober, json: bool) -> Result<()> {
    let info = ProcessorInfo::read(prober).await;
    if json {
        return print_json(&info);
    }
    print!("{}", output::render_processor(info.as_ref()));
    Ok(())
}

async fn handle_io_scheduler(prober: &Prober, json: bool) -> Result<()> {
    let info = IoScheduler::read(prober).await;
    if json {
        return print_json(&info);
    }
    print!("{}", output::render_io_scheduler(info.as_ref()));
    Ok(())
}

async fn handle_emmc(prober: &Prober, json: bool) -> Result<()> {
    let info = EmmcInfo::read(prober).await;
    if json {
        return print_json(&serde_json::json!({
            "emmc": info,
            "bug_impact": info.bug_impact(),
            "can_brick": info.can_brick(),
        }));
    }
    print!("{}", output::render_emmc(&info));
    Ok(())
}

async fn handle_all(prober: &Prober, json: bool) -> Result<()> {
    let (cpu, gpu) = tokio::join!(
        prober.acquire(Subsystem::Cpu),
        prober.acquire(Subsystem::Gpu)
    );
    let kernel = KernelInfo::read(prober).await;
    let memory = MemoryInfo::read(prober, MemoryUnit::default()).await;
    let processor = ProcessorInfo::read(prober).await;
    let io_scheduler = IoScheduler::read(prober).await;
    let emmc = EmmcInfo::read(prober).await;

    if json {
        return print_json(&serde_json::json!({
            "cpu": report(&cpu, cpu.cpu()),
            "gpu": report(&gpu, gpu.gpu()),
            "kernel": kernel,
            "memory": memory,
            "processor": processor,
            "io_scheduler": io_scheduler,
            "emmc": emmc,
        }));
    }

    let sections = [
        output::render_cpu(&cpu),
        output::render_gpu(&gpu),
        output::render_kernel(kernel.as_ref()),
        output::render_memory(&memory),
        output::render_processor(processor.as_ref()),
        output::render_io_scheduler(io_scheduler.as_ref()),
        output::render_emmc(&emmc),
    ];
    println!("{}", sections.join("\n").trim_end());
    Ok(())
}

async fn handle_monitor(
    prober: Arc<Prober>,
    interval: Duration,
    count: Option<usize>,
    json: bool,
) -> Result<()> {
    let monitor = CoreMonitor::new(prober);
    info!(
        "Monitoring {} cores every {}ms",
        monitor.core_count(),
        interval.as_millis()
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = monitor.start(
        interval,
        move |cores| {
            let _ = tx.send(cores);
        },
        Delivery::Inline,
    );

    let mut received = 0;
    loop {
        tokio::select! {
            sample = rx.recv() => {
                let Some(cores) = sample else { break };
                let now = chrono::Local::now();
                if json {
                    print_json(&serde_json::json!({
                        "timestamp": now.to_rfc3339(),
                        "cores": cores,
                    }))?;
                } else {
                    let stamp = now.format("%H:%M:%S").to_string();
                    print!("{}", output::render_cores(&stamp, &cores));
                }
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    handle.join().await;
    Ok(())
}

fn handle_config(action: ConfigCommands, config: &Config) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let text = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            print!("{}", text);
        }
        ConfigCommands::Write { path } => {
            config.save(&path)?;
            println!("Configuration written to: {}", path.display());
        }
    }

    Ok(())
}
