use std::time::Duration;

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::{debug, info};

use swarm_core::{
    config::WorkerConfig,
    models::{CapabilityTier, WorkerCapabilities},
    routing::classify,
};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Detect RAM and logical CPU count on this host.
///
/// GPU presence has no portable check, so it is always reported as absent here
/// and must be switched on through configuration.
pub fn detect_capabilities() -> WorkerCapabilities {
    let mut system = System::new_with_specifics(
        RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing())
            .with_memory(MemoryRefreshKind::nothing().with_ram()),
    );
    system.refresh_memory();
    system.refresh_cpu_all();

    let ram_gb = bytes_to_gb(system.total_memory());
    let cpu_cores = system.cpus().len() as u32;
    debug!("Detected {} GB RAM, {} logical CPUs", ram_gb, cpu_cores);

    WorkerCapabilities::new(false, ram_gb, cpu_cores)
}

/// Whole gigabytes, rounded to nearest; a 31.7 GB machine counts as 32.
fn bytes_to_gb(bytes: u64) -> u32 {
    (bytes as f64 / BYTES_PER_GB as f64).round() as u32
}

/// Configuration overrides win over detected values.
pub fn apply_overrides(detected: WorkerCapabilities, config: &WorkerConfig) -> WorkerCapabilities {
    WorkerCapabilities {
        gpu_available: config.gpu_available.unwrap_or(detected.gpu_available),
        ram_gb: config.ram_gb.unwrap_or(detected.ram_gb),
        cpu_cores: config.cpu_cores.unwrap_or(detected.cpu_cores),
    }
}

/// Everything the worker process decides about itself before registering.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerProfile {
    pub worker_id: String,
    pub capabilities: WorkerCapabilities,
    /// Locally predicted tier; the dispatcher's classification is authoritative.
    pub tier: CapabilityTier,
    pub max_tasks: u32,
    pub idle_backoff: Duration,
    pub error_backoff: Duration,
}

impl WorkerProfile {
    pub fn resolve(config: &WorkerConfig, detected: WorkerCapabilities) -> Self {
        let capabilities = apply_overrides(detected, config);
        let tier = classify(&capabilities).tier;

        let worker_id = config
            .worker_id
            .clone()
            .unwrap_or_else(|| default_worker_id(tier, &local_hostname()));
        let max_tasks = config.max_tasks.unwrap_or_else(|| default_max_tasks(tier));
        let idle_backoff = Duration::from_secs(
            config
                .idle_backoff_seconds
                .unwrap_or_else(|| default_idle_backoff_seconds(tier)),
        );

        let profile = Self {
            worker_id,
            capabilities,
            tier,
            max_tasks,
            idle_backoff,
            error_backoff: Duration::from_secs(config.error_backoff_seconds),
        };
        info!(
            "Worker profile: id={}, tier={}, gpu={}, ram={}GB, cores={}, max_tasks={}",
            profile.worker_id,
            profile.tier,
            profile.capabilities.gpu_available,
            profile.capabilities.ram_gb,
            profile.capabilities.cpu_cores,
            profile.max_tasks
        );
        profile
    }
}

pub fn default_worker_id(tier: CapabilityTier, hostname: &str) -> String {
    format!("{}-{}", tier.as_str(), hostname)
}

fn default_max_tasks(tier: CapabilityTier) -> u32 {
    if tier.includes_fast() {
        2
    } else {
        1
    }
}

fn default_idle_backoff_seconds(tier: CapabilityTier) -> u64 {
    match tier {
        CapabilityTier::Fast | CapabilityTier::FastAndDeep => 3,
        CapabilityTier::Balanced => 4,
        CapabilityTier::Deep => 5,
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
