//! Metrics collection for the analysis swarm
//!
//! Counters and gauges are registered through the `metrics` facade. When no
//! recorder is installed every call is a no-op, so tests and embedded setups
//! can use the collector freely.

use anyhow::Result;
use metrics::{counter, gauge, Counter, Gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
pub use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{debug, info};

/// Metrics collector shared by the dispatcher services
pub struct MetricsCollector {
    workers_registered_total: Counter,
    tasks_created_total: Counter,
    tasks_recycled_total: Counter,
    results_merged_total: Counter,
    components_merged_total: Counter,
    components_skipped_total: Counter,
    submissions_rejected_total: Counter,
    tasks_failed_total: Counter,
    tasks_reaped_total: Counter,
    active_workers: Gauge,
    stale_workers: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            workers_registered_total: counter!("swarm_workers_registered_total"),
            tasks_created_total: counter!("swarm_tasks_created_total"),
            tasks_recycled_total: counter!("swarm_tasks_recycled_total"),
            results_merged_total: counter!("swarm_results_merged_total"),
            components_merged_total: counter!("swarm_components_merged_total"),
            components_skipped_total: counter!("swarm_components_skipped_total"),
            submissions_rejected_total: counter!("swarm_submissions_rejected_total"),
            tasks_failed_total: counter!("swarm_tasks_failed_total"),
            tasks_reaped_total: counter!("swarm_tasks_reaped_total"),
            active_workers: gauge!("swarm_active_workers"),
            stale_workers: gauge!("swarm_stale_workers"),
        }
    }

    /// Record a worker registration (new or repeated)
    pub fn record_worker_registered(&self, worker_id: &str, tier: &str) {
        self.workers_registered_total.increment(1);
        debug!(worker_id = worker_id, tier = tier, "Worker registered");
    }

    pub fn record_tasks_created(&self, count: usize) {
        self.tasks_created_total.increment(count as u64);
    }

    pub fn record_tasks_recycled(&self, count: usize) {
        self.tasks_recycled_total.increment(count as u64);
    }

    /// Record a merged submission and how many components it wrote or skipped
    pub fn record_result_merged(&self, merged: usize, skipped: usize) {
        self.results_merged_total.increment(1);
        self.components_merged_total.increment(merged as u64);
        self.components_skipped_total.increment(skipped as u64);
    }

    pub fn record_submission_rejected(&self, reason: &str) {
        self.submissions_rejected_total.increment(1);
        debug!(reason = reason, "Submission rejected");
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed_total.increment(1);
    }

    pub fn record_tasks_reaped(&self, count: usize) {
        self.tasks_reaped_total.increment(count as u64);
    }

    pub fn update_worker_gauges(&self, active: u64, stale: u64) {
        self.active_workers.set(active as f64);
        self.stale_workers.set(stale as f64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global Prometheus recorder and return a handle for rendering
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))?;

    info!("Prometheus metrics recorder installed");
    Ok(handle)
}
