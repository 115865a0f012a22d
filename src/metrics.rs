//! Prometheus-compatible job metrics

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::JobStage;

/// Job metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Server start time
    start_time: Instant,
    jobs_started: RwLock<u64>,
    jobs_succeeded: RwLock<u64>,
    /// Failed jobs by the stage they stopped in
    jobs_failed: RwLock<HashMap<JobStage, u64>>,
    /// Wall-clock seconds spent in successful jobs
    processing_seconds: RwLock<f64>,
    /// Outputs served through the download route
    downloads: RwLock<u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            jobs_started: RwLock::new(0),
            jobs_succeeded: RwLock::new(0),
            jobs_failed: RwLock::new(HashMap::new()),
            processing_seconds: RwLock::new(0.0),
            downloads: RwLock::new(0),
        }
    }

    pub fn record_job_started(&self) {
        *self.jobs_started.write() += 1;
    }

    pub fn record_job_succeeded(&self, elapsed: Duration) {
        *self.jobs_succeeded.write() += 1;
        *self.processing_seconds.write() += elapsed.as_secs_f64();
    }

    pub fn record_job_failed(&self, stage: JobStage) {
        *self.jobs_failed.write().entry(stage).or_insert(0) += 1;
    }

    pub fn record_download(&self) {
        *self.downloads.write() += 1;
    }

    pub fn jobs_started(&self) -> u64 {
        *self.jobs_started.read()
    }

    pub fn jobs_succeeded(&self) -> u64 {
        *self.jobs_succeeded.read()
    }

    pub fn jobs_failed(&self, stage: JobStage) -> u64 {
        self.jobs_failed.read().get(&stage).copied().unwrap_or(0)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP caption_server_uptime_seconds Server uptime in seconds\n");
        output.push_str("# TYPE caption_server_uptime_seconds counter\n");
        output.push_str(&format!(
            "caption_server_uptime_seconds {}\n",
            self.uptime_secs()
        ));

        output.push_str("\n# HELP caption_jobs_started_total Jobs accepted for processing\n");
        output.push_str("# TYPE caption_jobs_started_total counter\n");
        output.push_str(&format!(
            "caption_jobs_started_total {}\n",
            self.jobs_started()
        ));

        output.push_str("\n# HELP caption_jobs_succeeded_total Jobs that produced a video\n");
        output.push_str("# TYPE caption_jobs_succeeded_total counter\n");
        output.push_str(&format!(
            "caption_jobs_succeeded_total {}\n",
            self.jobs_succeeded()
        ));

        // Every stage is listed so absent series read as zero
        output.push_str("\n# HELP caption_jobs_failed_total Failed jobs by stage\n");
        output.push_str("# TYPE caption_jobs_failed_total counter\n");
        let failed = self.jobs_failed.read();
        for stage in JobStage::ALL {
            output.push_str(&format!(
                "caption_jobs_failed_total{{stage=\"{}\"}} {}\n",
                stage,
                failed.get(&stage).copied().unwrap_or(0)
            ));
        }
        drop(failed);

        output.push_str(
            "\n# HELP caption_processing_seconds_total Time spent in successful jobs\n",
        );
        output.push_str("# TYPE caption_processing_seconds_total counter\n");
        output.push_str(&format!(
            "caption_processing_seconds_total {:.3}\n",
            *self.processing_seconds.read()
        ));

        output.push_str("\n# HELP caption_downloads_total Captioned videos served\n");
        output.push_str("# TYPE caption_downloads_total counter\n");
        output.push_str(&format!(
            "caption_downloads_total {}\n",
            *self.downloads.read()
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
