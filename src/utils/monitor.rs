use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ProcessStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: f64,
    pub peak_memory_mb: f64,
    pub elapsed_time: Duration,
}

/// Resident memory tracking for a process other than ourselves.
pub struct ProcessMonitor {
    system: System,
    pid: Pid,
    start_time: Instant,
    baseline_mb: Option<f64>,
    peak_memory_mb: f64,
}

impl ProcessMonitor {
    pub fn new(pid: u32) -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
            start_time: Instant::now(),
            baseline_mb: None,
            peak_memory_mb: 0.0,
        }
    }

    /// Takes a sample; the first successful one becomes the baseline.
    pub fn sample(&mut self) -> Option<ProcessStats> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );

        let process = self.system.process(self.pid)?;
        let memory_mb = process.memory() as f64 / 1024.0 / 1024.0;

        if self.baseline_mb.is_none() {
            self.baseline_mb = Some(memory_mb);
        }
        if memory_mb > self.peak_memory_mb {
            self.peak_memory_mb = memory_mb;
        }

        Some(ProcessStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: self.peak_memory_mb,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    /// Memory growth in MB since the baseline sample.
    pub fn growth_mb(&mut self) -> Option<f64> {
        let baseline = self.baseline_mb?;
        let current = self.sample()?;
        Some(current.memory_usage_mb - baseline)
    }

    pub fn log_stats(&mut self, phase: &str) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "{} - CPU: {:.1}%, Memory: {:.2}MB, Peak: {:.2}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }
}
