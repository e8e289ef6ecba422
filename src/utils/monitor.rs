use serde::Serialize;
use std::time::Duration;

/// Process resource usage at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub uptime: Duration,
}

#[cfg(feature = "cli")]
mod imp {
    use super::SystemStats;
    use std::sync::Mutex;
    use std::time::Instant;
    use sysinfo::{Pid, ProcessesToUpdate, System};

    pub struct SystemMonitor {
        system: Mutex<System>,
        pid: Option<Pid>,
        started_at: Instant,
        peak_memory_mb: Mutex<u64>,
        enabled: bool,
    }

    impl SystemMonitor {
        pub fn new(enabled: bool) -> Self {
            let pid = sysinfo::get_current_pid().ok();
            if pid.is_none() {
                tracing::warn!("Unable to resolve current PID, system stats disabled");
            }

            Self {
                system: Mutex::new(System::new()),
                pid,
                started_at: Instant::now(),
                peak_memory_mb: Mutex::new(0),
                enabled: enabled && pid.is_some(),
            }
        }

        pub fn snapshot(&self) -> Option<SystemStats> {
            if !self.enabled {
                return None;
            }
            let pid = self.pid?;

            let mut system = self.system.lock().ok()?;
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            let process = system.process(pid)?;
            let memory_mb = process.memory() / 1024 / 1024;

            let mut peak = self.peak_memory_mb.lock().ok()?;
            *peak = (*peak).max(memory_mb);

            Some(SystemStats {
                cpu_usage: process.cpu_usage(),
                memory_usage_mb: memory_mb,
                peak_memory_mb: *peak,
                uptime: self.started_at.elapsed(),
            })
        }

        pub fn is_enabled(&self) -> bool {
            self.enabled
        }
    }
}

// No sysinfo outside the CLI build.
#[cfg(not(feature = "cli"))]
mod imp {
    use super::SystemStats;

    pub struct SystemMonitor;

    impl SystemMonitor {
        pub fn new(_enabled: bool) -> Self {
            Self
        }

        pub fn snapshot(&self) -> Option<SystemStats> {
            None
        }

        pub fn is_enabled(&self) -> bool {
            false
        }
    }
}

pub use imp::SystemMonitor;

impl SystemMonitor {
    pub fn log_phase(&self, phase: &str) {
        if let Some(stats) = self.snapshot() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Uptime: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.uptime
            );
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_has_no_stats() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.snapshot().is_none());
    }
}
