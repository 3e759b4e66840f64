//! Process-level information reported by `/stats` and `/api/stats`.

use std::time::{Duration, Instant};

/// Source of process uptime and memory figures.
pub trait ProcessInfo: Send + Sync {
    /// Time since the process started serving.
    fn uptime(&self) -> Duration;

    /// Resident memory in bytes, if the platform exposes it.
    fn memory_bytes(&self) -> Option<u64>;
}

/// Process information for the running server.
#[derive(Debug, Clone)]
pub struct SystemProcess {
    started: Instant,
}

impl SystemProcess {
    /// Create a new instance; uptime is measured from now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInfo for SystemProcess {
    fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    fn memory_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

/// Extract `VmRSS` (reported in kB) from a `/proc/<pid>/status` dump.
fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// Format an uptime as `{h}h {m}m`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

/// Format a byte count as whole megabytes.
pub fn format_memory(bytes: Option<u64>) -> String {
    match bytes {
        Some(bytes) => format!("{}MB", (bytes as f64 / 1024.0 / 1024.0).round() as u64),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tparlor\nVmPeak:\t  20000 kB\nVmRSS:\t   2048 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(2048 * 1024));
    }

    #[test]
    fn test_parse_vm_rss_missing() {
        assert_eq!(parse_vm_rss("Name:\tparlor\n"), None);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0h 0m");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 25 * 60 + 59)), "3h 25m");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(Some(5 * 1024 * 1024)), "5MB");
        assert_eq!(format_memory(None), "unknown");
    }

    #[test]
    fn test_system_process_uptime_monotonic() {
        let process = SystemProcess::new();
        let first = process.uptime();
        assert!(process.uptime() >= first);
    }
}
