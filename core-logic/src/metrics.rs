//! Process-wide task and RPC counters, exportable as JSON.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Lock-free count/sum/min/max over millisecond samples.
#[derive(Debug)]
struct Timing {
    count: AtomicU64,
    sum_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_ms: AtomicU64::new(0),
            min_ms: AtomicU64::new(u64::MAX),
            max_ms: AtomicU64::new(0),
        }
    }
}

impl Timing {
    fn record(&self, sample: Duration) {
        let ms = sample.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    fn summary(&self) -> TimingSummary {
        let count = self.count.load(Ordering::Relaxed);
        let sum_ms = self.sum_ms.load(Ordering::Relaxed);
        let min_ms = self.min_ms.load(Ordering::Relaxed);
        TimingSummary {
            count,
            total_ms: sum_ms,
            avg_ms: if count == 0 {
                0.0
            } else {
                sum_ms as f64 / count as f64
            },
            min_ms: if min_ms == u64::MAX { 0 } else { min_ms },
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingSummary {
    pub count: u64,
    pub total_ms: u64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskCounts {
    pub success: u64,
    pub failed: u64,
}

impl TaskCounts {
    pub fn total(&self) -> u64 {
        self.success + self.failed
    }

    /// Percentage, 0.0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.success as f64 / n as f64 * 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub tasks: TaskCounts,
    pub success_rate: f64,
    pub by_task: BTreeMap<String, TaskCounts>,
    pub task_duration: TimingSummary,
    pub rpc_latency: TimingSummary,
}

#[derive(Debug)]
pub struct MetricsCollector {
    by_task: Mutex<BTreeMap<String, TaskCounts>>,
    task_duration: Timing,
    rpc_latency: Timing,
    started: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            by_task: Mutex::new(BTreeMap::new()),
            task_duration: Timing::default(),
            rpc_latency: Timing::default(),
            started: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<MetricsCollector> = OnceLock::new();
        INSTANCE.get_or_init(MetricsCollector::default)
    }

    pub fn record_task(&self, name: &str, duration: Duration, success: bool) {
        self.task_duration.record(duration);
        if let Ok(mut by_task) = self.by_task.lock() {
            let counts = by_task.entry(name.to_string()).or_default();
            if success {
                counts.success += 1;
            } else {
                counts.failed += 1;
            }
        }
    }

    pub fn record_rpc_latency(&self, latency: Duration) {
        self.rpc_latency.record(latency);
    }

    /// Totals across every task name.
    pub fn totals(&self) -> TaskCounts {
        self.by_task
            .lock()
            .map(|m| {
                m.values().fold(TaskCounts::default(), |acc, c| TaskCounts {
                    success: acc.success + c.success,
                    failed: acc.failed + c.failed,
                })
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_task = self
            .by_task
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default();
        let tasks = self.totals();

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.started.elapsed().as_secs(),
            success_rate: tasks.success_rate(),
            tasks,
            by_task,
            task_duration: self.task_duration.summary(),
            rpc_latency: self.rpc_latency.summary(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        tokio::fs::write(path, self.to_json()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_task() {
        let metrics = MetricsCollector::default();
        metrics.record_task("bean", Duration::from_millis(100), true);
        metrics.record_task("bean", Duration::from_millis(200), true);
        metrics.record_task("magma", Duration::from_millis(150), false);

        let totals = metrics.totals();
        assert_eq!(totals.total(), 3);
        assert_eq!(totals.failed, 1);

        let snapshot = metrics.snapshot();
        assert!((snapshot.success_rate - 66.67).abs() < 0.1);
        assert_eq!(snapshot.by_task["bean"].success, 2);
        assert_eq!(snapshot.by_task["magma"].failed, 1);
        assert_eq!(snapshot.task_duration.min_ms, 100);
        assert_eq!(snapshot.task_duration.max_ms, 200);
    }

    #[test]
    fn test_empty_summary_has_zero_min() {
        let snapshot = MetricsCollector::default().snapshot();
        assert_eq!(snapshot.rpc_latency.min_ms, 0);
        assert_eq!(snapshot.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_json_export() {
        let metrics = MetricsCollector::default();
        metrics.record_task("pandaria", Duration::from_millis(100), true);
        metrics.record_rpc_latency(Duration::from_millis(40));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        metrics.export_to_file(path.to_str().unwrap()).await.unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("pandaria"));
        assert!(json.contains("\"rpc_latency\""));
        assert!(json.contains("\"avg_ms\": 40.0"));
    }
}
