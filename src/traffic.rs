use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Process-wide byte counter shared by every worker
#[derive(Debug, Clone, Default)]
pub struct TrafficAccountant {
    total: Arc<AtomicU64>,
}

impl TrafficAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bytes to the running total
    pub fn add(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Total bytes counted so far
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Human-readable total, e.g. `512B`, `1.5kB`, `2.000mB`
    pub fn snapshot(&self) -> String {
        format_traffic(self.total())
    }
}

/// Format a byte count the way the dashboard header shows it
pub fn format_traffic(bytes: u64) -> String {
    if bytes < KIB {
        format!("{}B", bytes)
    } else if bytes < MIB {
        format!("{:.1}kB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.3}mB", bytes as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_traffic_units() {
        assert_eq!(format_traffic(0), "0B");
        assert_eq!(format_traffic(1023), "1023B");
        assert_eq!(format_traffic(1024), "1.0kB");
        assert_eq!(format_traffic(1536), "1.5kB");
        assert_eq!(format_traffic(MIB - 1), "1024.0kB");
        assert_eq!(format_traffic(MIB), "1.000mB");
        assert_eq!(format_traffic(5 * MIB / 2), "2.500mB");
    }

    #[test]
    fn test_clones_share_total() {
        let accountant = TrafficAccountant::new();
        let clone = accountant.clone();
        accountant.add(100);
        clone.add(24);
        assert_eq!(accountant.total(), 124);
        assert_eq!(clone.snapshot(), "124B");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_not_lost() {
        let accountant = TrafficAccountant::new();
        let mut tasks = tokio::task::JoinSet::new();

        for worker in 0..64u64 {
            let accountant = accountant.clone();
            tasks.spawn(async move {
                for _ in 0..1000 {
                    accountant.add(worker + 1);
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        // 1000 * (1 + 2 + ... + 64)
        assert_eq!(accountant.total(), 1000 * 64 * 65 / 2);
    }
}
