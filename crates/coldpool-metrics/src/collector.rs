//! Metrics collector — derives per-step metrics for a simulation.

use std::collections::VecDeque;

use tracing::trace;

use coldpool_core::{Item, ItemState, Metrics, Millis, Worker, WorkerState};

/// Completed-item latencies kept for percentile computation.
const LATENCY_WINDOW: usize = 1024;

/// Tallies outcomes and derives [`Metrics`] snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsCollector {
    completed: u64,
    failed: u64,
    expired: u64,
    /// Admission-to-completion latencies (ms), oldest first.
    latencies: VecDeque<Millis>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `item` just entered a terminal state.
    ///
    /// Must be called exactly once per terminal transition; other states
    /// are ignored.
    pub fn record_outcome(&mut self, item: &Item) {
        match item.state {
            ItemState::Completed => {
                self.completed += 1;
                if let Some(done) = item.completed_at {
                    if self.latencies.len() == LATENCY_WINDOW {
                        self.latencies.pop_front();
                    }
                    self.latencies.push_back(done.saturating_sub(item.created_at));
                }
            }
            ItemState::Failed => self.failed += 1,
            ItemState::Expired => self.expired += 1,
            _ => return,
        }
        trace!(item = item.id, state = ?item.state, "outcome recorded");
    }

    /// Build the metrics for the current step.
    pub fn snapshot(&self, items: &[Item], workers: &[Worker]) -> Metrics {
        let mut m = Metrics {
            completed: self.completed,
            failed: self.failed,
            expired: self.expired,
            ..Default::default()
        };

        for item in items {
            match item.state {
                ItemState::Queued => m.queued += 1,
                ItemState::WaitingForModel => m.waiting_for_model += 1,
                ItemState::Processing => m.processing += 1,
                ItemState::Delivering => m.delivering += 1,
                _ => {}
            }
        }

        for w in workers {
            match w.state {
                WorkerState::Ready => {
                    m.ready_workers += 1;
                    m.active_workers += 1;
                }
                WorkerState::Busy => m.active_workers += 1,
                WorkerState::Starting => m.starting_workers += 1,
                WorkerState::Stopping => m.stopping_workers += 1,
                WorkerState::Stopped => {}
            }
        }

        let samples: Vec<Millis> = self.latencies.iter().copied().collect();
        let (p50, p99) = compute_percentiles(&samples);
        m.latency_p50_ms = p50;
        m.latency_p99_ms = p99;
        m
    }
}

/// Compute P50 and P99 from latency samples in milliseconds.
///
/// Returns (p50_ms, p99_ms). If empty, returns (0.0, 0.0).
fn compute_percentiles(latencies: &[Millis]) -> (f64, f64) {
    if latencies.is_empty() {
        return (0.0, 0.0);
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();

    let p50_idx = (sorted.len() as f64 * 0.50) as usize;
    let p99_idx = (sorted.len() as f64 * 0.99) as usize;

    let p50 = sorted[p50_idx.min(sorted.len() - 1)] as f64;
    let p99 = sorted[p99_idx.min(sorted.len() - 1)] as f64;

    (p50, p99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldpool_core::Priority;

    fn item(id: u64, state: ItemState) -> Item {
        let mut i = Item::new(id, Priority::Normal, 0);
        i.state = state;
        i
    }

    fn completed(id: u64, created_at: Millis, done: Millis) -> Item {
        let mut i = Item::new(id, Priority::Normal, created_at);
        i.state = ItemState::Completed;
        i.completed_at = Some(done);
        i
    }

    #[test]
    fn gauges_follow_current_items() {
        let c = MetricsCollector::new();
        let items = vec![
            item(0, ItemState::Queued),
            item(1, ItemState::Queued),
            item(2, ItemState::WaitingForModel),
            item(3, ItemState::Processing),
            item(4, ItemState::Delivering),
            item(5, ItemState::Entering),
        ];
        let m = c.snapshot(&items, &[]);
        assert_eq!(m.queued, 2);
        assert_eq!(m.waiting_for_model, 1);
        assert_eq!(m.processing, 1);
        assert_eq!(m.delivering, 1);
    }

    #[test]
    fn worker_counts() {
        let c = MetricsCollector::new();
        let mut busy = Worker::ready(1);
        busy.state = WorkerState::Busy;
        let mut stopping = Worker::ready(3);
        stopping.state = WorkerState::Stopping;
        let workers = vec![Worker::ready(0), busy, Worker::starting(2, 0), stopping];

        let m = c.snapshot(&[], &workers);
        assert_eq!(m.active_workers, 2);
        assert_eq!(m.ready_workers, 1);
        assert_eq!(m.starting_workers, 1);
        assert_eq!(m.stopping_workers, 1);
    }

    #[test]
    fn outcomes_are_cumulative_after_pruning() {
        let mut c = MetricsCollector::new();
        c.record_outcome(&completed(0, 0, 5500));
        c.record_outcome(&item(1, ItemState::Expired));
        c.record_outcome(&item(2, ItemState::Failed));
        // Non-terminal states are ignored.
        c.record_outcome(&item(3, ItemState::Processing));

        // Items already pruned: counters survive.
        let m = c.snapshot(&[], &[]);
        assert_eq!(m.completed, 1);
        assert_eq!(m.expired, 1);
        assert_eq!(m.failed, 1);
    }

    #[test]
    fn latency_percentiles() {
        let mut c = MetricsCollector::new();
        for (id, latency) in (0..100).zip(1..=100) {
            c.record_outcome(&completed(id, 1000, 1000 + latency));
        }
        let m = c.snapshot(&[], &[]);
        assert_eq!(m.latency_p50_ms, 51.0);
        assert_eq!(m.latency_p99_ms, 100.0);
    }

    #[test]
    fn latency_window_is_bounded() {
        let mut c = MetricsCollector::new();
        for id in 0..(LATENCY_WINDOW as u64 + 10) {
            c.record_outcome(&completed(id, 0, 10));
        }
        assert_eq!(c.latencies.len(), LATENCY_WINDOW);
        assert_eq!(c.snapshot(&[], &[]).completed, LATENCY_WINDOW as u64 + 10);
    }

    #[test]
    fn compute_percentiles_empty() {
        assert_eq!(compute_percentiles(&[]), (0.0, 0.0));
    }
}
