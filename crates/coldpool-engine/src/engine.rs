//! The simulation aggregate and its public operations.

use std::collections::HashSet;

use tracing::{debug, info};

use coldpool_autoscale::{Autoscaler, Demand, ScaleDecision};
use coldpool_core::{
    ConfigPatch, Item, ItemId, ItemState, Metrics, Millis, Priority, SimConfig, SimSnapshot,
    Worker, WorkerId,
};
use coldpool_metrics::MetricsCollector;
use coldpool_pool::WorkerPool;
use coldpool_scheduler::Dispatcher;

use crate::{layout, lifecycle};

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 10.0;

/// An admission scheduled by [`Simulation::add_burst`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingArrival {
    due: Millis,
    priority: Priority,
}

/// One simulated worker tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    config: SimConfig,
    tick: Millis,
    items: Vec<Item>,
    pool: WorkerPool,
    metrics: Metrics,
    collector: MetricsCollector,
    autoscaler: Autoscaler,
    dispatcher: Dispatcher,
    target_workers: usize,
    speed: f64,
    /// Sub-millisecond remainder of scaled deltas not yet on the clock.
    clock_carry: f64,
    paused: bool,
    next_item_id: ItemId,
    /// Sorted by due time, ties in scheduling order.
    pending: Vec<PendingArrival>,
}

impl Simulation {
    /// Create a simulation at tick zero with `min_workers` warm workers.
    pub fn new(config: SimConfig) -> Self {
        let warm = config.effective_min_workers();
        let pool = WorkerPool::seeded(warm);
        let collector = MetricsCollector::new();
        let metrics = collector.snapshot(&[], pool.workers());

        Self {
            config,
            tick: 0,
            items: Vec::new(),
            pool,
            metrics,
            collector,
            autoscaler: Autoscaler::new(0),
            dispatcher: Dispatcher::new(),
            target_workers: warm,
            speed: 1.0,
            clock_carry: 0.0,
            paused: false,
            next_item_id: 0,
            pending: Vec::new(),
        }
    }

    // ── Operations ────────────────────────────────────────────────

    /// Admit one item at the current tick. Never rejects.
    pub fn add_item(&mut self, priority: Priority) -> ItemId {
        let id = self.next_item_id;
        self.next_item_id += 1;
        self.items.push(Item::new(id, priority, self.tick));
        self.autoscaler.record_activity(self.tick);

        if let Some(limit) = self.config.max_queue_size {
            let in_flight = self.items.iter().filter(|i| i.state.is_in_flight()).count();
            if in_flight > limit {
                debug!(item = id, in_flight, limit, "admitted past advisory queue size");
            }
        }
        id
    }

    /// Schedule `count` admissions spaced by `burst_stagger_ms`.
    ///
    /// The first is due at the current tick; all are admitted at the start
    /// of the step in which they fall due.
    pub fn add_burst(&mut self, count: usize, priority: Priority) {
        let stagger = self.config.burst_stagger_ms;
        for k in 0..count as Millis {
            let arrival = PendingArrival {
                due: self.tick + k * stagger,
                priority,
            };
            let at = self.pending.partition_point(|p| p.due <= arrival.due);
            self.pending.insert(at, arrival);
        }
        debug!(count, ?priority, stagger, "burst scheduled");
    }

    /// Run one step, `delta_ms` of caller time scaled by the speed multiplier.
    pub fn advance(&mut self, delta_ms: Millis) {
        if self.paused {
            return;
        }

        self.clock_carry += delta_ms as f64 * self.speed;
        let whole = self.clock_carry.floor();
        self.clock_carry -= whole;
        self.tick += whole as Millis;
        let now = self.tick;
        let capacity = self.config.per_worker_concurrency;
        self.pool.refresh_all(capacity);

        self.admit_due(now);

        let mut report = lifecycle::advance_items(
            &mut self.items,
            &mut self.pool,
            &self.config,
            now,
            &mut self.collector,
        );
        if report.finished_processing > 0 {
            self.autoscaler.record_activity(now);
        }

        let ready = self
            .pool
            .advance(now, self.config.cold_start_time_ms);
        if !ready.is_empty() {
            report.promoted +=
                lifecycle::promote_waiting(&mut self.items, &mut self.pool, &self.config, now);
        }
        if report.promoted > 0 || report.settled > 0 {
            debug!(
                promoted = report.promoted,
                settled = report.settled,
                finished_processing = report.finished_processing,
                workers_ready = ready.len(),
                now,
                "items advanced"
            );
        }

        self.items.retain(|i| i.state != ItemState::Removed);

        self.autoscale(now);

        self.dispatcher
            .dispatch(&mut self.items, &mut self.pool, capacity, now);

        self.metrics = self.collector.snapshot(&self.items, self.pool.workers());
    }

    /// Set the worker target directly, clamped to `[0, max_workers]`.
    ///
    /// Counts as activity, so the idle scale-down clock restarts.
    pub fn set_target_workers(&mut self, n: usize) {
        let target = self.config.clamp_workers(n);
        info!(from = self.target_workers, to = target, "target workers set manually");
        self.target_workers = target;
        self.autoscaler.record_activity(self.tick);
    }

    /// Set the speed multiplier, clamped to `[0.1, 10]`.
    pub fn set_speed(&mut self, multiplier: f64) {
        let multiplier = if multiplier.is_nan() { 1.0 } else { multiplier };
        self.speed = multiplier.clamp(MIN_SPEED, MAX_SPEED);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Flip the paused flag and return the new value.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Return to a freshly constructed engine with the same configuration.
    pub fn reset(&mut self) {
        info!(tick = self.tick, "simulation reset");
        *self = Self::new(self.config.clone());
    }

    /// Merge `patch` into the live configuration; applies from the next step.
    ///
    /// The worker target is re-clamped at once so it never exceeds a
    /// lowered `max_workers`.
    pub fn set_config(&mut self, patch: &ConfigPatch) {
        self.config.apply(patch);
        self.target_workers = self.config.clamp_workers(self.target_workers);
        debug!(?patch, target = self.target_workers, "config updated");
    }

    /// Cloned read-only view of the whole simulation.
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            tick: self.tick,
            items: self.items.clone(),
            workers: self.pool.workers().to_vec(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            target_workers: self.target_workers,
            speed: self.speed,
            paused: self.paused,
        }
    }

    /// Vertical spacing between the workers a renderer shows, i.e. every
    /// worker that is not stopped.
    pub fn worker_spacing(&self) -> f64 {
        layout::worker_spacing(self.pool.counts().running())
    }

    /// Vertical midpoint of the column of workers that are not stopped.
    pub fn centerline(&self) -> f64 {
        layout::centerline(self.pool.counts().running())
    }

    // ── Read access ───────────────────────────────────────────────

    pub fn tick(&self) -> Millis {
        self.tick
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items
            .binary_search_by_key(&id, |i| i.id)
            .ok()
            .map(|idx| &self.items[idx])
    }

    pub fn workers(&self) -> &[Worker] {
        self.pool.workers()
    }

    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.pool.get(id)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn target_workers(&self) -> usize {
        self.target_workers
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Admissions scheduled by bursts that have not fallen due yet.
    pub fn pending_arrivals(&self) -> usize {
        self.pending.len()
    }

    // ── Step phases ───────────────────────────────────────────────

    fn admit_due(&mut self, now: Millis) {
        let due = self.pending.partition_point(|p| p.due <= now);
        if due == 0 {
            return;
        }
        let arrivals: Vec<PendingArrival> = self.pending.drain(..due).collect();
        for arrival in arrivals {
            self.add_item(arrival.priority);
        }
    }

    fn autoscale(&mut self, now: Millis) {
        let demand = Demand::observe(&self.items, &self.pool);
        let decision =
            self.autoscaler
                .evaluate(&demand, &self.config, self.target_workers, now);
        if let ScaleDecision::ScaleTo { target, reason } = decision {
            info!(
                from = self.target_workers,
                to = target,
                ?reason,
                now,
                "target workers changed"
            );
            self.target_workers = target;
        }

        let reserved: HashSet<WorkerId> = self
            .items
            .iter()
            .filter(|i| i.state == ItemState::WaitingForModel)
            .filter_map(|i| i.assigned_worker)
            .collect();
        let reconciled = self.autoscaler.reconcile(
            &mut self.pool,
            self.target_workers,
            &self.config,
            now,
            |id| reserved.contains(&id),
        );
        if !reconciled.is_empty() {
            debug!(
                started = ?reconciled.started,
                stopped = ?reconciled.stopped,
                target = self.target_workers,
                now,
                "pool reconciled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldpool_core::WorkerState;

    fn sim(config: SimConfig) -> Simulation {
        Simulation::new(config)
    }

    #[test]
    fn new_seeds_min_workers_ready() {
        let s = sim(SimConfig {
            min_workers: 2,
            ..Default::default()
        });
        assert_eq!(s.workers().len(), 2);
        assert!(s.workers().iter().all(|w| w.state == WorkerState::Ready));
        assert_eq!(s.target_workers(), 2);
        assert_eq!(s.metrics().ready_workers, 2);
    }

    #[test]
    fn add_item_enters_without_stepping() {
        let mut s = sim(SimConfig::default());
        let id = s.add_item(Priority::High);
        assert_eq!(s.item(id).unwrap().state, ItemState::Entering);
        assert_eq!(s.item(id).unwrap().created_at, 0);
        assert!(s.workers().is_empty());
    }

    #[test]
    fn item_ids_are_sequential() {
        let mut s = sim(SimConfig::default());
        assert_eq!(s.add_item(Priority::Normal), 0);
        assert_eq!(s.add_item(Priority::Normal), 1);
        assert_eq!(s.add_item(Priority::Low), 2);
    }

    #[test]
    fn add_item_ignores_advisory_queue_size() {
        let mut s = sim(SimConfig {
            max_queue_size: Some(1),
            max_workers: 0,
            ..Default::default()
        });
        for _ in 0..5 {
            s.add_item(Priority::Normal);
        }
        s.advance(0);
        assert_eq!(s.metrics().queued, 5);
    }

    #[test]
    fn burst_is_staggered() {
        let mut s = sim(SimConfig {
            max_workers: 0,
            burst_stagger_ms: 100,
            ..Default::default()
        });
        s.add_burst(3, Priority::Normal);
        assert_eq!(s.pending_arrivals(), 3);

        s.advance(0);
        assert_eq!(s.items().len(), 1);
        s.advance(100);
        assert_eq!(s.items().len(), 2);
        s.advance(50);
        assert_eq!(s.items().len(), 2);
        s.advance(50);
        assert_eq!(s.items().len(), 3);
        assert_eq!(s.pending_arrivals(), 0);

        let created: Vec<Millis> = s.items().iter().map(|i| i.created_at).collect();
        assert_eq!(created, vec![0, 100, 200]);
    }

    #[test]
    fn overlapping_bursts_stay_ordered() {
        let mut s = sim(SimConfig {
            max_workers: 0,
            burst_stagger_ms: 100,
            ..Default::default()
        });
        s.add_burst(2, Priority::Low);
        s.add_burst(2, Priority::High);

        s.advance(0);
        let first: Vec<Priority> = s.items().iter().map(|i| i.priority).collect();
        assert_eq!(first, vec![Priority::Low, Priority::High]);
    }

    #[test]
    fn paused_advance_is_a_no_op() {
        let mut s = sim(SimConfig::default());
        s.add_item(Priority::Normal);
        s.set_paused(true);
        let before = s.snapshot();
        s.advance(5000);
        assert_eq!(s.snapshot(), before);
        assert!(!s.toggle_pause());
        s.advance(100);
        assert_eq!(s.tick(), 100);
    }

    #[test]
    fn speed_scales_time_and_is_clamped() {
        let mut s = sim(SimConfig::default());
        s.set_speed(2.5);
        s.advance(100);
        assert_eq!(s.tick(), 250);

        s.set_speed(100.0);
        assert_eq!(s.speed(), MAX_SPEED);
        s.set_speed(0.0);
        assert_eq!(s.speed(), MIN_SPEED);
        s.set_speed(f64::NAN);
        assert_eq!(s.speed(), 1.0);
    }

    #[test]
    fn slow_speed_carries_fractional_time() {
        let mut s = sim(SimConfig::default());
        s.set_speed(0.1);
        for _ in 0..1000 {
            s.advance(4);
        }
        assert!((399..=400).contains(&s.tick()), "tick = {}", s.tick());

        let mut s = sim(SimConfig::default());
        s.set_speed(0.1);
        for _ in 0..1000 {
            s.advance(5);
        }
        assert_eq!(s.tick(), 500);
    }

    #[test]
    fn paused_steps_do_not_accumulate_time() {
        let mut s = sim(SimConfig::default());
        s.set_speed(0.5);
        s.advance(1);
        s.set_paused(true);
        s.advance(1);
        s.set_paused(false);
        assert_eq!(s.tick(), 0);
        s.advance(1);
        assert_eq!(s.tick(), 1);
    }

    #[test]
    fn set_target_workers_clamps_and_reconciles_next_step() {
        let mut s = sim(SimConfig {
            max_workers: 3,
            ..Default::default()
        });
        s.set_target_workers(8);
        assert_eq!(s.target_workers(), 3);
        assert!(s.workers().is_empty());

        s.advance(0);
        assert_eq!(s.metrics().starting_workers, 3);
    }

    #[test]
    fn manual_target_resets_idle_clock() {
        let mut s = sim(SimConfig {
            scale_down_delay_ms: 1000,
            cold_start_time_ms: 100,
            ..Default::default()
        });
        s.advance(5000);
        s.set_target_workers(1);
        s.advance(0);
        s.advance(900);
        assert_eq!(s.target_workers(), 1);
        s.advance(200);
        assert_eq!(s.target_workers(), 0);
    }

    #[test]
    fn set_config_takes_effect_next_step() {
        let mut s = sim(SimConfig::default());
        s.set_config(&ConfigPatch {
            min_workers: Some(2),
            cold_start_time_ms: Some(100),
            ..Default::default()
        });
        assert_eq!(s.config().min_workers, 2);
        assert_eq!(s.config().cold_start_time_ms, 100);
        assert!(s.workers().is_empty());
    }

    #[test]
    fn lowering_max_workers_clamps_target_immediately() {
        let mut s = sim(SimConfig::default());
        s.set_target_workers(8);
        s.set_config(&ConfigPatch {
            max_workers: Some(2),
            ..Default::default()
        });
        assert_eq!(s.target_workers(), 2);
        assert_eq!(s.snapshot().target_workers, 2);
    }

    #[test]
    fn layout_hints_follow_pool_size() {
        let s = sim(SimConfig {
            min_workers: 3,
            ..Default::default()
        });
        assert_eq!(s.worker_spacing(), layout::worker_spacing(3));
        assert_eq!(s.centerline(), layout::centerline(3));
    }

    #[test]
    fn snapshot_serializes() {
        let mut s = sim(SimConfig::default());
        s.add_item(Priority::Normal);
        s.advance(0);
        let json = serde_json::to_string(&s.snapshot()).unwrap();
        assert!(json.contains("\"waiting_for_model\""));
        assert!(json.contains("\"target_workers\":1"));
    }
}
