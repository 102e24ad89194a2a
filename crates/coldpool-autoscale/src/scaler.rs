//! Autoscaler — demand-driven worker scaling.
//!
//! Reads a [`Demand`] observation of the current step, compares it against
//! the pool's capacity, and emits scaling decisions. Applying a target to
//! the pool is a separate step, [`Autoscaler::reconcile`].

use tracing::debug;

use coldpool_core::{Item, ItemState, Millis, SimConfig, WorkerId};
use coldpool_pool::WorkerPool;

/// Why the target changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleReason {
    /// Demand exceeded the capacity of running and starting workers.
    Burst,
    /// Work arrived while no worker was running at all.
    FromZero,
    /// The pool has been idle for longer than the scale-down delay.
    Idle,
    /// The previous target no longer fits under `max_workers`.
    Clamp,
}

/// A scaling decision for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Move the target to the given worker count.
    ScaleTo { target: usize, reason: ScaleReason },
    /// No change needed.
    NoChange,
}

/// What the autoscaler sees of one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Demand {
    /// Queued plus waiting on a starting worker.
    pub waiting: usize,
    pub processing: usize,
    /// Every item not yet completed, failed, expired or removed.
    pub in_flight: usize,
    /// Ready plus busy workers.
    pub active: usize,
    pub busy: usize,
    pub starting: usize,
    /// Every worker that is not stopped.
    pub running: usize,
}

impl Demand {
    /// Observe the current items and pool.
    pub fn observe(items: &[Item], pool: &WorkerPool) -> Self {
        let mut demand = Self::default();
        for item in items {
            if item.state.is_waiting() {
                demand.waiting += 1;
            } else if item.state == ItemState::Processing {
                demand.processing += 1;
            }
            if item.state.is_in_flight() {
                demand.in_flight += 1;
            }
        }

        let counts = pool.counts();
        demand.active = counts.active();
        demand.busy = counts.busy;
        demand.starting = counts.starting;
        demand.running = counts.running();
        demand
    }

    /// Items that want a worker slot right now.
    pub fn total(&self) -> usize {
        self.waiting + self.processing
    }
}

/// Workers touched by one reconcile call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub started: Vec<WorkerId>,
    pub stopped: Vec<WorkerId>,
}

impl Reconciled {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// The autoscaler tracks when the simulation last saw activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Autoscaler {
    last_activity: Millis,
}

impl Autoscaler {
    /// Create a new autoscaler whose idle clock starts at `now`.
    pub fn new(now: Millis) -> Self {
        Self { last_activity: now }
    }

    /// Note admission, a finished processing phase, or a manual target.
    pub fn record_activity(&mut self, now: Millis) {
        self.last_activity = self.last_activity.max(now);
    }

    pub fn last_activity(&self) -> Millis {
        self.last_activity
    }

    /// Evaluate one step and return a scaling decision.
    ///
    /// Scale-up is monotonic: while demand persists the target is only ever
    /// raised, never lowered mid-burst.
    pub fn evaluate(
        &self,
        demand: &Demand,
        config: &SimConfig,
        current_target: usize,
        now: Millis,
    ) -> ScaleDecision {
        let max = config.max_workers;
        let min = config.effective_min_workers();
        let per_worker = config.concurrency_target.max(1);

        let mut target = current_target;
        let mut reason = ScaleReason::Clamp;

        // Scale up: demand exceeds what running and starting workers can take.
        let provisioned = demand.active + demand.starting;
        let capacity = provisioned * per_worker;
        if demand.total() > capacity && provisioned < max {
            let needed = demand.total().div_ceil(per_worker).min(max);
            if needed > target {
                target = needed;
                reason = ScaleReason::Burst;
            }
        }

        // Scale from zero regardless of the ratio math above.
        if demand.total() > 0 && demand.running == 0 {
            let floor = min.max(1).min(max);
            if target < floor {
                target = floor;
                reason = ScaleReason::FromZero;
            }
        }

        // Scale down after a sustained idle period.
        let idle_for = now.saturating_sub(self.last_activity);
        if demand.busy == 0
            && demand.starting == 0
            && demand.in_flight == 0
            && idle_for > config.scale_down_delay_ms
            && target != min
        {
            target = min;
            reason = ScaleReason::Idle;
        }

        let target = target.min(max);
        if target == current_target {
            return ScaleDecision::NoChange;
        }

        debug!(
            from = current_target,
            to = target,
            ?reason,
            waiting = demand.waiting,
            processing = demand.processing,
            capacity,
            "scale decision"
        );
        ScaleDecision::ScaleTo { target, reason }
    }

    /// Move the pool toward `target`.
    ///
    /// Grows by restarting stopped workers first, then new identities, until
    /// the target or `max_workers` is reached. Shrinks by stopping idle ready
    /// workers; `reserved` marks workers that still have items waiting on
    /// them and must not be stopped. Busy and starting workers are never
    /// stopped.
    pub fn reconcile(
        &self,
        pool: &mut WorkerPool,
        target: usize,
        config: &SimConfig,
        now: Millis,
        reserved: impl Fn(WorkerId) -> bool,
    ) -> Reconciled {
        let mut out = Reconciled::default();

        while provisioned(pool) < target {
            match pool.start_one(now, config.max_workers) {
                Some(id) => out.started.push(id),
                None => break,
            }
        }

        while provisioned(pool) > target {
            match pool.stop_one_idle(now, &reserved) {
                Some(id) => out.stopped.push(id),
                None => break,
            }
        }

        out
    }
}

/// Workers that are, or will soon be, able to take work.
fn provisioned(pool: &WorkerPool) -> usize {
    let counts = pool.counts();
    counts.active() + counts.starting
}
