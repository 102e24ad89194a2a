//! Worker pool — manages the set of workers for one simulation.
//!
//! Supports min/max sizing, identity reuse on restart, and capacity
//! accounting (claim/release) per worker.

use tracing::{debug, trace};

use coldpool_core::config::STOP_FADE_MS;
use coldpool_core::{ItemId, Millis, Worker, WorkerId, WorkerState};

/// Per-state worker counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounts {
    pub stopped: usize,
    pub starting: usize,
    pub ready: usize,
    pub busy: usize,
    pub stopping: usize,
}

impl PoolCounts {
    /// Ready plus busy.
    pub fn active(&self) -> usize {
        self.ready + self.busy
    }

    /// Every worker that is not stopped.
    pub fn running(&self) -> usize {
        self.starting + self.ready + self.busy + self.stopping
    }
}

/// The workers of a simulation, kept sorted by identity.
///
/// Identities are handed out sequentially and a stopped worker is always
/// restarted before a new identity is created, so the number of
/// identities never exceeds the largest `max_workers` the pool has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerPool {
    workers: Vec<Worker>,
    next_id: WorkerId,
}

impl WorkerPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool pre-warmed with `count` ready workers.
    pub fn seeded(count: usize) -> Self {
        let mut pool = Self::new();
        for _ in 0..count {
            let id = pool.allocate_id();
            pool.workers.push(Worker::ready(id));
        }
        if count > 0 {
            debug!(workers = count, "worker pool seeded");
        }
        pool
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn get(&self, id: WorkerId) -> Option<&Worker> {
        self.workers
            .binary_search_by_key(&id, |w| w.id)
            .ok()
            .map(|idx| &self.workers[idx])
    }

    fn get_mut(&mut self, id: WorkerId) -> Option<&mut Worker> {
        self.workers
            .binary_search_by_key(&id, |w| w.id)
            .ok()
            .map(|idx| &mut self.workers[idx])
    }

    pub fn counts(&self) -> PoolCounts {
        let mut counts = PoolCounts::default();
        for w in &self.workers {
            match w.state {
                WorkerState::Stopped => counts.stopped += 1,
                WorkerState::Starting => counts.starting += 1,
                WorkerState::Ready => counts.ready += 1,
                WorkerState::Busy => counts.busy += 1,
                WorkerState::Stopping => counts.stopping += 1,
            }
        }
        counts
    }

    /// Ids of workers in `state`, ascending.
    pub fn ids_in(&self, state: WorkerState) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|w| w.state == state)
            .map(|w| w.id)
            .collect()
    }

    fn allocate_id(&mut self) -> WorkerId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Put one more worker into cold start.
    ///
    /// Restarts the lowest-numbered stopped worker if there is one,
    /// otherwise creates a new identity. Returns `None` when the running
    /// count has already reached `max_workers`.
    pub fn start_one(&mut self, now: Millis, max_workers: usize) -> Option<WorkerId> {
        if self.counts().running() >= max_workers {
            debug!(max = max_workers, "pool at capacity, cannot start worker");
            return None;
        }

        if let Some(worker) = self
            .workers
            .iter_mut()
            .find(|w| w.state == WorkerState::Stopped)
        {
            *worker = Worker::starting(worker.id, now);
            debug!(worker = worker.id, "restarting stopped worker");
            return Some(worker.id);
        }

        let id = self.allocate_id();
        self.workers.push(Worker::starting(id, now));
        debug!(worker = id, "created new worker");
        Some(id)
    }

    /// Move one idle worker into `stopping`.
    ///
    /// Only `ready` workers with no claimed items are eligible; `reserved`
    /// lets the caller veto workers that still have items waiting on them.
    /// The highest-numbered eligible worker is chosen.
    pub fn stop_one_idle(
        &mut self,
        now: Millis,
        reserved: impl Fn(WorkerId) -> bool,
    ) -> Option<WorkerId> {
        let worker = self
            .workers
            .iter_mut()
            .rev()
            .find(|w| w.is_idle() && !reserved(w.id))?;
        worker.state = WorkerState::Stopping;
        worker.stopping_at = Some(now);
        debug!(worker = worker.id, "stopping idle worker");
        Some(worker.id)
    }

    /// Advance worker timers to `now`.
    ///
    /// Returns the ids of workers that finished cold start during this call,
    /// ascending.
    pub fn advance(&mut self, now: Millis, cold_start_ms: Millis) -> Vec<WorkerId> {
        let mut became_ready = Vec::new();

        for worker in &mut self.workers {
            match worker.state {
                WorkerState::Starting => {
                    let started = worker.starting_at.unwrap_or(now);
                    if now.saturating_sub(started) >= cold_start_ms {
                        worker.state = WorkerState::Ready;
                        worker.starting_at = None;
                        debug!(worker = worker.id, now, "worker ready");
                        became_ready.push(worker.id);
                    }
                }
                WorkerState::Stopping => {
                    let stopping = worker.stopping_at.unwrap_or(now);
                    if now.saturating_sub(stopping) >= STOP_FADE_MS {
                        worker.state = WorkerState::Stopped;
                        worker.stopping_at = None;
                        debug!(worker = worker.id, now, "worker stopped");
                    }
                }
                WorkerState::Stopped | WorkerState::Ready | WorkerState::Busy => {}
            }
        }

        became_ready
    }

    /// Claim a capacity slot on `worker` for `item`.
    ///
    /// Returns `false` (and changes nothing) if the worker is missing, not
    /// ready/busy, or full.
    pub fn claim(&mut self, worker: WorkerId, item: ItemId, capacity: usize) -> bool {
        let Some(w) = self.get_mut(worker) else {
            return false;
        };
        if !w.has_room(capacity) {
            return false;
        }
        w.current_item_ids.push(item);
        refresh_busy(w, capacity);
        trace!(worker, item, claimed = w.current_item_ids.len(), "slot claimed");
        true
    }

    /// Release the slot `item` holds on `worker`, if any.
    pub fn release(&mut self, worker: WorkerId, item: ItemId, capacity: usize) -> bool {
        let Some(w) = self.get_mut(worker) else {
            return false;
        };
        let Some(pos) = w.current_item_ids.iter().position(|&id| id == item) else {
            return false;
        };
        w.current_item_ids.remove(pos);
        refresh_busy(w, capacity);
        trace!(worker, item, claimed = w.current_item_ids.len(), "slot released");
        true
    }

    /// Recompute ready/busy for every active worker, e.g. after the
    /// concurrency limit changed.
    pub fn refresh_all(&mut self, capacity: usize) {
        for w in &mut self.workers {
            refresh_busy(w, capacity);
        }
    }
}

fn refresh_busy(worker: &mut Worker, capacity: usize) {
    if worker.state.is_active() {
        worker.state = if worker.current_item_ids.len() >= capacity {
            WorkerState::Busy
        } else {
            WorkerState::Ready
        };
    }
}
