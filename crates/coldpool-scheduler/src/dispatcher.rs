//! Dispatcher — assigns queued items to workers.
//!
//! Warm capacity is always preferred: items first go to ready/busy workers
//! with spare slots, and only the remainder reserve a place on a worker
//! that is still cold-starting.

use tracing::debug;

use coldpool_core::{Item, ItemId, ItemState, Millis, WorkerId, WorkerState};
use coldpool_pool::WorkerPool;

use crate::load_balancer::RoundRobinBalancer;

/// Assignments made by one dispatch call, in assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Items that claimed a slot on a warm worker.
    pub processing: Vec<(ItemId, WorkerId)>,
    /// Items that reserved a cold-starting worker.
    pub waiting: Vec<(ItemId, WorkerId)>,
}

impl DispatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty() && self.waiting.is_empty()
    }
}

/// Stateful dispatcher: one persistent cursor per pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatcher {
    ready_cursor: RoundRobinBalancer,
    starting_cursor: RoundRobinBalancer,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run both dispatch passes over `items`.
    ///
    /// `capacity` is the per-worker concurrency limit.
    pub fn dispatch(
        &mut self,
        items: &mut [Item],
        pool: &mut WorkerPool,
        capacity: usize,
        now: Millis,
    ) -> DispatchOutcome {
        let mut queue: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.state == ItemState::Queued)
            .map(|(idx, _)| idx)
            .collect();
        if queue.is_empty() {
            return DispatchOutcome::default();
        }
        queue.sort_by_key(|&idx| items[idx].order_key());

        let mut outcome = DispatchOutcome::default();
        let placed = self.ready_pass(&queue, items, pool, capacity, now, &mut outcome);
        self.starting_pass(&queue[placed..], items, pool, now, &mut outcome);

        if !outcome.is_empty() {
            debug!(
                processing = outcome.processing.len(),
                waiting = outcome.waiting.len(),
                still_queued = queue.len() - outcome.processing.len() - outcome.waiting.len(),
                "dispatched"
            );
        }
        outcome
    }

    /// Pass 1. Returns how many items from the head of `queue` were placed.
    ///
    /// Stops at the first item no worker has room for, so a later item
    /// never overtakes an earlier one within the pass.
    fn ready_pass(
        &mut self,
        queue: &[usize],
        items: &mut [Item],
        pool: &mut WorkerPool,
        capacity: usize,
        now: Millis,
        outcome: &mut DispatchOutcome,
    ) -> usize {
        let candidates: Vec<WorkerId> = pool
            .workers()
            .iter()
            .filter(|w| w.state.is_active() && w.has_room(capacity))
            .map(|w| w.id)
            .collect();
        if candidates.is_empty() {
            return 0;
        }

        let mut placed = 0;
        for &idx in queue {
            let chosen = self.ready_cursor.rotation(candidates.len()).find(|&k| {
                pool.get(candidates[k])
                    .is_some_and(|w| w.has_room(capacity))
            });
            let Some(k) = chosen else {
                break;
            };

            let worker = candidates[k];
            let item = &mut items[idx];
            if !pool.claim(worker, item.id, capacity) {
                break;
            }
            item.state = ItemState::Processing;
            item.picked_at.get_or_insert(now);
            item.processing_started_at.get_or_insert(now);
            item.assigned_worker = Some(worker);
            outcome.processing.push((item.id, worker));

            self.ready_cursor.advance_past(k);
            placed += 1;
        }
        placed
    }

    /// Pass 2: spread the remaining items across cold-starting workers.
    fn starting_pass(
        &mut self,
        remaining: &[usize],
        items: &mut [Item],
        pool: &WorkerPool,
        now: Millis,
        outcome: &mut DispatchOutcome,
    ) {
        let starting = pool.ids_in(WorkerState::Starting);
        if starting.is_empty() || remaining.is_empty() {
            return;
        }

        let cap = remaining.len().div_ceil(starting.len()) + 1;
        let mut loads: Vec<usize> = starting
            .iter()
            .map(|&id| {
                items
                    .iter()
                    .filter(|i| {
                        i.state == ItemState::WaitingForModel && i.assigned_worker == Some(id)
                    })
                    .count()
            })
            .collect();

        for &idx in remaining {
            let Some(k) = self
                .starting_cursor
                .rotation(starting.len())
                .find(|&k| loads[k] < cap)
            else {
                break;
            };

            let worker = starting[k];
            let item = &mut items[idx];
            item.state = ItemState::WaitingForModel;
            item.picked_at.get_or_insert(now);
            item.assigned_worker = Some(worker);
            outcome.waiting.push((item.id, worker));

            loads[k] += 1;
            self.starting_cursor.advance_past(k);
        }
    }
}
