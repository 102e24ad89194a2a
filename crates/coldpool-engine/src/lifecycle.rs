//! Item lifecycle driver.
//!
//! Every item state has exactly one rule deciding whether it moves on at
//! `now` ([`next_state`]) and one place applying the side effects of the
//! move ([`enter`]). Rules chain within a step, so a large time delta
//! settles an item as far as its timers allow.
//!
//! Promotion from `waiting_for_model` to `processing` is not a per-item
//! rule: it depends on which items compete for the same worker, so it is
//! handled by [`promote_waiting`] in priority order.

use tracing::trace;

use coldpool_core::{Item, ItemState, Millis, SimConfig};
use coldpool_metrics::MetricsCollector;
use coldpool_pool::WorkerPool;

/// What the driver observed during one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Items that finished processing and released their slot.
    pub finished_processing: usize,
    /// Items promoted from waiting to processing.
    pub promoted: usize,
    /// Items that reached completed, failed or expired.
    pub settled: usize,
}

/// Advance every item to `now`, then let waiting items claim free slots.
pub fn advance_items(
    items: &mut [Item],
    pool: &mut WorkerPool,
    config: &SimConfig,
    now: Millis,
    collector: &mut MetricsCollector,
) -> DriverReport {
    let mut report = DriverReport::default();

    for item in items.iter_mut() {
        while let Some(next) = next_state(item, config, now) {
            enter(item, next, pool, config, now, &mut report);
            if next.is_terminal() && next != ItemState::Removed {
                collector.record_outcome(item);
            }
        }
    }

    report.promoted += promote_waiting(items, pool, config, now);
    report
}

/// The state `item` moves to at `now`, if any.
pub fn next_state(item: &Item, config: &SimConfig, now: Millis) -> Option<ItemState> {
    let since = |mark: Option<Millis>| mark.map(|t| now.saturating_sub(t));

    match item.state {
        ItemState::Entering => {
            (since(Some(item.created_at))? >= config.arrival_ms).then_some(ItemState::Validating)
        }
        ItemState::Validating => Some(ItemState::Queued),
        ItemState::Queued => {
            (since(item.queued_at)? > config.max_queue_wait_ms).then_some(ItemState::Expired)
        }
        ItemState::WaitingForModel => {
            (since(item.picked_at)? > config.max_queue_wait_ms).then_some(ItemState::Expired)
        }
        ItemState::Processing => (since(item.processing_started_at)? > config.processing_time_ms)
            .then_some(ItemState::Delivering),
        ItemState::Delivering => {
            let delivering_for =
                since(item.processing_started_at)?.saturating_sub(config.processing_time_ms);
            (delivering_for > config.delivery_time_ms).then_some(ItemState::Completed)
        }
        ItemState::Completed | ItemState::Failed | ItemState::Expired => {
            (since(item.settled_at)? >= config.fade_ms).then_some(ItemState::Removed)
        }
        ItemState::RateLimited | ItemState::Removed => None,
    }
}

/// Move `item` into `next` and apply the side effects of entering it.
fn enter(
    item: &mut Item,
    next: ItemState,
    pool: &mut WorkerPool,
    config: &SimConfig,
    now: Millis,
    report: &mut DriverReport,
) {
    let capacity = config.per_worker_concurrency;
    let from = item.state;
    item.state = next;

    match next {
        ItemState::Queued => {
            item.queued_at.get_or_insert(now);
        }
        ItemState::Delivering => {
            if let Some(worker) = item.assigned_worker.take() {
                pool.release(worker, item.id, capacity);
            }
            report.finished_processing += 1;
        }
        ItemState::Completed => {
            item.completed_at.get_or_insert(now);
            item.settled_at.get_or_insert(now);
            report.settled += 1;
        }
        ItemState::Expired | ItemState::Failed => {
            // Only a waiting item can still hold a claim here; it never
            // occupied a slot, so there is nothing to release on the worker.
            item.assigned_worker = None;
            item.settled_at.get_or_insert(now);
            report.settled += 1;
        }
        ItemState::Entering
        | ItemState::Validating
        | ItemState::WaitingForModel
        | ItemState::Processing
        | ItemState::RateLimited
        | ItemState::Removed => {}
    }

    trace!(item = item.id, ?from, to = ?next, now, "item transition");
}

/// Let items waiting on a worker claim its free slots.
///
/// Waiting items are visited in `(priority, created_at)` order; an item
/// whose worker is still starting, full, or gone simply keeps waiting.
/// Returns how many items were promoted.
pub fn promote_waiting(
    items: &mut [Item],
    pool: &mut WorkerPool,
    config: &SimConfig,
    now: Millis,
) -> usize {
    let mut waiting: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, i)| i.state == ItemState::WaitingForModel)
        .map(|(idx, _)| idx)
        .collect();
    waiting.sort_by_key(|&idx| items[idx].order_key());

    let mut promoted = 0;
    for idx in waiting {
        let item = &mut items[idx];
        let Some(worker) = item.assigned_worker else {
            continue;
        };
        if !pool.claim(worker, item.id, config.per_worker_concurrency) {
            continue;
        }
        item.state = ItemState::Processing;
        item.processing_started_at.get_or_insert(now);
        trace!(item = item.id, worker, now, "item promoted to processing");
        promoted += 1;
    }
    promoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldpool_core::{Priority, WorkerState};

    fn config() -> SimConfig {
        SimConfig::default()
    }

    fn drive(item: &mut Item, pool: &mut WorkerPool, now: Millis) -> MetricsCollector {
        let mut collector = MetricsCollector::new();
        advance_items(
            std::slice::from_mut(item),
            pool,
            &config(),
            now,
            &mut collector,
        );
        collector
    }

    #[test]
    fn entering_settles_through_validation_to_queued() {
        let mut pool = WorkerPool::new();
        let mut item = Item::new(0, Priority::Normal, 0);
        drive(&mut item, &mut pool, 0);
        assert_eq!(item.state, ItemState::Queued);
        assert_eq!(item.queued_at, Some(0));
    }

    #[test]
    fn entering_waits_for_arrival_time() {
        let cfg = SimConfig {
            arrival_ms: 300,
            ..config()
        };
        let item = Item::new(0, Priority::Normal, 100);
        assert_eq!(next_state(&item, &cfg, 399), None);
        assert_eq!(next_state(&item, &cfg, 400), Some(ItemState::Validating));
    }

    #[test]
    fn queued_expires_strictly_after_ttl() {
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::Queued;
        item.queued_at = Some(0);
        assert_eq!(next_state(&item, &config(), 10_000), None);
        assert_eq!(next_state(&item, &config(), 10_001), Some(ItemState::Expired));
    }

    #[test]
    fn waiting_ttl_runs_from_pick_time() {
        let mut pool = WorkerPool::new();
        pool.start_one(0, 1);
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::WaitingForModel;
        item.queued_at = Some(0);
        item.picked_at = Some(9_000);
        item.assigned_worker = Some(0);

        // Past the queued TTL but within the waiting TTL.
        drive(&mut item, &mut pool, 15_000);
        assert_eq!(item.state, ItemState::WaitingForModel);

        let collector = drive(&mut item, &mut pool, 19_001);
        assert_eq!(item.state, ItemState::Expired);
        assert_eq!(item.assigned_worker, None);
        assert_eq!(item.settled_at, Some(19_001));
        assert_eq!(collector.snapshot(&[], &[]).expired, 1);
    }

    #[test]
    fn processing_then_delivery_then_completion() {
        let mut pool = WorkerPool::seeded(1);
        pool.claim(0, 0, 1);
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::Processing;
        item.processing_started_at = Some(1000);
        item.assigned_worker = Some(0);

        drive(&mut item, &mut pool, 3000);
        assert_eq!(item.state, ItemState::Processing);

        drive(&mut item, &mut pool, 3001);
        assert_eq!(item.state, ItemState::Delivering);
        assert_eq!(item.assigned_worker, None);
        assert_eq!(pool.get(0).unwrap().state, WorkerState::Ready);
        assert!(pool.get(0).unwrap().current_item_ids.is_empty());

        drive(&mut item, &mut pool, 3500);
        assert_eq!(item.state, ItemState::Delivering);

        let collector = drive(&mut item, &mut pool, 3501);
        assert_eq!(item.state, ItemState::Completed);
        assert_eq!(item.completed_at, Some(3501));
        assert_eq!(collector.snapshot(&[], &[]).completed, 1);
    }

    #[test]
    fn large_step_chains_through_delivery() {
        let mut pool = WorkerPool::seeded(1);
        pool.claim(0, 0, 1);
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::Processing;
        item.processing_started_at = Some(0);
        item.assigned_worker = Some(0);

        let collector = drive(&mut item, &mut pool, 60_000);

        // The fade starts at the completion mark, so removal is a later step.
        assert_eq!(item.state, ItemState::Completed);
        assert_eq!(item.completed_at, Some(60_000));
        assert!(pool.get(0).unwrap().current_item_ids.is_empty());
        assert_eq!(collector.snapshot(&[], &[]).completed, 1);
    }

    #[test]
    fn terminal_items_fade_before_removal() {
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::Expired;
        item.settled_at = Some(500);
        assert_eq!(next_state(&item, &config(), 1499), None);
        assert_eq!(next_state(&item, &config(), 1500), Some(ItemState::Removed));
    }

    #[test]
    fn declared_only_states_never_move() {
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::RateLimited;
        assert_eq!(next_state(&item, &config(), u64::MAX), None);
    }

    #[test]
    fn missing_timestamps_skip_the_transition() {
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::Processing;
        assert_eq!(next_state(&item, &config(), 1_000_000), None);
    }

    #[test]
    fn promotion_follows_priority_and_capacity() {
        let mut pool = WorkerPool::seeded(1);
        let cfg = config();
        let mut items: Vec<Item> = [Priority::Low, Priority::High]
            .into_iter()
            .enumerate()
            .map(|(id, p)| {
                let mut i = Item::new(id as u64, p, 0);
                i.state = ItemState::WaitingForModel;
                i.picked_at = Some(0);
                i.assigned_worker = Some(0);
                i
            })
            .collect();

        assert_eq!(promote_waiting(&mut items, &mut pool, &cfg, 3000), 1);
        assert_eq!(items[1].state, ItemState::Processing);
        assert_eq!(items[1].processing_started_at, Some(3000));
        assert_eq!(items[0].state, ItemState::WaitingForModel);
        assert_eq!(pool.get(0).unwrap().state, WorkerState::Busy);
    }

    #[test]
    fn promotion_skips_missing_worker() {
        let mut pool = WorkerPool::new();
        let mut item = Item::new(0, Priority::Normal, 0);
        item.state = ItemState::WaitingForModel;
        item.picked_at = Some(0);
        item.assigned_worker = Some(7);

        let promoted = promote_waiting(std::slice::from_mut(&mut item), &mut pool, &config(), 10);
        assert_eq!(promoted, 0);
        assert_eq!(item.state, ItemState::WaitingForModel);
    }
}
