//! Domain types for the coldpool simulation.
//!
//! These types represent the engine-owned state of work items, workers,
//! and the metrics derived from them. All types are serializable so that
//! a snapshot can be handed to renderers or dumped as JSON.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;

/// Unique identifier for a work item (monotonic per simulation).
pub type ItemId = u64;

/// Unique identifier for a worker (monotonic per simulation, reused on restart).
pub type WorkerId = u64;

/// Logical time in milliseconds.
pub type Millis = u64;

// ── Item ──────────────────────────────────────────────────────────

/// Admission priority. Lower level is served first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High = 0,
    #[default]
    Normal = 1,
    Low = 2,
}

impl Priority {
    /// Map a numeric level onto a priority, clamping anything past 2 to `Low`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::High,
            1 => Self::Normal,
            _ => Self::Low,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Entering,
    Validating,
    Queued,
    WaitingForModel,
    Processing,
    Delivering,
    Completed,
    /// Declared for fault injection; no transition produces it.
    Failed,
    Expired,
    /// Declared for fault injection; no transition produces it.
    RateLimited,
    Removed,
}

impl ItemState {
    /// Completed, failed, expired or already removed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Expired | Self::Removed
        )
    }

    /// Anything not terminal still counts as in-flight work.
    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }

    /// Queued or waiting on a cold-starting worker.
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::Queued | Self::WaitingForModel)
    }
}

/// A unit of asynchronous work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub state: ItemState,
    pub priority: Priority,
    /// Logical time of admission.
    pub created_at: Millis,
    pub queued_at: Option<Millis>,
    /// When a worker (ready or starting) claimed this item.
    pub picked_at: Option<Millis>,
    pub processing_started_at: Option<Millis>,
    pub completed_at: Option<Millis>,
    /// When the item entered a terminal state; drives the fade to removal.
    pub settled_at: Option<Millis>,
    pub assigned_worker: Option<WorkerId>,
}

impl Item {
    /// A freshly admitted item in `Entering`.
    pub fn new(id: ItemId, priority: Priority, now: Millis) -> Self {
        Self {
            id,
            state: ItemState::Entering,
            priority,
            created_at: now,
            queued_at: None,
            picked_at: None,
            processing_started_at: None,
            completed_at: None,
            settled_at: None,
            assigned_worker: None,
        }
    }

    /// Dispatch ordering key: priority, then arrival, then identity.
    pub fn order_key(&self) -> (Priority, Millis, ItemId) {
        (self.priority, self.created_at, self.id)
    }
}

// ── Worker ────────────────────────────────────────────────────────

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Stopped,
    Starting,
    Ready,
    Busy,
    Stopping,
}

impl WorkerState {
    /// Ready or busy: able to hold claimed items.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Ready | Self::Busy)
    }
}

/// A stateful processing unit with bounded concurrent capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub state: WorkerState,
    pub starting_at: Option<Millis>,
    pub stopping_at: Option<Millis>,
    /// Items holding a capacity slot, in claim order.
    pub current_item_ids: Vec<ItemId>,
}

impl Worker {
    /// A worker entering cold start at `now`.
    pub fn starting(id: WorkerId, now: Millis) -> Self {
        Self {
            id,
            state: WorkerState::Starting,
            starting_at: Some(now),
            stopping_at: None,
            current_item_ids: Vec::new(),
        }
    }

    /// A pre-warmed idle worker.
    pub fn ready(id: WorkerId) -> Self {
        Self {
            id,
            state: WorkerState::Ready,
            starting_at: None,
            stopping_at: None,
            current_item_ids: Vec::new(),
        }
    }

    /// Free capacity slots, zero unless the worker is ready or busy.
    pub fn spare_capacity(&self, capacity: usize) -> usize {
        if self.state.is_active() {
            capacity.saturating_sub(self.current_item_ids.len())
        } else {
            0
        }
    }

    pub fn has_room(&self, capacity: usize) -> bool {
        self.spare_capacity(capacity) > 0
    }

    pub fn is_idle(&self) -> bool {
        self.state == WorkerState::Ready && self.current_item_ids.is_empty()
    }
}

// ── Metrics ───────────────────────────────────────────────────────

/// Point-in-time view of the simulation, recomputed every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub queued: usize,
    pub waiting_for_model: usize,
    pub processing: usize,
    pub delivering: usize,
    /// Cumulative.
    pub completed: u64,
    /// Cumulative.
    pub failed: u64,
    /// Cumulative.
    pub expired: u64,
    /// Ready plus busy workers.
    pub active_workers: usize,
    pub ready_workers: usize,
    pub starting_workers: usize,
    pub stopping_workers: usize,
    /// Admission-to-completion latency, P50 over the recent sample window.
    pub latency_p50_ms: f64,
    /// Admission-to-completion latency, P99 over the recent sample window.
    pub latency_p99_ms: f64,
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Read-only view of the whole simulation handed to collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick: Millis,
    pub items: Vec<Item>,
    pub workers: Vec<Worker>,
    pub metrics: Metrics,
    pub config: SimConfig,
    pub target_workers: usize,
    pub speed: f64,
    pub paused: bool,
}
