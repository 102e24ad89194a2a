//! coldpool-scheduler — matching queued items to workers.
//!
//! The dispatcher runs once per step, after the autoscaler has reconciled
//! the pool, in two passes:
//!
//! ```text
//! queued items, sorted (priority, created_at)
//!   ├── pass 1: ready/busy workers with spare slots  → processing
//!   │           (round-robin cursor, stops at the first unplaceable item)
//!   └── pass 2: starting workers, balanced per worker → waiting_for_model
//! ```
//!
//! Each pass keeps its own [`RoundRobinBalancer`] so the cursor position
//! survives across steps.

pub mod dispatcher;
pub mod load_balancer;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use load_balancer::RoundRobinBalancer;
