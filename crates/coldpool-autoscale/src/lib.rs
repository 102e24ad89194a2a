//! coldpool-autoscale — demand-driven worker scaling.
//!
//! Observes waiting and in-flight items every step, computes a target
//! worker count, and reconciles the pool toward it.
//!
//! # Scaling Algorithm
//!
//! ```text
//! demand   = queued + waiting_for_model + processing
//! capacity = (active + starting) * concurrency_target
//!
//! if demand > capacity and active + starting < max:
//!     target = max(target, min(ceil(demand / concurrency_target), max))
//!
//! if demand > 0 and no worker is running:
//!     target = max(target, max(1, min))          // scale from zero
//!
//! if nothing busy/starting, nothing in flight, idle > scale_down_delay:
//!     target = min
//! ```
//!
//! Growth restarts stopped workers before creating new ones; shrinking
//! only ever stops idle ready workers, one at a time, until the target is
//! met or no idle worker is left.

pub mod scaler;

pub use scaler::{Autoscaler, Demand, Reconciled, ScaleDecision, ScaleReason};
