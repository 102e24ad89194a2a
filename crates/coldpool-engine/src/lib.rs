//! coldpool-engine — the simulation aggregate.
//!
//! A [`Simulation`] owns every item and worker of one simulated tier and
//! is advanced by the caller in logical milliseconds. Each
//! [`Simulation::advance`] runs one full step:
//!
//! ```text
//! advance(delta)
//!   ├── admit burst arrivals that fell due
//!   ├── item lifecycle driver      (entering → … → completed/expired)
//!   ├── worker timers              (cold start, stop fade)
//!   ├── prune removed items
//!   ├── autoscaler                 (target + reconcile)
//!   ├── dispatcher                 (ready pass, starting pass)
//!   └── metrics
//! ```
//!
//! There is one mutator and no shared state between instances, so any
//! number of simulations can run side by side. Collaborators read a
//! cloned [`SimSnapshot`](coldpool_core::SimSnapshot).

pub mod engine;
pub mod layout;
pub mod lifecycle;

pub use engine::Simulation;
