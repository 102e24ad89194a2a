//! coldpool-pool — the elastic worker pool.
//!
//! Owns every worker identity a simulation has created and drives the
//! worker state machine:
//!
//! ```text
//! stopped ──start──▶ starting ──cold start──▶ ready ⇄ busy
//!    ▲                                          │
//!    └──────── 1s fade ──── stopping ◀──stop────┘ (idle only)
//! ```
//!
//! `ready`/`busy` is never driven directly: it is recomputed from the
//! number of claimed items on every claim and release.

pub mod pool;

pub use pool::{PoolCounts, WorkerPool};
