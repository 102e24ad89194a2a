//! coldpool-metrics — observability for a simulation.
//!
//! Gauges (queued, processing, worker counts) are recomputed from the
//! item and worker collections every step. Outcome counters (completed,
//! failed, expired) are tallied as transitions happen, because terminal
//! items are pruned from the collection once they fade out.
//!
//! # Architecture
//!
//! ```text
//! MetricsCollector
//!   ├── record_outcome() ← called once per terminal transition
//!   └── snapshot()       → Metrics for the current step
//!
//! Prometheus exposition
//!   └── render_prometheus() → text exposition of one Metrics value
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::MetricsCollector;
pub use prometheus::render_prometheus;
