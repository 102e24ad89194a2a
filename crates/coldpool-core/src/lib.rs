//! coldpool-core — shared types for the coldpool simulation.
//!
//! Holds the tunable [`SimConfig`], the item and worker records the engine
//! owns, the derived [`Metrics`], and the read-only [`SimSnapshot`] handed
//! to collaborators. Scenario files (`*.toml`) are parsed into a
//! [`SimFile`].
//!
//! Every type here is plain data: transitions live in the pool, scheduler,
//! autoscale and engine crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Arrival, ConfigPatch, SimConfig, SimFile};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
