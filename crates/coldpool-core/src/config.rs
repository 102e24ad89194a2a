//! Simulation configuration and the `*.toml` scenario file format.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Millis, Priority};

/// Fixed fade before a stopping worker is considered stopped.
pub const STOP_FADE_MS: Millis = 1000;

/// Tunable parameters of a simulation.
///
/// Missing fields in a scenario file take the values from
/// [`SimConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub processing_time_ms: Millis,
    pub cold_start_time_ms: Millis,
    /// Capacity: claimed items at which a worker counts as full.
    pub per_worker_concurrency: usize,
    pub min_workers: usize,
    pub max_workers: usize,
    /// Demand-per-worker ratio the autoscaler sizes the pool with.
    pub concurrency_target: usize,
    /// Sustained idle time before scaling back to `min_workers`.
    pub scale_down_delay_ms: Millis,
    /// TTL for each waiting phase (queued, and waiting on a starting worker).
    pub max_queue_wait_ms: Millis,
    pub delivery_time_ms: Millis,
    /// Time an item spends `entering` before validation.
    pub arrival_ms: Millis,
    /// Time a terminal item lingers before it is removed.
    pub fade_ms: Millis,
    /// Spacing between admissions scheduled by a burst.
    pub burst_stagger_ms: Millis,
    /// Advisory only: admissions over this size are logged, never rejected.
    pub max_queue_size: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            processing_time_ms: 2000,
            cold_start_time_ms: 3000,
            per_worker_concurrency: 1,
            min_workers: 0,
            max_workers: 10,
            concurrency_target: 1,
            scale_down_delay_ms: 10_000,
            max_queue_wait_ms: 10_000,
            delivery_time_ms: 500,
            arrival_ms: 0,
            fade_ms: 1000,
            burst_stagger_ms: 100,
            max_queue_size: None,
        }
    }
}

impl SimConfig {
    /// `min_workers`, never above `max_workers`.
    pub fn effective_min_workers(&self) -> usize {
        self.min_workers.min(self.max_workers)
    }

    /// Clamp a requested worker count into `[0, max_workers]`.
    pub fn clamp_workers(&self, n: usize) -> usize {
        n.min(self.max_workers)
    }

    /// Merge the set fields of `patch` into this config.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(v) = patch.$field {
                        self.$field = v;
                    }
                )*
            };
        }
        merge!(
            processing_time_ms,
            cold_start_time_ms,
            per_worker_concurrency,
            min_workers,
            max_workers,
            concurrency_target,
            scale_down_delay_ms,
            max_queue_wait_ms,
            delivery_time_ms,
            arrival_ms,
            fade_ms,
            burst_stagger_ms,
        );
        if let Some(size) = patch.max_queue_size {
            self.max_queue_size = size;
        }
    }
}

/// Partial update merged into a live [`SimConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub processing_time_ms: Option<Millis>,
    pub cold_start_time_ms: Option<Millis>,
    pub per_worker_concurrency: Option<usize>,
    pub min_workers: Option<usize>,
    pub max_workers: Option<usize>,
    pub concurrency_target: Option<usize>,
    pub scale_down_delay_ms: Option<Millis>,
    pub max_queue_wait_ms: Option<Millis>,
    pub delivery_time_ms: Option<Millis>,
    pub arrival_ms: Option<Millis>,
    pub fade_ms: Option<Millis>,
    pub burst_stagger_ms: Option<Millis>,
    /// `Some(None)` clears the advisory limit.
    pub max_queue_size: Option<Option<usize>>,
}

/// A scheduled admission in a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    /// Logical time at which the admissions are scheduled.
    pub at_ms: Millis,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub priority: Priority,
}

fn default_count() -> usize {
    1
}

/// A scenario file: engine parameters plus a list of arrivals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimFile {
    #[serde(default)]
    pub engine: SimConfig,
    #[serde(default, rename = "arrival")]
    pub arrivals: Vec<Arrival>,
}

impl SimFile {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        let mut file: SimFile = toml::from_str(content)?;
        file.arrivals.sort_by_key(|a| a.at_ms);
        Ok(file)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
