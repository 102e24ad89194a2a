pub mod live;
pub mod run;

use std::collections::VecDeque;
use std::path::Path;

use coldpool_core::{Arrival, SimFile};
use coldpool_engine::Simulation;

/// Feeds a scenario's arrivals into a simulation as its clock passes them.
#[derive(Debug)]
pub struct Feeder {
    arrivals: VecDeque<Arrival>,
}

impl Feeder {
    pub fn new(arrivals: Vec<Arrival>) -> Self {
        Self {
            arrivals: arrivals.into(),
        }
    }

    /// Schedule every arrival whose time has come.
    pub fn feed(&mut self, sim: &mut Simulation) {
        while self
            .arrivals
            .front()
            .is_some_and(|a| a.at_ms <= sim.tick())
        {
            if let Some(a) = self.arrivals.pop_front() {
                sim.add_burst(a.count, a.priority);
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.arrivals.len()
    }
}

/// Load a scenario file and build its simulation and feeder.
pub fn load(path: &Path) -> anyhow::Result<(Simulation, Feeder)> {
    let file = SimFile::from_file(path)?;
    tracing::info!(
        path = %path.display(),
        arrivals = file.arrivals.len(),
        max_workers = file.engine.max_workers,
        "scenario loaded"
    );
    Ok((Simulation::new(file.engine), Feeder::new(file.arrivals)))
}

/// One-line summary of the current step.
pub fn status_line(sim: &Simulation) -> String {
    let m = sim.metrics();
    format!(
        "t={:>7}ms  queued={:<3} waiting={:<3} processing={:<3} delivering={:<3} \
         workers={}r/{}s/{}x target={}  done={} expired={}",
        sim.tick(),
        m.queued,
        m.waiting_for_model,
        m.processing,
        m.delivering,
        m.active_workers,
        m.starting_workers,
        m.stopping_workers,
        sim.target_workers(),
        m.completed,
        m.expired,
    )
}
