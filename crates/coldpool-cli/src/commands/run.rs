use std::path::Path;

use anyhow::ensure;
use tracing::info;

use coldpool_engine::Simulation;

use super::Feeder;

pub fn run(
    path: &Path,
    duration_ms: u64,
    step_ms: u64,
    format: &str,
    prometheus: bool,
) -> anyhow::Result<()> {
    ensure!(step_ms > 0, "--step-ms must be greater than zero");

    let (mut sim, mut feeder) = super::load(path)?;
    let text = format != "json";

    simulate(&mut sim, &mut feeder, duration_ms, step_ms, |sim| {
        if text {
            println!("{}", super::status_line(sim));
        }
    });

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&sim.snapshot())?),
        _ => print_summary(&sim),
    }
    if prometheus {
        print!("{}", coldpool_metrics::render_prometheus(sim.metrics()));
    }
    Ok(())
}

/// Step `sim` until its clock reaches `duration_ms`, calling `on_step`
/// after every step.
pub fn simulate(
    sim: &mut Simulation,
    feeder: &mut Feeder,
    duration_ms: u64,
    step_ms: u64,
    mut on_step: impl FnMut(&Simulation),
) {
    // The first step settles anything scheduled at time zero.
    feeder.feed(sim);
    sim.advance(0);
    on_step(sim);

    while sim.tick() < duration_ms {
        feeder.feed(sim);
        sim.advance(step_ms.min(duration_ms - sim.tick()));
        on_step(sim);
    }

    info!(
        tick = sim.tick(),
        completed = sim.metrics().completed,
        expired = sim.metrics().expired,
        unscheduled = feeder.remaining(),
        "run finished"
    );
}

fn print_summary(sim: &Simulation) {
    let m = sim.metrics();
    println!();
    println!("Simulated {} ms", sim.tick());
    println!("  completed:  {}", m.completed);
    println!("  expired:    {}", m.expired);
    println!("  in flight:  {}", m.queued + m.waiting_for_model + m.processing + m.delivering);
    println!(
        "  latency:    p50 {:.0} ms, p99 {:.0} ms",
        m.latency_p50_ms, m.latency_p99_ms
    );
    println!(
        "  workers:    {} active, {} starting (target {})",
        m.active_workers,
        m.starting_workers,
        sim.target_workers()
    );
}
