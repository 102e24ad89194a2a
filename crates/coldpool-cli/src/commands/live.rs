use std::path::Path;
use std::time::Duration;

use anyhow::ensure;
use tokio::sync::watch;
use tracing::info;

use coldpool_core::Metrics;
use coldpool_engine::Simulation;

use super::Feeder;

pub async fn live(
    path: &Path,
    tick_ms: u64,
    speed: f64,
    duration_ms: Option<u64>,
) -> anyhow::Result<()> {
    ensure!(tick_ms > 0, "--tick-ms must be greater than zero");

    let (mut sim, feeder) = super::load(path)?;
    sim.set_speed(speed);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let sim = drive(sim, feeder, tick_ms, duration_ms, shutdown_rx, |sim| {
        println!("{}", super::status_line(sim));
    })
    .await;

    info!(
        tick = sim.tick(),
        completed = sim.metrics().completed,
        "live run stopped"
    );
    Ok(())
}

/// Advance `sim` by `tick_ms` on every wall-clock tick until shutdown, or
/// until the simulated clock reaches `duration_ms`.
///
/// `on_step` is called whenever a step changed the metrics.
pub async fn drive(
    mut sim: Simulation,
    mut feeder: Feeder,
    tick_ms: u64,
    duration_ms: Option<u64>,
    mut shutdown: watch::Receiver<bool>,
    mut on_step: impl FnMut(&Simulation),
) -> Simulation {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    let mut last: Option<Metrics> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                feeder.feed(&mut sim);
                sim.advance(tick_ms);
                if last.as_ref() != Some(sim.metrics()) {
                    on_step(&sim);
                    last = Some(sim.metrics().clone());
                }
                if duration_ms.is_some_and(|d| sim.tick() >= d) {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    sim
}
