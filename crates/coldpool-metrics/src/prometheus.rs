//! Prometheus text exposition format.
//!
//! Renders a metrics snapshot into the Prometheus text exposition format
//! so a simulation run can be compared with dashboards built for a real
//! worker tier.

use coldpool_core::Metrics;

/// Render one metrics snapshot into Prometheus text format.
///
/// Item gauges carry a `state` label, worker gauges a `state` label, and
/// outcome counters an `outcome` label.
pub fn render_prometheus(m: &Metrics) -> String {
    let mut out = String::new();

    out.push_str("# HELP coldpool_items Items currently in each non-terminal state.\n");
    out.push_str("# TYPE coldpool_items gauge\n");
    for (state, value) in [
        ("queued", m.queued),
        ("waiting_for_model", m.waiting_for_model),
        ("processing", m.processing),
        ("delivering", m.delivering),
    ] {
        out.push_str(&format!("coldpool_items{{state=\"{state}\"}} {value}\n"));
    }

    out.push_str("# HELP coldpool_items_total Items that reached a terminal state.\n");
    out.push_str("# TYPE coldpool_items_total counter\n");
    for (outcome, value) in [
        ("completed", m.completed),
        ("failed", m.failed),
        ("expired", m.expired),
    ] {
        out.push_str(&format!(
            "coldpool_items_total{{outcome=\"{outcome}\"}} {value}\n"
        ));
    }

    out.push_str("# HELP coldpool_workers Workers in each running state.\n");
    out.push_str("# TYPE coldpool_workers gauge\n");
    for (state, value) in [
        ("ready", m.ready_workers),
        ("busy", m.active_workers.saturating_sub(m.ready_workers)),
        ("starting", m.starting_workers),
        ("stopping", m.stopping_workers),
    ] {
        out.push_str(&format!("coldpool_workers{{state=\"{state}\"}} {value}\n"));
    }

    out.push_str("# HELP coldpool_latency_ms Admission-to-completion latency in milliseconds.\n");
    out.push_str("# TYPE coldpool_latency_ms gauge\n");
    out.push_str(&format!(
        "coldpool_latency_ms{{quantile=\"0.5\"}} {:.2}\n",
        m.latency_p50_ms
    ));
    out.push_str(&format!(
        "coldpool_latency_ms{{quantile=\"0.99\"}} {:.2}\n",
        m.latency_p99_ms
    ));

    out
}
