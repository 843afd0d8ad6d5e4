//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define orchestrator metrics (registrations, transitions, unloads, passes)
//! - Install a Prometheus recorder when asked to
//!
//! # Metrics
//! - `orchestrator_registrations_total` (counter): registrations by outcome
//! - `orchestrator_registered_apps` (gauge): current registry size
//! - `orchestrator_transitions_total` (counter): status changes by target status
//! - `orchestrator_unload_requests_total` (counter): by mode, joined or new
//! - `orchestrator_unloads_total` (counter): immediate teardowns by outcome
//! - `orchestrator_reroute_passes_total` (counter): recomputation passes run
//! - `orchestrator_reroute_folded_requests` (histogram): requests per pass
//! - `orchestrator_start_not_called_total` (counter): watchdog warnings
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::apps::status::AppStatus;

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

pub fn record_registration(ok: bool) {
    counter!("orchestrator_registrations_total", "outcome" => outcome(ok)).increment(1);
}

pub fn record_registered_apps(count: usize) {
    gauge!("orchestrator_registered_apps").set(count as f64);
}

pub fn record_transition(to: AppStatus) {
    counter!("orchestrator_transitions_total", "to" => to.as_str()).increment(1);
}

pub fn record_unload_request(mode: &'static str, joined: bool) {
    counter!(
        "orchestrator_unload_requests_total",
        "mode" => mode,
        "joined" => if joined { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_unload_outcome(ok: bool) {
    counter!("orchestrator_unloads_total", "outcome" => outcome(ok)).increment(1);
}

pub fn record_reroute_pass(folded: usize) {
    counter!("orchestrator_reroute_passes_total").increment(1);
    histogram!("orchestrator_reroute_folded_requests").record(folded as f64);
}

pub fn record_start_not_called() {
    counter!("orchestrator_start_not_called_total").increment(1);
}

/// Install the global Prometheus recorder.
///
/// Returns `None` if a recorder is already installed.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics recorder");
            None
        }
    }
}
