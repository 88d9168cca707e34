use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const RECOMMENDATIONS_TOTAL: &str = "cr_recommendations_total";
pub const RECOMMENDATION_FALLBACKS_TOTAL: &str = "cr_recommendation_fallbacks_total";
pub const RECOMMENDATION_SECONDS: &str = "cr_recommendation_duration_seconds";
pub const TRAINING_RUNS_TOTAL: &str = "cr_training_runs_total";
pub const TRAINING_SECONDS: &str = "cr_training_duration_seconds";
pub const MODEL_ACCURACY: &str = "cr_model_accuracy";
pub const LLM_REQUESTS_TOTAL: &str = "cr_llm_requests_total";

/// Initialize a Prometheus exporter listening on `0.0.0.0:<port>`.
///
/// The port is resolved from the provided environment variable name or the
/// supplied `default_port`. Returns a handle to the exporter if it was started.
pub fn init_metrics(port_env: &str, default_port: u16) -> Option<&'static PrometheusHandle> {
    let port = env::var(port_env)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(default_port);

    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install_recorder()
    {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
            info!(metrics_port = port, "started prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to start prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
    }
}

/// One served recommendation request. `served_by` differs from `strategy` when
/// the request fell back to another predictor.
pub fn record_recommendation(strategy: &str, served_by: &str, fell_back: bool, elapsed: Duration) {
    counter!(
        RECOMMENDATIONS_TOTAL,
        "strategy" => strategy.to_string(),
        "served_by" => served_by.to_string()
    )
    .increment(1);
    if fell_back {
        counter!(RECOMMENDATION_FALLBACKS_TOTAL, "strategy" => strategy.to_string()).increment(1);
    }
    histogram!(RECOMMENDATION_SECONDS, "strategy" => strategy.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_training(kind: &str, outcome: TrainingOutcome, elapsed: Duration) {
    counter!(
        TRAINING_RUNS_TOTAL,
        "kind" => kind.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!(TRAINING_SECONDS, "kind" => kind.to_string()).record(elapsed.as_secs_f64());
}

pub fn record_model_accuracy(kind: &str, accuracy: f64) {
    gauge!(MODEL_ACCURACY, "kind" => kind.to_string()).set(accuracy);
}

pub fn record_llm_request(provider: &str, outcome: &'static str) {
    counter!(
        LLM_REQUESTS_TOTAL,
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingOutcome {
    Trained,
    Rejected,
    Failed,
}

impl TrainingOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TrainingOutcome::Trained => "trained",
            TrainingOutcome::Rejected => "rejected",
            TrainingOutcome::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_a_no_op() {
        record_recommendation("neural", "rules", true, Duration::from_millis(3));
        record_training("forest", TrainingOutcome::Failed, Duration::from_secs(1));
        record_model_accuracy("forest", 0.8);
        record_llm_request("mock", "ok");
    }

    #[test]
    fn training_outcome_labels_are_stable() {
        assert_eq!(TrainingOutcome::Trained.as_str(), "trained");
        assert_eq!(TrainingOutcome::Rejected.as_str(), "rejected");
        assert_eq!(TrainingOutcome::Failed.as_str(), "failed");
    }
}
