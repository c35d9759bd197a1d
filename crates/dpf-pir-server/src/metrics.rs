//! Server metrics
//!
//! Privacy-safe metrics: only role and outcome labels, never query content.
//! Values go to whatever `metrics` recorder the embedding process installs.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

use dpf_pir_core::StatusKind;

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_CLIENT_ERROR: &str = "client_error";
pub const OUTCOME_SERVER_ERROR: &str = "server_error";

/// Outcome label for a finished request
pub fn outcome_label(kind: Option<StatusKind>) -> &'static str {
    match kind {
        None => OUTCOME_OK,
        Some(StatusKind::InvalidArgument) => OUTCOME_CLIENT_ERROR,
        Some(_) => OUTCOME_SERVER_ERROR,
    }
}

pub fn record_pir_request(role: &str, outcome: &str, duration: Duration) {
    counter!(
        "pir_requests_total",
        "role" => role.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "pir_request_duration_seconds",
        "role" => role.to_string(),
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn set_server_ready(role: &str, ready: bool) {
    gauge!("pir_server_ready", "role" => role.to_string()).set(if ready { 1.0 } else { 0.0 });
}

pub fn record_store_rebuild(records_written: usize, duration: Duration) {
    counter!("pir_store_records_written_total").increment(records_written as u64);
    histogram!("pir_store_rebuild_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(None), OUTCOME_OK);
        assert_eq!(outcome_label(Some(StatusKind::InvalidArgument)), OUTCOME_CLIENT_ERROR);
        assert_eq!(outcome_label(Some(StatusKind::FailedPrecondition)), OUTCOME_SERVER_ERROR);
        assert_eq!(outcome_label(Some(StatusKind::Internal)), OUTCOME_SERVER_ERROR);
    }
}
