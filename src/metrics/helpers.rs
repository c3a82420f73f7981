//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    CONDITION_FAILURES_TOTAL, HIDDEN_NODES_TOTAL, PIPELINE_DURATION_SECONDS,
    REPEAT_EXPANSIONS_TOTAL, SYNTAX_ERRORS_TOTAL, VARIABLES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording analysis metrics
pub struct AnalysisMetrics;

impl AnalysisMetrics {
    /// Record the outcome of one analysis pass
    pub fn record_variables(valid: usize, invalid: usize) {
        VARIABLES_TOTAL
            .with_label_values(&["valid"])
            .inc_by(valid as u64);
        VARIABLES_TOTAL
            .with_label_values(&["invalid"])
            .inc_by(invalid as u64);
    }

    pub fn record_syntax_error() {
        SYNTAX_ERRORS_TOTAL.inc();
    }

    pub fn record_pipeline_duration(duration_secs: f64) {
        PIPELINE_DURATION_SECONDS.observe(duration_secs);
    }
}

/// Helper struct for recording rich-document metrics
pub struct DocumentMetrics;

impl DocumentMetrics {
    pub fn record_repeat_expanded() {
        REPEAT_EXPANSIONS_TOTAL.inc();
    }

    pub fn record_node_hidden() {
        HIDDEN_NODES_TOTAL.inc();
    }

    pub fn record_condition_failure() {
        CONDITION_FAILURES_TOTAL.inc();
    }
}
