//! Prometheus metrics for the preview engine.
//!
//! This module provides counters for monitoring template analysis and
//! rich-document rendering:
//! - Variable metrics (valid/invalid variables discovered)
//! - Syntax error metrics
//! - Rich document metrics (repeat expansions, hidden nodes, failed conditions)
//! - Analysis latency

mod helpers;

pub use helpers::{encode_metrics, AnalysisMetrics, DocumentMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "preview";

lazy_static! {
    // ============================================================================
    // Analysis Metrics
    // ============================================================================

    /// Variables discovered, by validity
    pub static ref VARIABLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_variables_total", METRIC_PREFIX),
        "Total template variables discovered",
        &["validity"]
    ).unwrap();

    /// Templates rejected by the parser
    pub static ref SYNTAX_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_syntax_errors_total", METRIC_PREFIX),
        "Total templates that failed to parse"
    ).unwrap();

    /// Time spent in a full preview pipeline run
    pub static ref PIPELINE_DURATION_SECONDS: Histogram = register_histogram!(
        format!("{}_pipeline_duration_seconds", METRIC_PREFIX),
        "Preview pipeline duration in seconds",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]
    ).unwrap();

    // ============================================================================
    // Rich Document Metrics
    // ============================================================================

    /// Repeat nodes expanded into clones
    pub static ref REPEAT_EXPANSIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_repeat_expansions_total", METRIC_PREFIX),
        "Total repeat nodes expanded"
    ).unwrap();

    /// Nodes removed because their show condition was false
    pub static ref HIDDEN_NODES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_hidden_nodes_total", METRIC_PREFIX),
        "Total nodes pruned by show conditions"
    ).unwrap();

    /// Show conditions that failed to render (node kept)
    pub static ref CONDITION_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_condition_failures_total", METRIC_PREFIX),
        "Total show conditions that failed to evaluate"
    ).unwrap();
}
