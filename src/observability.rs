//! Observability module for logging setup, spans and metrics.
//!
//! This module provides:
//! - Structured logging with configurable level and format
//! - Span helpers for the three pipeline stages
//! - `metrics` facade recorders; no exporter is installed here, so metrics are
//!   no-ops unless the embedding application installs a recorder

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};
use crate::preprocessing::ConditioningPath;

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("medical_ingest={}", config.log_level).parse()?)
        .add_directive(format!("ocr_preprocessing={}", config.log_level).parse()?);

    match config.log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span covering one document's ingestion
pub fn ingest_span(document_type: &str, byte_len: usize) -> tracing::Span {
    tracing::info_span!(
        "ingest",
        document_type = document_type,
        byte_len = byte_len,
        component = "pipeline"
    )
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Create a span for entity extraction
pub fn extraction_span(document_type: &str) -> tracing::Span {
    tracing::info_span!(
        "extraction",
        document_type = document_type,
        component = "extraction"
    )
}

/// Record which conditioning path produced the recognition input
pub fn record_conditioning_path(path: ConditioningPath) {
    metrics::counter!("conditioning_total", "path" => path.as_str()).increment(1);
}

/// Record one recognition attempt
pub fn record_recognition_attempt(profile: &str, accepted: bool, duration: Duration) {
    let profile = profile.to_string();
    metrics::counter!(
        "ocr_attempts_total",
        "profile" => profile,
        "result" => if accepted { "accepted" } else { "rejected" }
    )
    .increment(1);
    metrics::histogram!("ocr_attempt_duration_seconds").record(duration.as_secs_f64());
}

/// Record a recognition that fell back to the sentinel text
pub fn record_sentinel_fallback() {
    metrics::counter!("ocr_sentinel_total").increment(1);
}

/// Record an extraction that collapsed to raw text
pub fn record_extraction_degraded(document_type: &str) {
    let document_type = document_type.to_string();
    metrics::counter!("extraction_degraded_total", "document_type" => document_type).increment(1);
}

/// Record whole-ingest metrics
pub fn record_ingest_metrics(document_type: &str, duration: Duration) {
    let document_type = document_type.to_string();
    metrics::counter!("ingest_total", "document_type" => document_type).increment(1);
    metrics::histogram!("ingest_duration_seconds").record(duration.as_secs_f64());
}
