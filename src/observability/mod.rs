//! Logging and metrics initialization.
//!
//! `tracing-subscriber` drives structured logs (`SUBCOG_GRAPH_LOG_FORMAT`,
//! `SUBCOG_GRAPH_LOG_LEVEL`); `metrics-exporter-prometheus` serves a
//! `/metrics` endpoint on `SUBCOG_GRAPH_METRICS_PORT`. Both are initialized
//! once per process via [`init`].

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Initializes the global `tracing` subscriber and the process-wide metrics
/// recorder. Safe to call once at process startup; a second call is a no-op
/// error the caller should log and ignore.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if a subscriber is already installed or
/// the Prometheus exporter fails to bind its listener.
pub fn init(log_format: &str, log_level: &str, metrics_port: u16) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_span_events(FmtSpan::CLOSE);

    let result = match LogFormat::parse(log_format) {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    result.map_err(|e| Error::OperationFailed {
        operation: "tracing_init".to_string(),
        cause: e.to_string(),
    })?;

    if metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| Error::OperationFailed {
                operation: "metrics_init".to_string(),
                cause: e.to_string(),
            })?;
        tracing::info!(%addr, "metrics endpoint listening");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("nonsense"), LogFormat::Pretty);
    }
}
