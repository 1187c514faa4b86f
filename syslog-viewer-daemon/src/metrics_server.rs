//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//! Without an installed recorder every `metrics::*!` call in the ingest
//! crate is a no-op.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

use syslog_viewer_core::config::MetricsConfig;

/// Parse `listen_addr:port` into a socket address.
pub fn metrics_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process.
///
/// # Errors
///
/// - The endpoint is not `/metrics`
/// - The listen address does not parse
/// - A global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr = metrics_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    syslog_viewer_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_addr_combines_host_and_port() {
        let config = MetricsConfig::default();
        assert_eq!(metrics_addr(&config).unwrap().to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn invalid_listen_addr_is_rejected() {
        let config = MetricsConfig {
            listen_addr: "not an ip".to_owned(),
            ..MetricsConfig::default()
        };
        assert!(metrics_addr(&config).is_err());
    }

    #[test]
    fn custom_endpoint_is_rejected_before_install() {
        let config = MetricsConfig {
            enabled: true,
            endpoint: "/custom".to_owned(),
            ..MetricsConfig::default()
        };
        let err = install_metrics_recorder(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported metrics endpoint"));
    }
}
