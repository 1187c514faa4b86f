//! Daemon orchestration -- assembly and lifecycle of the ingest pipeline.
//!
//! The [`Orchestrator`] turns a validated [`ViewerConfig`] into a running
//! [`IngestPipeline`] and owns it until shutdown.
//!
//! # Startup Order
//!
//! 1. Validate configuration
//! 2. Install the metrics recorder (when enabled)
//! 3. Open the store and recover the recent buffer from its tail
//! 4. Bind UDP, then TCP on the same port (bind failure is fatal)
//! 5. Start the rotation monitor
//!
//! # Shutdown Order
//!
//! 1. Stop accepting datagrams and connections
//! 2. Let in-flight appends finish
//! 3. Sync and close the active log file

use std::future::Future;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use syslog_viewer_core::config::ViewerConfig;
use syslog_viewer_ingest::{IngestConfig, IngestPipeline, IngestPipelineBuilder, LogQuery};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: ViewerConfig,
    /// Ingest pipeline (listeners, buffer, store, rotation monitor).
    pipeline: IngestPipeline,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from a file and build the orchestrator.
    ///
    /// Environment variable overrides are applied on top of the file.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = ViewerConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Creates the log directory and recovers the recent buffer, but does
    /// not bind any socket yet.
    pub fn build_from_config(config: ViewerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let ingest_config = IngestConfig::from_core(&config);
        let pipeline = IngestPipelineBuilder::new()
            .config(ingest_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build ingest pipeline: {}", e))?;

        tracing::info!(
            log_dir = %config.storage.log_dir.display(),
            max_size_mb = config.storage.max_size_mb,
            max_files = config.storage.max_files,
            buffer_capacity = config.buffer.capacity,
            recovered = pipeline.buffer().len(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// Bind listeners and start background tasks.
    pub async fn start(&mut self) -> Result<()> {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start ingest pipeline: {}", e))?;
        tracing::info!(
            syslog_port = self.config.syslog.port,
            web_port = self.config.web.port,
            "syslog viewer running"
        );
        Ok(())
    }

    /// Start, wait for `SIGTERM`/`SIGINT`, then shut down gracefully.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        })
        .await
    }

    /// Start, wait for `shutdown` to complete, then shut down gracefully.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.shutdown().await
    }

    /// Stop the pipeline and close the store.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "stopping ingest pipeline"
        );
        self.pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop ingest pipeline: {}", e))
    }

    /// Query handle for the web layer.
    pub fn query(&self) -> LogQuery {
        self.pipeline.query()
    }

    /// The running pipeline.
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
