//! CLI argument definitions for syslog-viewer-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Every override flag takes precedence over the config file and
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use syslog_viewer_core::config::ViewerConfig;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "syslog-viewer.toml";

/// Syslog collector daemon.
///
/// Receives syslog over UDP and TCP on one port, keeps the most recent
/// records in memory and persists everything to a rotating JSON Lines file.
#[derive(Parser, Debug, Default)]
#[command(name = "syslog-viewer-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to syslog-viewer.toml configuration file.
    ///
    /// When omitted, `./syslog-viewer.toml` is used if present,
    /// otherwise built-in defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Syslog port shared by UDP and TCP.
    #[arg(long)]
    pub syslog_port: Option<u16>,

    /// Port of the web viewer (consumed by the web layer).
    #[arg(long)]
    pub web_port: Option<u16>,

    /// Bind address for the syslog listeners.
    #[arg(long)]
    pub host: Option<String>,

    /// Rotate the active log file once it reaches this size, in MB.
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Number of rotated generations to keep.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Resolve the effective configuration.
    ///
    /// Precedence: CLI flags > environment variables > config file > defaults.
    /// An explicitly passed `--config` path must exist.
    pub async fn resolve_config(&self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => load_file(path).await?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                load_file(Path::new(DEFAULT_CONFIG_FILE)).await?
            }
            None => {
                let mut config = ViewerConfig::default();
                config.apply_env_overrides();
                config
            }
        };

        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Ok(config)
    }

    /// Apply CLI flags on top of an already loaded configuration.
    pub fn apply_overrides(&self, config: &mut ViewerConfig) {
        if let Some(port) = self.syslog_port {
            config.syslog.port = port;
        }
        if let Some(port) = self.web_port {
            config.web.port = port;
        }
        if let Some(host) = &self.host {
            config.syslog.host = host.clone();
        }
        if let Some(max_size) = self.max_size {
            config.storage.max_size_mb = max_size;
        }
        if let Some(max_files) = self.max_files {
            config.storage.max_files = max_files;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}

async fn load_file(path: &Path) -> Result<ViewerConfig> {
    let mut config = ViewerConfig::from_file(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?;
    config.apply_env_overrides();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_override_flags() {
        let cli = DaemonCli::try_parse_from([
            "syslog-viewer-daemon",
            "--syslog-port",
            "5514",
            "--web-port",
            "9090",
            "--host",
            "127.0.0.1",
            "--max-size",
            "5",
            "--max-files",
            "3",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let mut config = ViewerConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.syslog.port, 5514);
        assert_eq!(config.web.port, 9090);
        assert_eq!(config.syslog.host, "127.0.0.1");
        assert_eq!(config.storage.max_size_mb, 5);
        assert_eq!(config.storage.max_files, 3);
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn no_flags_keep_defaults() {
        let cli = DaemonCli::try_parse_from(["syslog-viewer-daemon"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.validate);

        let mut config = ViewerConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.syslog.port, 514);
        assert_eq!(config.storage.max_files, 10);
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(DaemonCli::try_parse_from(["syslog-viewer-daemon", "--syslog-port", "abc"]).is_err());
    }
}
