//! 설정 관리 -- syslog-viewer.toml 파싱 및 런타임 설정
//!
//! [`ViewerConfig`]는 데몬과 수집 크레이트가 사용하는 최상위 설정 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`SYSLOG_VIEWER_SYSLOG_PORT=5514` 형식)
//! 3. 설정 파일 (`syslog-viewer.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), syslog_viewer_core::error::ViewerError> {
//! use syslog_viewer_core::config::ViewerConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ViewerConfig::load("syslog-viewer.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ViewerConfig::parse("[syslog]\nport = 5514")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ViewerError};

/// 회전 점검 주기. 설정 파일로 노출하지 않습니다.
pub const ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// 활성 로그 파일 이름
pub const ACTIVE_FILE_NAME: &str = "syslog.jsonl";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// syslog-viewer 통합 설정
///
/// `syslog-viewer.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// syslog 수신 설정
    #[serde(default)]
    pub syslog: SyslogConfig,
    /// 웹 화면 설정 (외부 웹 레이어가 사용)
    #[serde(default)]
    pub web: WebConfig,
    /// 로그 파일 저장/회전 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 최근 로그 버퍼 설정
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ViewerConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ViewerError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ViewerError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ViewerError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ViewerError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ViewerError> {
        toml::from_str(toml_str).map_err(|e| {
            ViewerError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SYSLOG_VIEWER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SYSLOG_VIEWER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SYSLOG_VIEWER_GENERAL_LOG_FORMAT");

        // Syslog
        override_string(&mut self.syslog.host, "SYSLOG_VIEWER_SYSLOG_HOST");
        override_u16(&mut self.syslog.port, "SYSLOG_VIEWER_SYSLOG_PORT");
        override_usize(
            &mut self.syslog.max_message_size,
            "SYSLOG_VIEWER_SYSLOG_MAX_MESSAGE_SIZE",
        );
        override_usize(
            &mut self.syslog.max_connections,
            "SYSLOG_VIEWER_SYSLOG_MAX_CONNECTIONS",
        );

        // Web
        override_u16(&mut self.web.port, "SYSLOG_VIEWER_WEB_PORT");

        // Storage
        override_path(&mut self.storage.log_dir, "SYSLOG_VIEWER_STORAGE_LOG_DIR");
        override_u64(&mut self.storage.max_size_mb, "SYSLOG_VIEWER_STORAGE_MAX_SIZE_MB");
        override_usize(&mut self.storage.max_files, "SYSLOG_VIEWER_STORAGE_MAX_FILES");
        override_bool(&mut self.storage.fsync, "SYSLOG_VIEWER_STORAGE_FSYNC");

        // Buffer
        override_usize(&mut self.buffer.capacity, "SYSLOG_VIEWER_BUFFER_CAPACITY");

        // Metrics
        override_bool(&mut self.metrics.enabled, "SYSLOG_VIEWER_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "SYSLOG_VIEWER_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "SYSLOG_VIEWER_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 회전 크기, 보존 세대 수, 버퍼 용량은 0을 허용하지 않습니다.
    /// 무제한 모드는 없습니다.
    pub fn validate(&self) -> Result<(), ViewerError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.syslog.host.trim().is_empty() {
            return Err(invalid("syslog.host", "must not be empty".to_owned()));
        }

        if self.syslog.max_message_size == 0 {
            return Err(invalid(
                "syslog.max_message_size",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.syslog.max_connections == 0 {
            return Err(invalid(
                "syslog.max_connections",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.storage.log_dir.as_os_str().is_empty() {
            return Err(invalid("storage.log_dir", "must not be empty".to_owned()));
        }

        const MAX_SIZE_MB_LIMIT: u64 = 1024 * 1024;
        if self.storage.max_size_mb == 0 || self.storage.max_size_mb > MAX_SIZE_MB_LIMIT {
            return Err(invalid(
                "storage.max_size_mb",
                format!("must be 1-{}", MAX_SIZE_MB_LIMIT),
            ));
        }

        const MAX_FILES_LIMIT: usize = 1000;
        if self.storage.max_files == 0 || self.storage.max_files > MAX_FILES_LIMIT {
            return Err(invalid(
                "storage.max_files",
                format!("must be 1-{}", MAX_FILES_LIMIT),
            ));
        }

        const MAX_BUFFER_CAPACITY: usize = 10_000_000;
        if self.buffer.capacity == 0 || self.buffer.capacity > MAX_BUFFER_CAPACITY {
            return Err(invalid(
                "buffer.capacity",
                format!("must be 1-{}", MAX_BUFFER_CAPACITY),
            ));
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is supported".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ViewerError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// syslog 수신 설정
///
/// UDP와 TCP는 같은 포트 번호를 공유합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// 바인드 호스트
    pub host: String,
    /// 수신 포트 (UDP, TCP 공통)
    pub port: u16,
    /// 메시지 최대 크기 (바이트). TCP에서 더 긴 줄은 잘라서 저장
    pub max_message_size: usize,
    /// TCP 최대 동시 연결 수
    pub max_connections: usize,
}

impl SyslogConfig {
    /// `host:port` 형식의 바인드 주소
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 514,
            max_message_size: 65535,
            max_connections: 1024,
        }
    }
}

/// 웹 화면 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// 웹 화면 포트
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// 로그 파일 저장/회전 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 로그 디렉토리 (활성 파일은 `syslog.jsonl`)
    pub log_dir: PathBuf,
    /// 회전 기준 크기 (MB)
    pub max_size_mb: u64,
    /// 보존할 회전 세대 수
    pub max_files: usize,
    /// 매 append 후 `sync_data` 호출 여부
    pub fsync: bool,
}

impl StorageConfig {
    /// 회전 기준 크기 (바이트)
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// 활성 로그 파일 경로
    pub fn active_path(&self) -> PathBuf {
        self.log_dir.join(ACTIVE_FILE_NAME)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            max_size_mb: 100,
            max_files: 10,
            fsync: false,
        }
    }
}

/// 최근 로그 버퍼 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 메모리에 유지할 최근 레코드 수
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스너 주소
    pub listen_addr: String,
    /// 리스너 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse {} from env var, ignoring",
                type_name
            ),
        }
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = ViewerConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.syslog.port, 514);
        assert_eq!(config.syslog.host, "0.0.0.0");
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.storage.max_size_mb, 100);
        assert_eq!(config.storage.max_files, 10);
        assert_eq!(config.buffer.capacity, 1000);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        ViewerConfig::default().validate().unwrap();
    }

    #[test]
    fn storage_paths_and_sizes() {
        let storage = StorageConfig {
            log_dir: PathBuf::from("/var/lib/syslog-viewer"),
            max_size_mb: 2,
            ..Default::default()
        };
        assert_eq!(storage.max_size_bytes(), 2 * 1024 * 1024);
        assert_eq!(
            storage.active_path(),
            PathBuf::from("/var/lib/syslog-viewer/syslog.jsonl")
        );
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[syslog]
port = 5514

[storage]
max_files = 3
"#;
        let config = ViewerConfig::parse(toml).unwrap();
        assert_eq!(config.syslog.port, 5514);
        assert_eq!(config.syslog.host, "0.0.0.0");
        assert_eq!(config.storage.max_files, 3);
        assert_eq!(config.storage.max_size_mb, 100);
        assert_eq!(config.syslog.bind_addr(), "0.0.0.0:5514");
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = ViewerConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            ViewerError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_rotation_limits() {
        let mut config = ViewerConfig::default();
        config.storage.max_size_mb = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_size_mb"));

        let mut config = ViewerConfig::default();
        config.storage.max_files = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_files"));
    }

    #[test]
    fn validate_rejects_zero_buffer_capacity() {
        let mut config = ViewerConfig::default();
        config.buffer.capacity = 0;
        assert!(config.validate().unwrap_err().to_string().contains("buffer.capacity"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = ViewerConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().unwrap_err().to_string().contains("log_format"));
    }

    #[test]
    #[serial]
    fn env_overrides_apply_to_sections() {
        // SAFETY: serial 테스트이므로 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe {
            std::env::set_var("SYSLOG_VIEWER_SYSLOG_PORT", "1514");
            std::env::set_var("SYSLOG_VIEWER_STORAGE_MAX_FILES", "4");
            std::env::set_var("SYSLOG_VIEWER_STORAGE_LOG_DIR", "/tmp/sv-logs");
        }
        let mut config = ViewerConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("SYSLOG_VIEWER_SYSLOG_PORT");
            std::env::remove_var("SYSLOG_VIEWER_STORAGE_MAX_FILES");
            std::env::remove_var("SYSLOG_VIEWER_STORAGE_LOG_DIR");
        }
        assert_eq!(config.syslog.port, 1514);
        assert_eq!(config.storage.max_files, 4);
        assert_eq!(config.storage.log_dir, PathBuf::from("/tmp/sv-logs"));
    }

    #[test]
    #[serial]
    fn env_override_unparsable_keeps_original() {
        // SAFETY: serial 테스트이므로 다른 테스트와 환경변수를 공유하지 않습니다.
        unsafe { std::env::set_var("SYSLOG_VIEWER_SYSLOG_PORT", "not-a-port") };
        let mut config = ViewerConfig::default();
        config.apply_env_overrides();
        unsafe { std::env::remove_var("SYSLOG_VIEWER_SYSLOG_PORT") };
        assert_eq!(config.syslog.port, 514);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = ViewerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = ViewerConfig::parse(&toml_str).unwrap();
        assert_eq!(config.storage.log_dir, parsed.storage.log_dir);
        assert_eq!(config.syslog.port, parsed.syslog.port);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = ViewerConfig::from_file("/nonexistent/path/syslog-viewer.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ViewerError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syslog-viewer.toml");
        tokio::fs::write(&path, "[buffer]\ncapacity = 0\n").await.unwrap();
        let err = ViewerConfig::from_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("buffer.capacity"));
    }
}
