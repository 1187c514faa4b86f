//! 수집 파이프라인 설정
//!
//! [`IngestConfig`]는 core의 [`ViewerConfig`](syslog_viewer_core::config::ViewerConfig)에서
//! 수집/버퍼/저장소에 필요한 값만 모은 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use syslog_viewer_core::config::ViewerConfig;
//! use syslog_viewer_ingest::config::IngestConfig;
//!
//! let core_config = ViewerConfig::default();
//! let config = IngestConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use syslog_viewer_core::config::{ROTATION_CHECK_INTERVAL, ViewerConfig};

use crate::error::IngestError;
use crate::store::StoreConfig;

/// 수집 파이프라인 설정
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// 바인드 호스트
    pub host: String,
    /// 수신 포트 (UDP, TCP 공통). 0이면 UDP가 받은 임시 포트를 TCP도 사용
    pub port: u16,
    /// 메시지 최대 크기 (바이트)
    pub max_message_size: usize,
    /// TCP 최대 동시 연결 수
    pub max_connections: usize,
    /// 로그 디렉토리
    pub log_dir: PathBuf,
    /// 회전 기준 크기 (바이트)
    pub max_size_bytes: u64,
    /// 보존할 회전 세대 수
    pub max_files: usize,
    /// 매 append 후 `sync_data` 호출 여부
    pub fsync: bool,
    /// 최근 로그 버퍼 용량
    pub buffer_capacity: usize,
    /// 회전 점검 주기
    pub rotation_interval: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_core(&ViewerConfig::default())
    }
}

impl IngestConfig {
    /// core 설정에서 수집 설정을 생성합니다.
    pub fn from_core(core: &ViewerConfig) -> Self {
        Self {
            host: core.syslog.host.clone(),
            port: core.syslog.port,
            max_message_size: core.syslog.max_message_size,
            max_connections: core.syslog.max_connections,
            log_dir: core.storage.log_dir.clone(),
            max_size_bytes: core.storage.max_size_bytes(),
            max_files: core.storage.max_files,
            fsync: core.storage.fsync,
            buffer_capacity: core.buffer.capacity,
            rotation_interval: ROTATION_CHECK_INTERVAL,
        }
    }

    /// `host:port` 형식의 바인드 주소
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 저장소 설정
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            dir: self.log_dir.clone(),
            max_bytes: self.max_size_bytes,
            max_files: self.max_files,
            fsync: self.fsync,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        let checks: [(&str, bool); 6] = [
            ("host", !self.host.trim().is_empty()),
            ("max_message_size", self.max_message_size > 0),
            ("max_connections", self.max_connections > 0),
            ("max_size_bytes", self.max_size_bytes > 0),
            ("max_files", self.max_files > 0),
            ("buffer_capacity", self.buffer_capacity > 0),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(IngestError::Config {
                    field: field.to_owned(),
                    reason: "must be non-empty and greater than 0".to_owned(),
                });
            }
        }

        if self.rotation_interval.is_zero() {
            return Err(IngestError::Config {
                field: "rotation_interval".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 수집 설정 빌더
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// 기본값으로 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 바인드 호스트를 설정합니다.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// 수신 포트를 설정합니다.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// 메시지 최대 크기를 설정합니다.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// TCP 최대 동시 연결 수를 설정합니다.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// 로그 디렉토리를 설정합니다.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    /// 회전 기준 크기(바이트)를 설정합니다.
    pub fn max_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_size_bytes = bytes;
        self
    }

    /// 보존 세대 수를 설정합니다.
    pub fn max_files(mut self, files: usize) -> Self {
        self.config.max_files = files;
        self
    }

    /// 버퍼 용량을 설정합니다.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// 회전 점검 주기를 설정합니다.
    pub fn rotation_interval(mut self, interval: Duration) -> Self {
        self.config.rotation_interval = interval;
        self
    }

    /// 설정을 검증하고 `IngestConfig`를 생성합니다.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
