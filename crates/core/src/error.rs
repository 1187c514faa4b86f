//! 에러 타입 -- 도메인별 에러 정의
//!
//! 레코드 단위 에러([`StoreError::Write`] 등)는 호출한 수집 루프 안에서
//! 로그로 남기고 흡수합니다. 시작 시점의 바인드 실패와 설정 에러만
//! 프로세스를 종료시킵니다.

use std::path::PathBuf;

/// syslog-viewer 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 로그 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 네트워크 리스너 에러
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    /// 수집 파이프라인 생명주기 에러 (중복 시작, 태스크 실패 등)
    #[error("ingest pipeline error: {0}")]
    Pipeline(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 회전 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 활성 파일 쓰기 실패 (디스크 부족, 권한 등)
    #[error("write to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 레코드 직렬화 실패
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 회전 실패. 저장소는 회전 이전 상태로 되돌려짐
    #[error("rotation failed at {step}: {source}")]
    Rotation {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// 회전은 끝났으나 1세대 압축 실패. 비압축 1세대 파일은 보존됨
    #[error("compression of {path} failed, uncompressed generation kept: {source}")]
    Compress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 복구 읽기 실패
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 네트워크 리스너 에러
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// 포트 바인드 실패 (이미 사용 중, 권한 부족)
    #[error("failed to bind {transport} on {addr}: {source}")]
    Bind {
        transport: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 연결 수락/수신 실패
    #[error("{transport} receive error: {reason}")]
    Receive {
        transport: &'static str,
        reason: String,
    },
}
