//! 수집 크레이트 에러 타입
//!
//! [`IngestError`]는 수집 파이프라인 내부에서 발생하는 에러를 표현합니다.
//! `From<IngestError> for ViewerError` 변환이 구현되어 있어
//! 데몬에서 `?` 연산자로 전파할 수 있습니다.

use syslog_viewer_core::error::{ConfigError, ListenerError, StoreError, ViewerError};

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 수신 바이트를 텍스트로 온전히 해석하지 못함.
    /// 레코드는 대체 문자를 넣어 그대로 저장됩니다.
    #[error("parse error from {peer}: {reason}")]
    Parse {
        /// 송신 측 주소
        peer: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장소 에러 (쓰기, 회전, 복구 읽기)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 리스너 에러 (바인드, 수신)
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 이미 실행 중인 파이프라인을 다시 시작
    #[error("ingest pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지
    #[error("ingest pipeline is not running")]
    NotRunning,

    /// 백그라운드 태스크 실패
    #[error("task error: {0}")]
    Task(String),
}

impl From<IngestError> for ViewerError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Store(e) => ViewerError::Store(e),
            IngestError::Listener(e) => ViewerError::Listener(e),
            IngestError::Config { field, reason } => {
                ViewerError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => ViewerError::Pipeline(other.to_string()),
        }
    }
}
