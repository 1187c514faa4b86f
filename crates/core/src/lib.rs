//! syslog-viewer 공통 크레이트
//!
//! 수집(ingest) 크레이트와 데몬이 함께 사용하는 타입을 정의합니다.
//!
//! - [`types`]: 로그 레코드([`LogRecord`])와 전송 프로토콜([`Transport`])
//! - [`error`]: 도메인 에러 타입
//! - [`config`]: `syslog-viewer.toml` 설정 모델
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ListenerError, StoreError, ViewerError};

// 설정
pub use config::ViewerConfig;

// 도메인 타입
pub use types::{LogRecord, Transport};
