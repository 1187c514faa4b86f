//! syslog 수집 크레이트
//!
//! UDP/TCP로 syslog 메시지를 받아 최근 로그 버퍼와 회전 저장소에 기록하고,
//! 버퍼 조회 인터페이스를 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: UDP/TCP 리스너와 레코드 싱크
//! - [`buffer`]: 용량 고정 최근 로그 버퍼
//! - [`store`]: JSON Lines 활성 파일과 gzip 회전 세대
//! - [`monitor`]: 주기적 회전 점검
//! - [`query`]: 버퍼 조회 (웹 레이어용)
//! - [`pipeline`]: 전체 생명주기 오케스트레이션
//! - [`config`]: 수집 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! UDP/TCP listeners -> RecordSink -> RecentBuffer -> LogQuery
//!                           |
//!                      RotatingStore <- RotationMonitor
//! ```

pub mod buffer;
pub mod collector;
pub mod config;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod query;
pub mod store;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{IngestPipeline, IngestPipelineBuilder};

// 설정
pub use config::{IngestConfig, IngestConfigBuilder};

// 에러
pub use error::IngestError;

// 수집기
pub use collector::{RecordSink, SyslogTcpListener, SyslogUdpListener};

// 버퍼, 저장소, 조회
pub use buffer::RecentBuffer;
pub use monitor::RotationMonitor;
pub use query::{LogQuery, QueryResult};
pub use store::{RotatingStore, RotationOutcome, StoreConfig};
