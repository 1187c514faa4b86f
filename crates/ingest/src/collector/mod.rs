//! syslog 수집 모듈 -- UDP/TCP로 수신한 메시지를 레코드로 만듭니다.
//!
//! # 수집 소스
//! - [`SyslogUdpListener`]: 데이터그램 하나가 레코드 하나
//! - [`SyslogTcpListener`]: 연결마다 개행으로 구분된 메시지 스트림
//!
//! # 아키텍처
//! 각 리스너는 자체 tokio 태스크에서 실행되며, 만든 레코드를 [`RecordSink`]에
//! 넘깁니다. `RecordSink`는 버퍼에 추가한 뒤 저장소에 기록하고, 기록이 끝나야
//! 다음 메시지를 처리하므로 연결(소켓)별 순서가 끝까지 유지됩니다.
//!
//! 공백만 있는 메시지(빈 데이터그램, TCP의 빈 줄)는 두 프로토콜 모두 버립니다.

pub mod syslog_tcp;
pub mod syslog_udp;

pub use syslog_tcp::SyslogTcpListener;
pub use syslog_udp::SyslogUdpListener;

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, error, warn};

use syslog_viewer_core::metrics as m;
use syslog_viewer_core::types::{LogRecord, Transport};

use crate::buffer::RecentBuffer;
use crate::error::IngestError;
use crate::store::RotatingStore;

/// 레코드를 버퍼와 저장소로 전달하는 공유 핸들
#[derive(Clone)]
pub struct RecordSink {
    buffer: Arc<RecentBuffer>,
    store: Arc<RotatingStore>,
}

impl RecordSink {
    /// 새 싱크를 생성합니다.
    pub fn new(buffer: Arc<RecentBuffer>, store: Arc<RotatingStore>) -> Self {
        Self { buffer, store }
    }

    /// 수신한 바이트를 레코드로 만들어 전달합니다.
    ///
    /// 공백만 남는 메시지는 기록하지 않고 `false`를 반환합니다.
    pub async fn ingest_bytes(&self, peer: &str, transport: Transport, payload: &[u8]) -> bool {
        let message = match decode_message(peer, payload) {
            Ok(text) => text,
            Err((text, err)) => {
                debug!(error = %err, transport = %transport, "stored message with replaced bytes");
                text
            }
        };
        if message.trim().is_empty() {
            debug!(peer = %peer, transport = %transport, "dropped blank message");
            return false;
        }
        self.ingest(LogRecord::new(peer, transport, message)).await;
        true
    }

    /// 레코드를 버퍼에 추가하고 저장소에 기록합니다.
    ///
    /// 저장소 쓰기 실패는 로그만 남깁니다. 이 경우 레코드는 버퍼에만 남습니다.
    pub async fn ingest(&self, record: LogRecord) {
        debug!(
            peer = %record.source_address,
            transport = %record.transport,
            message = %record.raw_message,
            "received syslog message"
        );
        metrics::counter!(m::RECORDS_RECEIVED_TOTAL, m::LABEL_TRANSPORT => record.transport.as_str())
            .increment(1);

        self.buffer.push(record.clone());

        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.append(&record)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to persist record, kept in buffer only"),
            Err(e) => error!(error = %e, "store append task failed"),
        }
    }
}

/// 수신 바이트를 텍스트로 변환합니다.
///
/// 끝의 CR/LF/NUL은 제거합니다. UTF-8이 아닌 바이트는 U+FFFD로 바꾸고,
/// 그 경우 바뀐 텍스트와 함께 [`IngestError::Parse`]를 돌려줍니다.
pub fn decode_message(peer: &str, payload: &[u8]) -> Result<String, (String, IngestError)> {
    let end = payload
        .iter()
        .rposition(|b| !matches!(b, b'\n' | b'\r' | 0))
        .map_or(0, |i| i + 1);
    match String::from_utf8_lossy(&payload[..end]) {
        Cow::Borrowed(text) => Ok(text.to_owned()),
        Cow::Owned(text) => {
            let err = IngestError::Parse {
                peer: peer.to_owned(),
                reason: "invalid utf-8 sequence replaced".to_owned(),
            };
            Err((text, err))
        }
    }
}
