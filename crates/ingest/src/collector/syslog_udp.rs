//! UDP Syslog 리스너
//!
//! 데이터그램 하나를 레코드 하나로 취급합니다. 송신 주소는 IP만 사용하며,
//! 본문은 해석하지 않고 텍스트로만 변환해 저장합니다.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use syslog_viewer_core::error::ListenerError;
use syslog_viewer_core::types::Transport;

use super::RecordSink;

/// UDP 데이터그램 최대 크기
const MAX_DATAGRAM_SIZE: usize = 65535;

/// UDP Syslog 리스너
///
/// [`bind`](Self::bind)에서 소켓을 열고, [`run`](Self::run)에서 취소될 때까지
/// 수신 루프를 실행합니다.
pub struct SyslogUdpListener {
    socket: UdpSocket,
    sink: RecordSink,
    recv_buffer_size: usize,
}

impl SyslogUdpListener {
    /// UDP 소켓을 바인드합니다. 실패하면 [`ListenerError::Bind`]를 반환합니다.
    pub async fn bind(
        addr: &str,
        sink: RecordSink,
        max_message_size: usize,
    ) -> Result<Self, ListenerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                transport: "udp",
                addr: addr.to_owned(),
                source,
            })?;
        let local = socket.local_addr().ok();
        info!(addr = ?local, "syslog UDP server listening");

        Ok(Self {
            socket,
            sink,
            recv_buffer_size: max_message_size.clamp(1, MAX_DATAGRAM_SIZE),
        })
    }

    /// 실제 바인드된 주소
    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.socket
            .local_addr()
            .map_err(|e| ListenerError::Receive {
                transport: "udp",
                reason: e.to_string(),
            })
    }

    /// 취소될 때까지 데이터그램을 수신합니다.
    ///
    /// 개별 수신 에러는 로그만 남기고 루프를 계속합니다.
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; self.recv_buffer_size];

        loop {
            let received = tokio::select! {
                result = self.socket.recv_from(&mut buf) => result,
                _ = cancel.cancelled() => {
                    info!("UDP syslog listener received shutdown signal");
                    break;
                }
            };

            match received {
                Ok((len, peer)) => {
                    let peer_ip = peer.ip().to_string();
                    self.sink
                        .ingest_bytes(&peer_ip, Transport::Udp, &buf[..len])
                        .await;
                }
                Err(e) => warn!(error = %e, "UDP receive error"),
            }
        }
    }
}
