//! TCP Syslog 리스너
//!
//! 연결마다 별도 tokio 태스크에서 개행으로 구분된 메시지를 읽습니다.
//! 한 연결의 종료나 읽기 에러는 다른 연결에 영향을 주지 않습니다.
//! 유휴 연결 타임아웃은 두지 않습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use syslog_viewer_core::error::ListenerError;
use syslog_viewer_core::metrics as m;
use syslog_viewer_core::types::Transport;

use super::RecordSink;

/// TCP Syslog 리스너
pub struct SyslogTcpListener {
    listener: TcpListener,
    sink: RecordSink,
    max_message_size: usize,
    max_connections: usize,
}

impl SyslogTcpListener {
    /// TCP 리스너를 바인드합니다. 실패하면 [`ListenerError::Bind`]를 반환합니다.
    pub async fn bind(
        addr: &str,
        sink: RecordSink,
        max_message_size: usize,
        max_connections: usize,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                transport: "tcp",
                addr: addr.to_owned(),
                source,
            })?;
        let local = listener.local_addr().ok();
        info!(addr = ?local, "syslog TCP server listening");

        Ok(Self {
            listener,
            sink,
            max_message_size: max_message_size.max(1),
            max_connections: max_connections.max(1),
        })
    }

    /// 실제 바인드된 주소
    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.listener
            .local_addr()
            .map_err(|e| ListenerError::Receive {
                transport: "tcp",
                reason: e.to_string(),
            })
    }

    /// 취소될 때까지 연결을 수락합니다.
    ///
    /// 취소되면 새 연결 수락을 멈추고, 처리 중인 연결 태스크가 현재
    /// 메시지의 저장을 마칠 때까지 기다린 뒤 반환합니다.
    pub async fn run(self, cancel: CancellationToken) {
        let connection_semaphore = Arc::new(Semaphore::new(self.max_connections));
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "TCP accept error");
                            continue;
                        }
                    };

                    let permit = match Arc::clone(&connection_semaphore).try_acquire_owned() {
                        Ok(p) => p,
                        Err(_) => {
                            warn!(peer = %addr, "max connections reached, rejecting connection");
                            metrics::counter!(m::TCP_CONNECTIONS_REJECTED_TOTAL).increment(1);
                            continue;
                        }
                    };

                    debug!(peer = %addr, "accepted connection");
                    let sink = self.sink.clone();
                    let max_message_size = self.max_message_size;
                    let cancel = cancel.clone();

                    connections.spawn(async move {
                        metrics::gauge!(m::TCP_CONNECTIONS_ACTIVE).increment(1.0);
                        handle_connection(stream, addr, sink, max_message_size, cancel).await;
                        metrics::gauge!(m::TCP_CONNECTIONS_ACTIVE).decrement(1.0);
                        drop(permit);
                    });
                }
                // 끝난 연결 태스크 정리
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = cancel.cancelled() => {
                    info!("TCP syslog listener received shutdown signal");
                    break;
                }
            }
        }

        while connections.join_next().await.is_some() {}
    }
}

/// 단일 TCP 연결을 처리합니다.
///
/// 개행으로 끝나는 줄마다 레코드 하나를 만듭니다. 연결이 닫힐 때 개행 없이
/// 남은 바이트도 레코드로 저장합니다. `max_message_size`를 넘는 줄은 잘라서
/// 저장하고 나머지는 다음 개행까지 버립니다.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    sink: RecordSink,
    max_message_size: usize,
    cancel: CancellationToken,
) {
    let peer_ip = addr.ip().to_string();
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(1024);
    let mut discarding = false;
    let read_limit = u64::try_from(max_message_size)
        .unwrap_or(u64::MAX)
        .saturating_add(1);

    loop {
        line.clear();

        let mut limited = (&mut reader).take(read_limit);
        let read = tokio::select! {
            result = limited.read_until(b'\n', &mut line) => result,
            _ = cancel.cancelled() => {
                debug!(peer = %addr, "connection handler received shutdown signal");
                break;
            }
        };

        match read {
            Ok(0) => {
                debug!(peer = %addr, "connection closed by peer");
                break;
            }
            Ok(_) => {
                let terminated = line.last() == Some(&b'\n');

                if discarding {
                    // 잘린 줄의 나머지
                    if terminated {
                        discarding = false;
                    }
                    continue;
                }

                if !terminated && line.len() > max_message_size {
                    warn!(
                        peer = %addr,
                        max = max_message_size,
                        "message exceeds max size, storing truncated"
                    );
                    line.truncate(max_message_size);
                    discarding = true;
                }

                sink.ingest_bytes(&peer_ip, Transport::Tcp, &line).await;
            }
            Err(e) => {
                warn!(peer = %addr, error = %e, "TCP read error, closing connection");
                break;
            }
        }
    }
}
