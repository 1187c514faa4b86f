//! 수집 파이프라인 -- 리스너, 버퍼, 저장소, 회전 모니터의 생명주기를 관리합니다.
//!
//! # 내부 아키텍처
//! ```text
//! UDP listener --+
//!                +--> RecordSink --> RecentBuffer --> LogQuery
//! TCP listener --+          |
//!                           +--> RotatingStore <-- RotationMonitor (60s)
//! ```
//!
//! # 시작 순서
//! 1. `build`: 설정 검증, 로그 디렉토리 준비, 저장소 꼬리에서 버퍼 복구
//! 2. `start`: UDP 바인드 후 같은 포트로 TCP 바인드, 리스너/모니터 태스크 스폰
//!
//! # 정지 순서
//! 취소 토큰으로 모든 태스크에 신호를 보내고, 처리 중인 메시지의 저장이
//! 끝날 때까지 기다린 뒤 활성 파일을 닫습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::RecentBuffer;
use crate::collector::{RecordSink, SyslogTcpListener, SyslogUdpListener};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::monitor::RotationMonitor;
use crate::query::LogQuery;
use crate::store::RotatingStore;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 수집 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use syslog_viewer_ingest::IngestPipelineBuilder;
///
/// let mut pipeline = IngestPipelineBuilder::new().config(config).build()?;
/// pipeline.start().await?;
///
/// let result = pipeline.query().query(Some("sshd"));
///
/// pipeline.stop().await?;
/// ```
pub struct IngestPipeline {
    config: IngestConfig,
    state: PipelineState,
    buffer: Arc<RecentBuffer>,
    store: Arc<RotatingStore>,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    udp_addr: Option<SocketAddr>,
    tcp_addr: Option<SocketAddr>,
}

impl IngestPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 실행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.state == PipelineState::Running
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// 버퍼 조회 핸들을 반환합니다.
    pub fn query(&self) -> LogQuery {
        LogQuery::new(Arc::clone(&self.buffer))
    }

    /// 최근 로그 버퍼
    pub fn buffer(&self) -> &Arc<RecentBuffer> {
        &self.buffer
    }

    /// 회전 저장소
    pub fn store(&self) -> &Arc<RotatingStore> {
        &self.store
    }

    /// UDP 리스너의 실제 주소. 시작 전에는 `None`
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp_addr
    }

    /// TCP 리스너의 실제 주소. 시작 전에는 `None`
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    /// 리스너를 바인드하고 백그라운드 태스크를 시작합니다.
    ///
    /// 두 리스너 중 하나라도 바인드에 실패하면 아무 태스크도 시작하지 않고
    /// 에러를 반환합니다.
    pub async fn start(&mut self) -> Result<(), IngestError> {
        if self.state == PipelineState::Running {
            return Err(IngestError::AlreadyRunning);
        }

        tracing::info!(addr = %self.config.bind_addr(), "starting ingest pipeline");

        let sink = RecordSink::new(Arc::clone(&self.buffer), Arc::clone(&self.store));

        let udp = SyslogUdpListener::bind(
            &self.config.bind_addr(),
            sink.clone(),
            self.config.max_message_size,
        )
        .await?;
        let udp_addr = udp.local_addr()?;

        // 포트 0이면 UDP가 받은 임시 포트를 TCP도 사용
        let tcp_bind = if self.config.port == 0 {
            format!("{}:{}", self.config.host, udp_addr.port())
        } else {
            self.config.bind_addr()
        };
        let tcp = SyslogTcpListener::bind(
            &tcp_bind,
            sink,
            self.config.max_message_size,
            self.config.max_connections,
        )
        .await?;
        let tcp_addr = tcp.local_addr()?;

        let monitor = RotationMonitor::new(Arc::clone(&self.store), self.config.rotation_interval);

        // 재시작 시 이전 토큰은 이미 취소된 상태
        self.cancel = CancellationToken::new();
        self.tasks = vec![
            ("udp listener", tokio::spawn(udp.run(self.cancel.clone()))),
            ("tcp listener", tokio::spawn(tcp.run(self.cancel.clone()))),
            ("rotation monitor", tokio::spawn(monitor.run(self.cancel.clone()))),
        ];
        self.udp_addr = Some(udp_addr);
        self.tcp_addr = Some(tcp_addr);
        self.state = PipelineState::Running;

        tracing::info!(udp = %udp_addr, tcp = %tcp_addr, "ingest pipeline started");
        Ok(())
    }

    /// 모든 태스크를 정지하고 저장소를 닫습니다.
    ///
    /// 리스너는 처리 중인 메시지를 저장한 뒤 종료하므로, 반환 시점에는
    /// 수신한 모든 레코드가 활성 파일에 기록되어 있습니다.
    pub async fn stop(&mut self) -> Result<(), IngestError> {
        if self.state != PipelineState::Running {
            return Err(IngestError::NotRunning);
        }

        tracing::info!("stopping ingest pipeline");
        self.cancel.cancel();

        let mut first_error = None;
        for (name, task) in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "background task failed");
                first_error.get_or_insert(IngestError::Task(format!("{name}: {e}")));
            }
        }

        let store = Arc::clone(&self.store);
        let closed = tokio::task::spawn_blocking(move || store.close())
            .await
            .map_err(|e| IngestError::Task(e.to_string()))?;
        if let Err(e) = closed {
            tracing::error!(error = %e, "failed to close log store");
            first_error.get_or_insert(IngestError::Store(e));
        }

        self.state = PipelineState::Stopped;
        self.udp_addr = None;
        self.tcp_addr = None;
        tracing::info!(buffered = self.buffer.len(), "ingest pipeline stopped");

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// 수집 파이프라인 빌더
pub struct IngestPipelineBuilder {
    config: IngestConfig,
}

impl IngestPipelineBuilder {
    /// 기본 설정으로 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: IngestConfig::default(),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// 로그 디렉토리를 만들고 저장소의 마지막 레코드로 버퍼를 채웁니다.
    /// 복구 읽기는 블로킹 I/O이며 시작 전에 한 번만 수행됩니다.
    pub fn build(self) -> Result<IngestPipeline, IngestError> {
        self.config.validate()?;

        let store = Arc::new(RotatingStore::open(self.config.store_config())?);
        let buffer = Arc::new(RecentBuffer::recover(self.config.buffer_capacity, &store)?);

        Ok(IngestPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            buffer,
            store,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            udp_addr: None,
            tcp_addr: None,
        })
    }
}

impl Default for IngestPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
