//! 회전 모니터 -- 활성 파일 크기를 주기적으로 점검해 회전을 실행합니다.
//!
//! 점검과 append가 경합하면 레코드 한 줄만큼 늦거나 이르게 회전할 수 있습니다.
//! 기준 크기는 근사값이므로 허용합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::IngestError;
use crate::store::{RotatingStore, RotationOutcome};

/// 회전 모니터
pub struct RotationMonitor {
    store: Arc<RotatingStore>,
    interval: Duration,
}

impl RotationMonitor {
    /// 새 모니터를 생성합니다.
    pub fn new(store: Arc<RotatingStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// 점검 주기
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 크기를 한 번 점검하고 기준 크기 이상이면 회전합니다.
    pub async fn check_once(&self) -> Result<RotationOutcome, IngestError> {
        let store = Arc::clone(&self.store);
        let outcome = tokio::task::spawn_blocking(move || store.rotate())
            .await
            .map_err(|e| IngestError::Task(e.to_string()))??;
        Ok(outcome)
    }

    /// 취소될 때까지 주기적으로 점검합니다. 첫 점검은 한 주기 뒤에 합니다.
    ///
    /// 회전 에러는 로그만 남기고 다음 주기에 다시 점검합니다.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs_f64(), "log rotation monitor started");
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.check_once().await {
                        Ok(RotationOutcome::Skipped { size }) => trace!(size, "rotation not needed"),
                        Ok(RotationOutcome::Rotated { size, compressed }) => {
                            debug!(size, file = %compressed.display(), "rotation triggered by monitor");
                        }
                        Err(e) => error!(error = %e, "error during log rotation"),
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("rotation monitor received shutdown signal");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use syslog_viewer_core::types::{LogRecord, Transport};

    fn store_in(dir: &std::path::Path, max_bytes: u64, max_files: usize) -> Arc<RotatingStore> {
        Arc::new(
            RotatingStore::open(StoreConfig {
                dir: dir.to_path_buf(),
                max_bytes,
                max_files,
                fsync: false,
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn check_once_skips_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), 1024 * 1024, 2);
        store
            .append(&LogRecord::new("127.0.0.1", Transport::Udp, "tiny"))
            .unwrap();
        let monitor = RotationMonitor::new(Arc::clone(&store), Duration::from_secs(60));
        assert!(matches!(
            monitor.check_once().await.unwrap(),
            RotationOutcome::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn run_rotates_once_per_threshold_crossing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), 256, 3);
        for i in 0..10 {
            store
                .append(&LogRecord::new("127.0.0.1", Transport::Udp, format!("line {i}")))
                .unwrap();
        }

        let cancel = CancellationToken::new();
        let monitor = RotationMonitor::new(Arc::clone(&store), Duration::from_millis(20));
        let task = tokio::spawn(monitor.run(cancel.clone()));

        for _ in 0..200 {
            if store.generation_path(1, true).exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // 여러 주기가 지나도 추가 회전은 없음
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        task.await.unwrap();

        assert!(store.generation_path(1, true).exists());
        assert!(!store.generation_path(2, true).exists());
        assert_eq!(store.current_size().unwrap(), 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), 1024, 2);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(RotationMonitor::new(store, Duration::from_secs(3600)).run(cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
