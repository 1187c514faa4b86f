//! 최근 로그 버퍼 -- 용량 고정 인메모리 FIFO
//!
//! [`RecentBuffer`]는 가장 최근에 수신한 레코드를 최대 `capacity`개 보관합니다.
//! 용량을 넘으면 가장 오래된 레코드부터 밀어냅니다.
//!
//! # 순서
//! 버퍼 순서는 `push` 호출 순서(락 획득 순서)입니다. UDP와 TCP에서 들어온
//! 레코드는 도착한 순서대로 섞이며, 수신 타임스탬프로 재정렬하지 않습니다.
//!
//! # 일관성
//! `push`와 `snapshot`은 같은 락 아래에서 수행되므로 `snapshot`은 절반만
//! 적용된 `push`를 관찰하지 않습니다.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use syslog_viewer_core::metrics as m;
use syslog_viewer_core::types::LogRecord;

use crate::store::RotatingStore;
use crate::error::IngestError;

struct Inner {
    records: VecDeque<LogRecord>,
    evicted_count: u64,
    total_received: u64,
}

/// 최근 로그 버퍼
pub struct RecentBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl RecentBuffer {
    /// 빈 버퍼를 생성합니다. `capacity`가 0이면 1로 취급합니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                records: VecDeque::with_capacity(capacity.min(10_000)),
                evicted_count: 0,
                total_received: 0,
            }),
            capacity,
        }
    }

    /// 저장소의 최근 기록으로 채운 버퍼를 생성합니다.
    ///
    /// 활성 파일과 필요하면 가장 최근 회전 세대를 읽어 최대 `capacity`개를
    /// 복구합니다. 복구한 레코드는 `total_received`에 포함하지 않습니다.
    pub fn recover(capacity: usize, store: &RotatingStore) -> Result<Self, IngestError> {
        let buffer = Self::new(capacity);
        let records = store.read_recent(buffer.capacity)?;
        let recovered = records.len();
        {
            let mut inner = buffer.lock();
            inner.records.extend(records);
        }
        tracing::info!(recovered, capacity = buffer.capacity, "loaded log entries from file");
        buffer.record_size(recovered);
        Ok(buffer)
    }

    /// 레코드를 추가합니다.
    ///
    /// 버퍼가 가득 차 가장 오래된 레코드를 밀어냈으면 `true`를 반환합니다.
    pub fn push(&self, record: LogRecord) -> bool {
        let (evicted, len) = {
            let mut inner = self.lock();
            inner.total_received += 1;
            let evicted = if inner.records.len() >= self.capacity {
                inner.records.pop_front();
                inner.evicted_count += 1;
                true
            } else {
                false
            };
            inner.records.push_back(record);
            (evicted, inner.records.len())
        };

        if evicted {
            metrics::counter!(m::BUFFER_EVICTED_TOTAL).increment(1);
        }
        self.record_size(len);
        evicted
    }

    /// 현재 내용의 복사본을 오래된 것부터 반환합니다.
    ///
    /// `filter`가 주어지면 본문, 송신 주소, 표시 타임스탬프 중 하나에
    /// 대소문자 구분 없이 포함되는 레코드만 남깁니다.
    pub fn snapshot(&self, filter: Option<&str>) -> Vec<LogRecord> {
        let records: Vec<LogRecord> = self.lock().records.iter().cloned().collect();
        apply_filter(records, filter)
    }

    /// 현재 저장된 레코드 수
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 지금까지 밀려난 레코드 수
    pub fn evicted_count(&self) -> u64 {
        self.lock().evicted_count
    }

    /// `push`로 들어온 총 레코드 수
    pub fn total_received(&self) -> u64 {
        self.lock().total_received
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_size(&self, len: usize) {
        metrics::gauge!(m::BUFFER_SIZE).set(len as f64);
    }
}

/// 공백뿐인 필터는 필터 없음으로 취급합니다.
pub(crate) fn apply_filter(records: Vec<LogRecord>, filter: Option<&str>) -> Vec<LogRecord> {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(needle) => {
            let needle = needle.to_lowercase();
            records.into_iter().filter(|r| r.matches(&needle)).collect()
        }
        None => records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use syslog_viewer_core::types::Transport;

    fn make_record(msg: &str) -> LogRecord {
        LogRecord::new("10.0.0.5", Transport::Udp, msg)
    }

    fn messages(records: &[LogRecord]) -> Vec<String> {
        records.iter().map(|r| r.raw_message.clone()).collect()
    }

    #[test]
    fn push_and_snapshot_in_arrival_order() {
        let buf = RecentBuffer::new(10);
        buf.push(make_record("log1"));
        buf.push(make_record("log2"));
        buf.push(make_record("log3"));
        assert_eq!(buf.len(), 3);
        assert_eq!(messages(&buf.snapshot(None)), vec!["log1", "log2", "log3"]);
    }

    #[test]
    fn oldest_is_evicted_at_capacity() {
        let buf = RecentBuffer::new(3);
        assert!(!buf.push(make_record("log1")));
        buf.push(make_record("log2"));
        buf.push(make_record("log3"));
        assert_eq!(buf.evicted_count(), 0);

        assert!(buf.push(make_record("log4")));
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.evicted_count(), 1);
        assert_eq!(buf.total_received(), 4);
        assert_eq!(messages(&buf.snapshot(None)), vec!["log2", "log3", "log4"]);
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let buf = RecentBuffer::new(5);
        buf.push(make_record("a"));
        let snap = buf.snapshot(None);
        buf.push(make_record("b"));
        assert_eq!(snap.len(), 1);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn filter_is_case_insensitive() {
        let buf = RecentBuffer::new(10);
        buf.push(make_record("sshd: Failed password for root"));
        buf.push(make_record("kernel: eth0 link up"));
        buf.push(LogRecord::new("192.168.7.7", Transport::Tcp, "cron started"));

        assert_eq!(messages(&buf.snapshot(Some("FAILED"))), vec!["sshd: Failed password for root"]);
        assert_eq!(messages(&buf.snapshot(Some("192.168.7"))), vec!["cron started"]);
        assert!(buf.snapshot(Some("nothing-matches")).is_empty());
    }

    #[test]
    fn blank_filter_returns_everything() {
        let buf = RecentBuffer::new(10);
        buf.push(make_record("a"));
        buf.push(make_record("b"));
        assert_eq!(buf.snapshot(Some("   ")).len(), 2);
        assert_eq!(buf.snapshot(Some("")).len(), 2);
    }

    #[test]
    fn transports_merge_in_push_order() {
        let buf = RecentBuffer::new(10);
        buf.push(LogRecord::new("10.0.0.1", Transport::Tcp, "tcp-1"));
        buf.push(LogRecord::new("10.0.0.2", Transport::Udp, "udp-1"));
        buf.push(LogRecord::new("10.0.0.1", Transport::Tcp, "tcp-2"));

        let snap = buf.snapshot(None);
        assert_eq!(messages(&snap), vec!["tcp-1", "udp-1", "tcp-2"]);
        assert_eq!(snap[1].transport, Transport::Udp);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let buf = RecentBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(make_record("a"));
        buf.push(make_record("b"));
        assert_eq!(messages(&buf.snapshot(None)), vec!["b"]);
    }

    #[test]
    fn concurrent_pushes_never_exceed_capacity() {
        let buf = std::sync::Arc::new(RecentBuffer::new(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buf = std::sync::Arc::clone(&buf);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        buf.push(make_record(&format!("t{t}-{i}")));
                        assert!(buf.len() <= 50);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buf.len(), 50);
        assert_eq!(buf.total_received(), 800);
        assert_eq!(buf.evicted_count(), 750);

        // 각 스레드의 순서는 유지됨
        let snap = buf.snapshot(None);
        for t in 0..4 {
            let prefix = format!("t{t}-");
            let seq: Vec<usize> = snap
                .iter()
                .filter_map(|r| r.raw_message.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert!(seq.windows(2).all(|w| w[0] < w[1]));
        }
    }

    proptest! {
        #[test]
        fn keeps_exactly_last_min_n_pushes(capacity in 1usize..40, total in 0usize..120) {
            let buf = RecentBuffer::new(capacity);
            for i in 0..total {
                buf.push(make_record(&i.to_string()));
                prop_assert!(buf.len() <= capacity);
            }
            let expected: Vec<String> = (total.saturating_sub(capacity)..total)
                .map(|i| i.to_string())
                .collect();
            prop_assert_eq!(messages(&buf.snapshot(None)), expected);
        }
    }
}
