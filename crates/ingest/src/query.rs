//! 조회 인터페이스 -- 웹 레이어가 호출하는 읽기 전용 조회
//!
//! 버퍼의 스냅샷만 읽으며 저장소에는 접근하지 않습니다.
//! 결과는 오래된 레코드가 먼저, 최신 레코드가 마지막입니다.

use std::sync::Arc;

use serde::Serialize;

use syslog_viewer_core::types::LogRecord;

use crate::buffer::{RecentBuffer, apply_filter};

/// 조회 결과
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// 조건에 맞는 레코드 (오래된 것부터)
    pub records: Vec<LogRecord>,
    /// 스냅샷 시점의 버퍼 전체 레코드 수
    pub total: usize,
    /// 조건에 맞는 레코드 수
    pub filtered: usize,
}

/// 버퍼 조회 핸들
#[derive(Clone)]
pub struct LogQuery {
    buffer: Arc<RecentBuffer>,
}

impl LogQuery {
    /// 새 조회 핸들을 생성합니다.
    pub fn new(buffer: Arc<RecentBuffer>) -> Self {
        Self { buffer }
    }

    /// 버퍼를 조회합니다.
    ///
    /// `filter`는 대소문자 구분 없이 본문, 송신 주소, 표시 타임스탬프에서
    /// 찾습니다. `None`이나 공백뿐인 필터는 전체를 반환합니다.
    pub fn query(&self, filter: Option<&str>) -> QueryResult {
        let snapshot = self.buffer.snapshot(None);
        let total = snapshot.len();
        let records = apply_filter(snapshot, filter);
        QueryResult {
            filtered: records.len(),
            total,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syslog_viewer_core::types::Transport;

    fn query_with(messages: &[&str]) -> LogQuery {
        let buffer = Arc::new(RecentBuffer::new(100));
        for msg in messages {
            buffer.push(LogRecord::new("172.16.0.3", Transport::Udp, *msg));
        }
        LogQuery::new(buffer)
    }

    #[test]
    fn unfiltered_query_returns_all_newest_last() {
        let query = query_with(&["a", "b", "c"]);
        let result = query.query(None);
        assert_eq!(result.total, 3);
        assert_eq!(result.filtered, 3);
        assert_eq!(result.records.last().unwrap().raw_message, "c");
    }

    #[test]
    fn filtered_query_reports_both_counts() {
        let query = query_with(&["sshd: accepted", "CRON job", "sshd: closed"]);
        let result = query.query(Some("SSHD"));
        assert_eq!(result.total, 3);
        assert_eq!(result.filtered, 2);
        assert!(result.records.iter().all(|r| r.raw_message.starts_with("sshd")));
    }

    #[test]
    fn query_does_not_mutate_buffer() {
        let buffer = Arc::new(RecentBuffer::new(10));
        buffer.push(LogRecord::new("172.16.0.3", Transport::Tcp, "x"));
        let query = LogQuery::new(Arc::clone(&buffer));
        let _ = query.query(Some("x"));
        let _ = query.query(None);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.total_received(), 1);
    }

    #[test]
    fn result_serializes_with_wire_keys() {
        let query = query_with(&["hello"]);
        let json = serde_json::to_value(query.query(None)).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["filtered"], 1);
        assert_eq!(json["records"][0]["message"], "hello");
        assert_eq!(json["records"][0]["source"], "172.16.0.3");
    }
}
