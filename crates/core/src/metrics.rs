//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 수집 크레이트는 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `syslog_viewer_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 전송 프로토콜 레이블 키 (udp, tcp)
pub const LABEL_TRANSPORT: &str = "transport";

// ─── 수집 메트릭 ────────────────────────────────────────────────────

/// 수신한 레코드 수 (counter, label: transport)
pub const RECORDS_RECEIVED_TOTAL: &str = "syslog_viewer_records_received_total";

/// 현재 열린 TCP 연결 수 (gauge)
pub const TCP_CONNECTIONS_ACTIVE: &str = "syslog_viewer_tcp_connections_active";

/// 최대 연결 수 초과로 거부된 TCP 연결 수 (counter)
pub const TCP_CONNECTIONS_REJECTED_TOTAL: &str = "syslog_viewer_tcp_connections_rejected_total";

// ─── 버퍼 메트릭 ────────────────────────────────────────────────────

/// 최근 로그 버퍼에 있는 레코드 수 (gauge)
pub const BUFFER_SIZE: &str = "syslog_viewer_buffer_size";

/// 용량 초과로 버퍼에서 밀려난 레코드 수 (counter)
pub const BUFFER_EVICTED_TOTAL: &str = "syslog_viewer_buffer_evicted_total";

// ─── 저장소 메트릭 ──────────────────────────────────────────────────

/// 활성 파일에 기록한 레코드 수 (counter)
pub const STORE_APPENDS_TOTAL: &str = "syslog_viewer_store_appends_total";

/// 활성 파일 쓰기 실패 수 (counter)
pub const STORE_WRITE_ERRORS_TOTAL: &str = "syslog_viewer_store_write_errors_total";

/// 완료된 회전 수 (counter)
pub const STORE_ROTATIONS_TOTAL: &str = "syslog_viewer_store_rotations_total";

/// 실패한 회전 수 (counter, 압축 실패 포함)
pub const STORE_ROTATION_FAILURES_TOTAL: &str = "syslog_viewer_store_rotation_failures_total";

/// 회전 소요 시간 (histogram, 초)
pub const STORE_ROTATION_DURATION_SECONDS: &str = "syslog_viewer_store_rotation_duration_seconds";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        RECORDS_RECEIVED_TOTAL,
        "Total number of syslog records received, by transport"
    );
    describe_gauge!(
        TCP_CONNECTIONS_ACTIVE,
        "Number of currently open TCP syslog connections"
    );
    describe_counter!(
        TCP_CONNECTIONS_REJECTED_TOTAL,
        "Total number of TCP connections refused at the connection limit"
    );
    describe_gauge!(BUFFER_SIZE, "Number of records held in the recent buffer");
    describe_counter!(
        BUFFER_EVICTED_TOTAL,
        "Total number of records evicted from the recent buffer"
    );
    describe_counter!(
        STORE_APPENDS_TOTAL,
        "Total number of records appended to the active log file"
    );
    describe_counter!(
        STORE_WRITE_ERRORS_TOTAL,
        "Total number of failed appends to the active log file"
    );
    describe_counter!(STORE_ROTATIONS_TOTAL, "Total number of completed log rotations");
    describe_counter!(
        STORE_ROTATION_FAILURES_TOTAL,
        "Total number of failed or partially failed log rotations"
    );
    describe_histogram!(
        STORE_ROTATION_DURATION_SECONDS,
        "Time to rotate and compress the active log file in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        let names = [
            RECORDS_RECEIVED_TOTAL,
            TCP_CONNECTIONS_ACTIVE,
            TCP_CONNECTIONS_REJECTED_TOTAL,
            BUFFER_SIZE,
            BUFFER_EVICTED_TOTAL,
            STORE_APPENDS_TOTAL,
            STORE_WRITE_ERRORS_TOTAL,
            STORE_ROTATIONS_TOTAL,
            STORE_ROTATION_FAILURES_TOTAL,
            STORE_ROTATION_DURATION_SECONDS,
        ];
        for name in names {
            assert!(name.starts_with("syslog_viewer_"), "{name}");
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            RECORDS_RECEIVED_TOTAL,
            BUFFER_EVICTED_TOTAL,
            STORE_WRITE_ERRORS_TOTAL,
            STORE_ROTATIONS_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
