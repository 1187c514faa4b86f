//! 도메인 타입 -- 수집/저장/조회가 공유하는 로그 레코드
//!
//! [`LogRecord`]는 리스너가 생성하고 버퍼와 저장소가 소비하는 불변 값입니다.
//! 저장소에는 한 줄에 JSON 객체 하나(JSON Lines)로 직렬화됩니다.
//!
//! 이전 형식의 줄(`transport` 키가 없고 타임스탬프가 로컬 시각
//! `2024-01-15 12:00:00` 형식)도 읽을 수 있습니다. 기록은 항상 RFC 3339입니다.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// 웹 화면과 필터 매칭에 사용하는 타임스탬프 표시 형식
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 수신 프로토콜
///
/// `transport` 키가 없는 이전 형식의 레코드는 UDP로 간주합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// UDP 데이터그램 하나가 레코드 하나
    #[default]
    Udp,
    /// TCP 연결에서 개행으로 구분된 메시지
    Tcp,
}

impl Transport {
    /// 소문자 이름 (메트릭 레이블, 로그 필드용)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 로그 레코드
///
/// syslog 구조를 해석하지 않고 수신한 본문을 그대로 보관합니다.
/// 직렬화 시 키 이름은 `timestamp`, `source`, `message`, `transport` 입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 수신 시각 (UTC)
    #[serde(rename = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub received_at: DateTime<Utc>,
    /// 송신 측 주소 (IP 문자열)
    #[serde(rename = "source")]
    pub source_address: String,
    /// 수신 프로토콜
    #[serde(default)]
    pub transport: Transport,
    /// 수신한 메시지 본문
    #[serde(rename = "message")]
    pub raw_message: String,
}

impl LogRecord {
    /// 현재 시각으로 새 레코드를 생성합니다.
    pub fn new(
        source_address: impl Into<String>,
        transport: Transport,
        raw_message: impl Into<String>,
    ) -> Self {
        Self::with_timestamp(Utc::now(), source_address, transport, raw_message)
    }

    /// 지정한 수신 시각으로 레코드를 생성합니다.
    pub fn with_timestamp(
        received_at: DateTime<Utc>,
        source_address: impl Into<String>,
        transport: Transport,
        raw_message: impl Into<String>,
    ) -> Self {
        Self {
            received_at,
            source_address: source_address.into(),
            transport,
            raw_message: raw_message.into(),
        }
    }

    /// 로컬 시간대 기준 표시용 타임스탬프 (`2024-01-15 12:00:00`)
    pub fn display_timestamp(&self) -> String {
        self.received_at
            .with_timezone(&Local)
            .format(DISPLAY_TIMESTAMP_FORMAT)
            .to_string()
    }

    /// 개행으로 끝나는 JSON 한 줄로 직렬화합니다.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// JSON 한 줄에서 레코드를 복원합니다. 끝의 개행은 무시합니다.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end_matches(['\r', '\n']))
    }

    /// 소문자로 정규화된 필터가 본문, 송신 주소, 표시 타임스탬프 중
    /// 하나에 포함되는지 확인합니다.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.raw_message.to_lowercase().contains(needle_lower)
            || self.source_address.to_lowercase().contains(needle_lower)
            || self.display_timestamp().contains(needle_lower)
    }
}

/// RFC 3339를 우선 시도하고, 실패하면 로컬 시각 표시 형식으로 해석합니다.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    if let Ok(at) = DateTime::parse_from_rfc3339(&text) {
        return Ok(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(&text, DISPLAY_TIMESTAMP_FORMAT)
        .map_err(serde::de::Error::custom)?;
    // DST 전환으로 존재하지 않는 로컬 시각은 UTC로 간주
    Ok(Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc()))
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.display_timestamp(),
            self.source_address,
            self.transport,
            self.raw_message
        )
    }
}
