//! 수신 이벤트 — 인덱싱 파이프라인의 기본 단위
//!
//! 수집기가 프레이밍/파싱을 마친 한 줄의 로그가 하나의 [`Event`]가 됩니다.
//! 모든 이벤트는 프로세스 전역 시퀀스 카운터에서 번호를 받아
//! 수신 순서가 전역적으로 단조 증가합니다.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};

/// 프로세스 전역 시퀀스 카운터를 반환합니다.
///
/// 최초 접근 시점의 Unix 나노초 타임스탬프로 초기화됩니다.
/// 재시작 후에도 같은 벽시계 나노초 안에서 ID가 겹치지 않고,
/// 시퀀스 순서가 물리 시간과 일관되게 유지됩니다.
fn sequence_counter() -> &'static AtomicU64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let seed = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        AtomicU64::new(seed as u64)
    })
}

/// 다음 시퀀스 번호를 발급합니다. 프로세스 수명 내에서 유일합니다.
pub fn next_sequence() -> u64 {
    sequence_counter().fetch_add(1, Ordering::Relaxed)
}

/// RFC 5424 파싱 결과
///
/// 파서가 레코드에서 추출한 구조화 필드입니다. `pid`는 원본 토큰이
/// `-`인 경우 0, `message_id`는 `-`를 그대로 보존합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFields {
    /// PRI 값 (0-999, 문법상 세 자리까지 허용)
    pub priority: i32,
    /// 프로토콜 버전 (한 자리)
    pub version: i32,
    /// 타임스탬프 원문 (가공하지 않은 텍스트)
    pub timestamp: String,
    /// 호스트명
    pub host: String,
    /// 애플리케이션명
    pub app: String,
    /// 프로세스 ID (`-`이면 0)
    pub pid: i32,
    /// 메시지 ID (`-` 보존)
    pub message_id: String,
    /// 메시지 본문 (개행 포함 가능)
    pub message: String,
}

/// 수신된 로그 이벤트
///
/// `text`는 delimiter가 잘라낸 원본 그대로의 한 레코드이며,
/// 검색 결과로 바이트 단위 동일하게 반환됩니다.
#[derive(Debug, Clone)]
pub struct Event {
    /// 원본 레코드 텍스트
    pub text: String,
    /// 파싱에 성공한 경우 구조화 필드
    pub parsed: Option<ParsedFields>,
    /// 수신 시각 (UTC)
    pub reception_time: DateTime<Utc>,
    /// 전역 시퀀스 번호
    pub sequence: u64,
    /// 송신자 주소 (IP:포트)
    pub source_addr: String,

    /// 기준 시각 캐시 — 최초 접근 시 한 번만 계산
    reference_time: OnceLock<DateTime<Utc>>,
}

impl Event {
    /// 새 이벤트를 생성합니다. 수신 시각은 현재 UTC, 시퀀스는 전역 카운터에서 발급됩니다.
    pub fn new(
        text: impl Into<String>,
        parsed: Option<ParsedFields>,
        source_addr: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            parsed,
            reception_time: Utc::now(),
            sequence: next_sequence(),
            source_addr: source_addr.into(),
            reference_time: OnceLock::new(),
        }
    }

    /// 수신 시각과 시퀀스를 직접 지정하여 이벤트를 생성합니다.
    ///
    /// 재현 가능한 테스트와 벤치마크에서 사용합니다.
    pub fn with_reception(
        text: impl Into<String>,
        parsed: Option<ParsedFields>,
        source_addr: impl Into<String>,
        reception_time: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        Self {
            text: text.into(),
            parsed,
            reception_time,
            sequence,
            source_addr: source_addr.into(),
            reference_time: OnceLock::new(),
        }
    }

    /// 이벤트의 기준 시각을 반환합니다.
    ///
    /// 파싱된 `timestamp` 필드가 RFC 3339로 해석되면 그 시각을,
    /// 아니면 수신 시각을 사용합니다. 결과는 최초 호출 시 캐시됩니다.
    /// 기준 시각은 이벤트를 인덱스에 라우팅하는 키입니다.
    pub fn reference_time(&self) -> DateTime<Utc> {
        *self.reference_time.get_or_init(|| match &self.parsed {
            Some(fields) => DateTime::parse_from_rfc3339(&fields.timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(self.reception_time),
            None => self.reception_time,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event[{}] source={} len={}",
            self.sequence,
            self.source_addr,
            self.text.len(),
        )
    }
}
