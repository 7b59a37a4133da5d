//! 레코드 파서 — delimiter가 잘라낸 레코드를 구조화 필드로 변환
//!
//! 지원 형식은 RFC 5424 syslog와 JSON이며, 수집기 생성 시점에 하나로
//! 고정됩니다. 파싱에 실패한 레코드는 폐기되고 메트릭으로 집계됩니다.

pub mod json;
pub mod rfc5424;

pub use json::JsonParser;
pub use rfc5424::Rfc5424Parser;

use loghive_core::event::ParsedFields;
use loghive_core::metrics as metric_names;
use metrics::counter;

/// 입력 레코드 형식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// RFC 5424 syslog (기본값)
    #[default]
    Rfc5424,
    /// JSON 오브젝트 (타임스탬프 필수)
    Json,
}

impl LogFormat {
    /// 설정 문자열에서 형식을 해석합니다. 표준명과 통용명을 모두 받습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "syslog" | "rfc5424" => Some(LogFormat::Rfc5424),
            "json" | "ecma404" => Some(LogFormat::Json),
            _ => None,
        }
    }

    /// 메트릭 레이블로 쓰는 형식 이름
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Rfc5424 => "rfc5424",
            LogFormat::Json => "json",
        }
    }
}

/// 형식 고정 레코드 파서
///
/// 수집기 연결마다 하나씩 생성됩니다. 파서 상태는 연결 간에 공유되지
/// 않습니다.
pub struct RecordParser {
    format: LogFormat,
    rfc5424: Rfc5424Parser,
    json: JsonParser,
}

impl RecordParser {
    /// 지정한 형식의 파서를 생성합니다.
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            rfc5424: Rfc5424Parser::new(),
            json: JsonParser::new(),
        }
    }

    /// 파서의 형식을 반환합니다.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// 레코드를 파싱합니다. 실패하면 `None`이며 해당 레코드는 폐기
    /// 대상입니다 (메트릭 집계).
    pub fn parse(&self, record: &str) -> Option<ParsedFields> {
        let parsed = match self.format {
            LogFormat::Rfc5424 => self.rfc5424.parse(record),
            LogFormat::Json => self.json.parse(record),
        };
        if parsed.is_none() {
            counter!(
                metric_names::INGEST_PARSE_ERRORS_TOTAL,
                metric_names::LABEL_FORMAT => self.format.as_str()
            )
            .increment(1);
        }
        parsed
    }
}
