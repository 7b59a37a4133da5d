//! RFC 5424 syslog 파서
//!
//! 단일 레코드 전체에 앵커된 정규식으로 필드를 추출합니다.
//! 메시지 본문은 개행을 포함할 수 있습니다.
//!
//! ```text
//! <PRI>VER SP TS SP HOST SP APP SP PID SP MSGID SP MSG
//! ```

use std::sync::OnceLock;

use regex::Regex;

use loghive_core::event::ParsedFields;

/// 레코드 전체에 앵커된 RFC 5424 매처. `(?s)`로 MSG가 개행을 포함합니다.
fn matcher() -> &'static Regex {
    static MATCHER: OnceLock<Regex> = OnceLock::new();
    MATCHER.get_or_init(|| {
        let pri = r"<([0-9]{1,3})>";
        let ver = r"([0-9])";
        let ts = r"([^ ]+)";
        let host = r"([^ ]+)";
        let app = r"([^ ]+)";
        let pid = r"(-|[0-9]{1,5})";
        let msgid = r"([\w-]+)";
        let msg = r"(.+)";
        let pattern = format!(r"(?s)^{pri}{ver} {ts} {host} {app} {pid} {msgid} {msg}$");
        // 패턴은 컴파일 타임 상수의 조합이므로 실패하지 않음
        Regex::new(&pattern).unwrap_or_else(|e| panic!("rfc5424 matcher: {e}"))
    })
}

/// RFC 5424 파서
///
/// `pid`는 원본 토큰이 `-`이면 0이고, `message_id`는 `-`를 그대로
/// 보존합니다. 형태가 맞지 않거나 숫자 필드가 숫자가 아니면 결과
/// 없음이며 해당 레코드는 폐기됩니다.
pub struct Rfc5424Parser;

impl Rfc5424Parser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    /// 레코드 하나를 파싱합니다.
    pub fn parse(&self, record: &str) -> Option<ParsedFields> {
        let caps = matcher().captures(record)?;

        let priority: i32 = caps.get(1)?.as_str().parse().ok()?;
        let version: i32 = caps.get(2)?.as_str().parse().ok()?;
        let pid_token = caps.get(6)?.as_str();
        let pid: i32 = if pid_token == "-" {
            0
        } else {
            pid_token.parse().ok()?
        };

        Some(ParsedFields {
            priority,
            version,
            timestamp: caps.get(3)?.as_str().to_owned(),
            host: caps.get(4)?.as_str().to_owned(),
            app: caps.get(5)?.as_str().to_owned(),
            pid,
            message_id: caps.get(7)?.as_str().to_owned(),
            message: caps.get(8)?.as_str().to_owned(),
        })
    }
}

impl Default for Rfc5424Parser {
    fn default() -> Self {
        Self::new()
    }
}
