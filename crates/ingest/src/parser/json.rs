//! JSON 레코드 파서
//!
//! 한 레코드가 하나의 JSON 오브젝트입니다. `timestamp` 키는 필수이며
//! `초[.나노초]` 형태의 Unix 시각 문자열을 RFC 3339로 정규화합니다.
//! 알려진 키(`host`, `app`, `message`, `message_id`, `priority`,
//! `version`, `pid`)는 구조화 필드로 옮기고, 나머지는 원본 텍스트로만
//! 남습니다.

use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use loghive_core::event::ParsedFields;

/// JSON 파서
pub struct JsonParser;

impl JsonParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    /// 레코드 하나를 파싱합니다. `timestamp`가 없거나 해석 불가하면
    /// 결과 없음입니다.
    pub fn parse(&self, record: &str) -> Option<ParsedFields> {
        let value: Value = serde_json::from_str(record).ok()?;
        let object = value.as_object()?;

        let timestamp_raw = object.get("timestamp")?.as_str()?;
        let timestamp = normalize_timestamp(timestamp_raw)?;

        Some(ParsedFields {
            priority: int_field(object, "priority"),
            version: int_field(object, "version"),
            timestamp,
            host: str_field(object, "host"),
            app: str_field(object, "app"),
            pid: int_field(object, "pid"),
            message_id: object
                .get("message_id")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_owned(),
            message: str_field(object, "message"),
        })
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

fn str_field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned()
}

fn int_field(object: &serde_json::Map<String, Value>, key: &str) -> i32 {
    object
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or_default()
}

/// `초[.나노초]` 형태의 Unix 시각을 RFC 3339 문자열로 바꿉니다.
fn normalize_timestamp(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(2, '.');
    let secs: i64 = parts.next()?.parse().ok()?;
    let nanos: u32 = match parts.next() {
        Some(frac) => frac.parse().ok()?,
        None => 0,
    };

    let datetime = Utc.timestamp_opt(secs, nanos).single()?;
    Some(datetime.to_rfc3339_opts(SecondsFormat::Secs, true))
}
