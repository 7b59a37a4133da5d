//! 문서 ID — 시간순 정렬이 보장되는 32자 hex 키
//!
//! [`DocId`]는 두 개의 64비트 빅엔디언 워드를 소문자 hex로 인코딩합니다.
//! 상위 워드는 기준 시각의 Unix 나노초, 하위 워드는 전역 시퀀스 번호입니다.
//! 고정 폭 hex이므로 문자열 사전순 비교가 (나노초, 시퀀스) 숫자 비교와
//! 정확히 일치합니다. 같은 기준 시각 안에서는 시퀀스가 순서를 정합니다.

use std::fmt;

use loghive_core::event::Event;

use crate::error::EngineError;

/// ID 문자열 길이 (16자리 hex 워드 2개)
pub const DOC_ID_LEN: usize = 32;

/// 문서 ID
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(String);

impl DocId {
    /// 기준 시각 나노초와 시퀀스 번호로 ID를 생성합니다.
    pub fn new(reference_nanos: i64, sequence: u64) -> Self {
        Self(format!("{:016x}{:016x}", reference_nanos as u64, sequence))
    }

    /// 이벤트의 기준 시각과 시퀀스로 ID를 생성합니다.
    pub fn from_event(event: &Event) -> Self {
        let nanos = event
            .reference_time()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        Self::new(nanos, event.sequence)
    }

    /// 저장된 ID 문자열을 검증하여 되돌립니다.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        if s.len() != DOC_ID_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(EngineError::InvalidLayout {
                path: String::new(),
                reason: format!("malformed document id '{s}'"),
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// ID 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// (기준 시각 나노초, 시퀀스) 워드 쌍을 복원합니다.
    pub fn words(&self) -> (u64, u64) {
        // parse()/new()가 형식을 보장하므로 실패하지 않음
        let msw = u64::from_str_radix(&self.0[..16], 16).unwrap_or_default();
        let lsw = u64::from_str_radix(&self.0[16..], 16).unwrap_or_default();
        (msw, lsw)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
