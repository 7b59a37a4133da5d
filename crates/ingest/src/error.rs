//! 수집 파이프라인 에러 타입
//!
//! [`IngestPipelineError`]는 수집 파이프라인 내부에서 발생하는 모든
//! 에러를 표현합니다. `From<IngestPipelineError> for LoghiveError`
//! 변환이 구현되어 있어 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use loghive_core::error::{IngestError, LoghiveError};

use crate::delimiter::FramingError;

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestPipelineError {
    /// 프레이밍 실패 (delimiter 상태 기계)
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// 레코드 파싱 실패
    #[error("parse error ({format}): {reason}")]
    Parse {
        /// 파서 형식 (rfc5424, json)
        format: String,
        /// 실패 사유
        reason: String,
    },

    /// 수집기 에러 (바인드, 읽기, TLS 핸드셰이크 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (tcp, udp)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// TLS 설정 에러
    #[error("tls error: {0}")]
    Tls(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestPipelineError> for LoghiveError {
    fn from(err: IngestPipelineError) -> Self {
        match err {
            IngestPipelineError::Framing(e) => IngestError::Framing(e.to_string()).into(),
            IngestPipelineError::Parse { format, reason } => {
                IngestError::Parse { format, reason }.into()
            }
            IngestPipelineError::Collector {
                source_type,
                reason,
            } => IngestError::Collector {
                source_type,
                reason,
            }
            .into(),
            IngestPipelineError::Channel(msg) => IngestError::Channel(msg).into(),
            IngestPipelineError::Tls(msg) => IngestError::Collector {
                source_type: "tcp".to_owned(),
                reason: msg,
            }
            .into(),
            IngestPipelineError::Io(e) => LoghiveError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_error_display() {
        let err = IngestPipelineError::Framing(FramingError::LengthInvalidByte);
        assert!(err.to_string().contains("length-buffer-invalid-byte"));
    }

    #[test]
    fn converts_to_loghive_error() {
        let err: LoghiveError =
            IngestPipelineError::Channel("receiver closed".to_owned()).into();
        assert!(matches!(err, LoghiveError::Ingest(_)));
    }

    #[test]
    fn collector_error_display() {
        let err = IngestPipelineError::Collector {
            source_type: "tcp".to_owned(),
            reason: "bind failed".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tcp"));
        assert!(msg.contains("bind failed"));
    }
}
