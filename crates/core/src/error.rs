//! 에러 타입 — 도메인별 에러 정의

/// Loghive 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LoghiveError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 수집/파싱 파이프라인 에러
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// 인덱스 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 수집/파싱 파이프라인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 프레이밍 실패 (delimiter 상태 기계)
    #[error("framing error: {0}")]
    Framing(String),

    /// 레코드 파싱 실패
    #[error("parse failed ({format}): {reason}")]
    Parse { format: String, reason: String },

    /// 수집기 에러 (소켓 바인드, 읽기 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        source_type: String,
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

/// 인덱스 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 샤드 연산 실패
    #[error("shard error: {0}")]
    Shard(String),

    /// 인덱스 레이아웃/연산 실패
    #[error("index error: {0}")]
    Index(String),

    /// 쿼리 구문 거부
    #[error("{0}")]
    Query(String),

    /// 문서를 찾을 수 없음
    #[error("document {id} not found")]
    NotFound { id: String },
}
