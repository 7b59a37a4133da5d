//! 인덱스 엔진 에러 타입

use loghive_core::error::{LoghiveError, StorageError};

/// 인덱스 엔진 도메인 에러
///
/// 샤드/인덱스 I/O, 레이아웃 해석, 쿼리 구문 거부를 포괄합니다.
/// `From<EngineError> for LoghiveError`가 구현되어 있어 배처와 데몬이
/// `?` 연산자로 자연스럽게 전파할 수 있습니다.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 샤드 스토어(tantivy) 에러
    #[error("shard store error: {0}")]
    Store(#[from] tantivy::TantivyError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 같은 시작 시각의 인덱스가 이미 존재함
    #[error("index already exists at {path}")]
    IndexExists { path: String },

    /// 디스크 레이아웃을 해석할 수 없음
    #[error("invalid index layout at {path}: {reason}")]
    InvalidLayout { path: String, reason: String },

    /// 닫힌 샤드에 대한 연산
    #[error("shard is closed")]
    ShardClosed,

    /// ID에 해당하는 문서가 없음
    #[error("document {id} not found")]
    DocumentNotFound { id: String },

    /// 쿼리 구문 거부 — 파서의 메시지를 그대로 전달
    #[error("{0}")]
    Query(String),

    /// 백그라운드 태스크 join 실패
    #[error("task failed: {0}")]
    Task(String),
}

impl From<EngineError> for LoghiveError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Query(msg) => StorageError::Query(msg).into(),
            EngineError::DocumentNotFound { id } => StorageError::NotFound { id }.into(),
            other => StorageError::Index(other.to_string()).into(),
        }
    }
}
