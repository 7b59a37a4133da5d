//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `loghive_`
//! - 모듈명: `ingest_`, `batch_`, `engine_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 프로토콜 레이블 키 (tcp, udp)
pub const LABEL_PROTOCOL: &str = "protocol";

/// 파서 형식 레이블 키 (rfc5424, json)
pub const LABEL_FORMAT: &str = "format";

// ─── Ingest 메트릭 ──────────────────────────────────────────────────

/// Ingest: 수집기가 수신한 이벤트 수 (counter, label: protocol)
pub const INGEST_EVENTS_RECEIVED_TOTAL: &str = "loghive_ingest_events_received_total";

/// Ingest: 파싱 실패로 폐기된 레코드 수 (counter, label: format)
pub const INGEST_PARSE_ERRORS_TOTAL: &str = "loghive_ingest_parse_errors_total";

/// Ingest: 프레이밍 에러 수 (counter)
pub const INGEST_FRAMING_ERRORS_TOTAL: &str = "loghive_ingest_framing_errors_total";

/// Ingest: 읽기 데드라인 초과 수 (counter)
pub const INGEST_READ_TIMEOUTS_TOTAL: &str = "loghive_ingest_read_timeouts_total";

/// Ingest: 현재 활성 TCP 연결 수 (gauge)
pub const INGEST_ACTIVE_CONNECTIONS: &str = "loghive_ingest_active_connections";

// ─── Batcher 메트릭 ─────────────────────────────────────────────────

/// Batcher: 성공적으로 인덱싱된 배치 수 (counter)
pub const BATCH_INDEXED_TOTAL: &str = "loghive_batch_indexed_total";

/// Batcher: 인덱싱에 실패한 배치 수 (counter)
pub const BATCH_INDEX_ERRORS_TOTAL: &str = "loghive_batch_index_errors_total";

/// Batcher: 타이머 만료로 트리거된 플러시 수 (counter)
pub const BATCH_TIMEOUTS_TOTAL: &str = "loghive_batch_timeouts_total";

/// Batcher: 인덱싱된 이벤트 수 (counter)
pub const EVENTS_INDEXED_TOTAL: &str = "loghive_events_indexed_total";

// ─── Engine 메트릭 ──────────────────────────────────────────────────

/// Engine: 수신한 검색 쿼리 수 (counter)
pub const ENGINE_QUERIES_TOTAL: &str = "loghive_engine_queries_total";

/// Engine: 검색으로 반환한 문서 수 (counter)
pub const ENGINE_DOCS_RETRIEVED_TOTAL: &str = "loghive_engine_docs_retrieved_total";

/// Engine: 파싱 불가 쿼리 수 (counter)
pub const ENGINE_QUERY_ERRORS_TOTAL: &str = "loghive_engine_query_errors_total";

/// Engine: 현재 열려 있는 인덱스 수 (gauge)
pub const ENGINE_INDEXES_OPEN: &str = "loghive_engine_indexes_open";

/// Engine: 보존 기간 검사 실행 수 (counter)
pub const RETENTION_RUNS_TOTAL: &str = "loghive_engine_retention_runs_total";

/// Engine: 보존 기간 만료로 삭제된 인덱스 수 (counter)
pub const RETENTION_DELETIONS_TOTAL: &str = "loghive_engine_retention_deletions_total";

/// Engine: 삭제에 실패한 인덱스 수 (counter, 다음 주기에 재시도)
pub const RETENTION_FAILURES_TOTAL: &str = "loghive_engine_retention_failures_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `loghive-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Ingest
    describe_counter!(
        INGEST_EVENTS_RECEIVED_TOTAL,
        "Total number of events received by the collectors"
    );
    describe_counter!(
        INGEST_PARSE_ERRORS_TOTAL,
        "Total number of records discarded because parsing failed"
    );
    describe_counter!(
        INGEST_FRAMING_ERRORS_TOTAL,
        "Total number of delimiter framing errors"
    );
    describe_counter!(
        INGEST_READ_TIMEOUTS_TOTAL,
        "Total number of per-read deadline expirations on TCP connections"
    );
    describe_gauge!(
        INGEST_ACTIVE_CONNECTIONS,
        "Number of currently active TCP collector connections"
    );

    // Batcher
    describe_counter!(
        BATCH_INDEXED_TOTAL,
        "Total number of batches successfully handed to the engine"
    );
    describe_counter!(
        BATCH_INDEX_ERRORS_TOTAL,
        "Total number of batches the engine failed to index"
    );
    describe_counter!(
        BATCH_TIMEOUTS_TOTAL,
        "Total number of batch flushes triggered by timer expiry"
    );
    describe_counter!(
        EVENTS_INDEXED_TOTAL,
        "Total number of events successfully indexed"
    );

    // Engine
    describe_counter!(
        ENGINE_QUERIES_TOTAL,
        "Total number of search queries received"
    );
    describe_counter!(
        ENGINE_DOCS_RETRIEVED_TOTAL,
        "Total number of documents returned by searches"
    );
    describe_counter!(
        ENGINE_QUERY_ERRORS_TOTAL,
        "Total number of queries rejected by the query parser"
    );
    describe_gauge!(ENGINE_INDEXES_OPEN, "Number of currently open indexes");
    describe_counter!(
        RETENTION_RUNS_TOTAL,
        "Total number of retention enforcement runs"
    );
    describe_counter!(
        RETENTION_DELETIONS_TOTAL,
        "Total number of indexes deleted by retention enforcement"
    );
    describe_counter!(
        RETENTION_FAILURES_TOTAL,
        "Total number of retention deletions that failed and will be retried"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        INGEST_EVENTS_RECEIVED_TOTAL,
        INGEST_PARSE_ERRORS_TOTAL,
        INGEST_FRAMING_ERRORS_TOTAL,
        INGEST_READ_TIMEOUTS_TOTAL,
        INGEST_ACTIVE_CONNECTIONS,
        BATCH_INDEXED_TOTAL,
        BATCH_INDEX_ERRORS_TOTAL,
        BATCH_TIMEOUTS_TOTAL,
        EVENTS_INDEXED_TOTAL,
        ENGINE_QUERIES_TOTAL,
        ENGINE_DOCS_RETRIEVED_TOTAL,
        ENGINE_QUERY_ERRORS_TOTAL,
        ENGINE_INDEXES_OPEN,
        RETENTION_RUNS_TOTAL,
        RETENTION_DELETIONS_TOTAL,
        RETENTION_FAILURES_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_loghive_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("loghive_"),
                "Metric '{}' does not start with 'loghive_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            if name.ends_with("_total") {
                continue;
            }
            // gauge는 _total 접미어가 없어야 함
            assert!(
                *name == INGEST_ACTIVE_CONNECTIONS || *name == ENGINE_INDEXES_OPEN,
                "Unexpected non-counter metric '{}'",
                name
            );
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않아도 panic하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_PROTOCOL, LABEL_FORMAT] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
