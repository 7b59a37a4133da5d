//! 엔진 — 열린 인덱스들의 소유자이자 보존 기간 집행자
//!
//! 엔진은 reader-writer 락으로 보호되는 인덱스 정렬 목록을 가집니다.
//! 색인 경로는 읽기 락을, 인덱스 생성과 보존 기간 집행은 쓰기 락을
//! 잡습니다. 기준 시각이 어느 인덱스에도 속하지 않는 이벤트를 만나면
//! 읽기 락을 놓고 쓰기 락을 잡은 뒤 재확인(double-check)하고 생성합니다.
//!
//! 정렬 기준: 종료 시각 내림차순, 같으면 시작 시각 내림차순.
//! 목록의 첫 인덱스가 가장 최신 범위를 담당합니다.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use metrics::{counter, gauge};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use loghive_core::error::LoghiveError;
use loghive_core::event::Event;
use loghive_core::metrics as metric_names;
use loghive_core::pipeline::EventIndexer;
use loghive_query::{Expr, Parser};

use crate::error::EngineError;
use crate::index::{Index, IndexableEvent};

/// 새 인덱스의 기본 샤드 수
pub const DEFAULT_NUM_SHARDS: usize = 16;

/// 기본 인덱스 파티션 폭
pub const DEFAULT_INDEX_DURATION_HOURS: i64 = 24;

/// 기본 보존 기간
pub const DEFAULT_RETENTION_HOURS: i64 = 24 * 7;

/// 보존 기간 검사 주기
pub const RETENTION_CHECK_INTERVAL: std::time::Duration =
    std::time::Duration::from_secs(60 * 60);

/// 검색 쿼리의 기본 필드
const DEFAULT_SEARCH_FIELD: &str = "message";

/// 엔진 구성 옵션
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 인덱스 데이터 루트 경로
    pub path: PathBuf,
    /// 새 인덱스당 샤드 수
    pub num_shards: usize,
    /// 인덱스 파티션 폭
    pub index_duration: Duration,
    /// 보존 기간 (인덱스 종료 시각 이후 유지 기간)
    pub retention_period: Duration,
    /// 보존 기간 검사 주기
    pub retention_check_interval: std::time::Duration,
}

impl EngineOptions {
    /// 기본값으로 옵션을 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            num_shards: DEFAULT_NUM_SHARDS,
            index_duration: Duration::hours(DEFAULT_INDEX_DURATION_HOURS),
            retention_period: Duration::hours(DEFAULT_RETENTION_HOURS),
            retention_check_interval: RETENTION_CHECK_INTERVAL,
        }
    }
}

struct EngineInner {
    path: PathBuf,
    num_shards: usize,
    index_duration: Duration,
    retention_period: Duration,
    indexes: RwLock<Vec<Arc<Index>>>,
}

/// 인덱싱 엔진
pub struct Engine {
    inner: Arc<EngineInner>,
    cancel: CancellationToken,
    retention_task: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// 엔진을 엽니다.
    ///
    /// 데이터 디렉토리가 없으면 만들고, 점으로 시작하지 않는 모든 하위
    /// 디렉토리를 인덱스로 연 뒤 정렬합니다. 보존 기간 워커를 시작합니다.
    pub async fn open(options: EngineOptions) -> Result<Self, EngineError> {
        fs::create_dir_all(&options.path)?;

        let mut indexes = Vec::new();
        for entry in fs::read_dir(&options.path)? {
            let entry = entry?;
            let entry_path = entry.path();
            if !entry_path.is_dir() {
                continue;
            }
            let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let index = Index::open(&entry_path)?;
            info!(
                path = %entry_path.display(),
                shards = index.num_shards(),
                "opened index"
            );
            indexes.push(Arc::new(index));
        }
        sort_indexes(&mut indexes);
        gauge!(metric_names::ENGINE_INDEXES_OPEN).set(indexes.len() as f64);

        let inner = Arc::new(EngineInner {
            path: options.path,
            num_shards: options.num_shards,
            index_duration: options.index_duration,
            retention_period: options.retention_period,
            indexes: RwLock::new(indexes),
        });

        let cancel = CancellationToken::new();
        let retention_task = spawn_retention_worker(
            Arc::clone(&inner),
            cancel.clone(),
            options.retention_check_interval,
        );

        Ok(Self {
            inner,
            cancel,
            retention_task: Mutex::new(Some(retention_task)),
        })
    }

    /// 데이터 루트 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// 전체 인덱스의 문서 수 합을 반환합니다.
    pub async fn total(&self) -> u64 {
        let indexes = self.inner.indexes.read().await;
        indexes.iter().map(|i| i.total()).sum()
    }

    /// 현재 열린 인덱스 수를 반환합니다.
    pub async fn index_count(&self) -> usize {
        self.inner.indexes.read().await.len()
    }

    /// 이벤트 배치를 색인합니다. 모든 서브 배치가 완료될 때까지 반환하지
    /// 않습니다.
    pub async fn index(&self, events: Vec<Event>) -> Result<(), EngineError> {
        let docs: Vec<IndexableEvent> = events.into_iter().map(IndexableEvent::new).collect();

        // 1차: 읽기 락 아래에서 대상 인덱스가 없는 기준 시각을 수집
        let missing: Vec<DateTime<Utc>> = {
            let indexes = self.inner.indexes.read().await;
            docs.iter()
                .map(|d| d.event.reference_time())
                .filter(|rt| index_for(&indexes, *rt).is_none())
                .collect()
        };

        // 누락된 범위는 쓰기 락을 잡고 재확인 후 생성
        if !missing.is_empty() {
            let mut indexes = self.inner.indexes.write().await;
            for rt in missing {
                if index_for(&indexes, rt).is_none() {
                    match create_index_for_reference_time(&self.inner, &mut indexes, rt) {
                        Ok(index) => {
                            info!(
                                path = %index.path().display(),
                                shards = index.num_shards(),
                                start = %index.start_time(),
                                end = %index.end_time(),
                                "created index"
                            );
                        }
                        Err(e) => {
                            // 데이터 디렉토리 I/O 장애 또는 계약 위반.
                            // 이 지점의 실패는 복구 불가능한 것으로 취급한다.
                            panic!("failed to create index for {rt}: {e}");
                        }
                    }
                }
            }
            gauge!(metric_names::ENGINE_INDEXES_OPEN).set(indexes.len() as f64);
        }

        // 2차: 읽기 락 아래에서 인덱스별 서브 배치로 나누고 병렬 색인
        let indexes = self.inner.indexes.read().await;

        let mut sub_batches: Vec<(Arc<Index>, Vec<IndexableEvent>)> = Vec::new();
        for doc in docs {
            let rt = doc.event.reference_time();
            let Some(index) = index_for(&indexes, rt) else {
                // 쓰기 락 구간에서 생성을 보장했으므로 도달 불가
                return Err(EngineError::Task(format!(
                    "no index for reference time {rt}"
                )));
            };
            match sub_batches
                .iter_mut()
                .find(|(existing, _)| Arc::ptr_eq(existing, &index))
            {
                Some((_, batch)) => batch.push(doc),
                None => sub_batches.push((index, vec![doc])),
            }
        }

        let mut tasks = Vec::with_capacity(sub_batches.len());
        for (index, batch) in sub_batches {
            tasks.push(tokio::spawn(async move { index.index(batch).await }));
        }
        for task in tasks {
            task.await.map_err(|e| EngineError::Task(e.to_string()))??;
        }
        Ok(())
    }

    /// 검색을 수행합니다.
    ///
    /// 쿼리 문자열을 표현식 트리로 파싱한 뒤, 인덱스를 최신 범위부터
    /// 순서대로 검색하는 생산자 태스크를 띄웁니다. 반환된 수신 채널은
    /// 깊이 1로 제한되어 소비자가 읽는 속도만큼만 문서를 뽑아 옵니다.
    /// 스트림 항목은 원본 레코드 텍스트이며, 에러 발생 시 에러를 담은
    /// 항목을 마지막으로 스트림이 끝납니다.
    pub async fn search(
        &self,
        query: &str,
    ) -> Result<mpsc::Receiver<Result<String, EngineError>>, EngineError> {
        counter!(metric_names::ENGINE_QUERIES_TOTAL).increment(1);

        let expr: Option<Expr> = Parser::new(query, DEFAULT_SEARCH_FIELD)
            .parse()
            .map_err(|e| {
                counter!(metric_names::ENGINE_QUERY_ERRORS_TOTAL).increment(1);
                EngineError::Query(e.to_string())
            })?;

        // 인덱스 목록 스냅샷. 정렬 순서(최신 우선)가 곧 방문 순서다.
        let snapshot: Vec<Arc<Index>> = {
            let indexes = self.inner.indexes.read().await;
            indexes.clone()
        };

        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let Some(expr) = expr else {
                // 빈 쿼리는 빈 결과
                return;
            };

            for index in snapshot {
                debug!(path = %index.path().display(), "searching index");
                let ids = match index.search(&expr).await {
                    Ok(ids) => ids,
                    Err(e) => {
                        error!(error = %e, "search failed");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                for id in ids {
                    match index.document(&id).await {
                        Ok(bytes) => {
                            counter!(metric_names::ENGINE_DOCS_RETRIEVED_TOTAL).increment(1);
                            let text = String::from_utf8_lossy(&bytes).into_owned();
                            if tx.send(Ok(text)).await.is_err() {
                                // 소비자가 떠남
                                return;
                            }
                        }
                        Err(e) => {
                            error!(error = %e, id = %id, "document retrieval failed");
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    /// 보존 기간을 즉시 집행합니다. 만료된 인덱스를 닫고 디렉토리를
    /// 삭제하며, 삭제에 실패한 인덱스는 목록에 남겨 다음 주기에
    /// 재시도합니다.
    pub async fn enforce_retention(&self, now: DateTime<Utc>) {
        enforce_retention(&self.inner, now).await;
    }

    /// 엔진을 닫습니다.
    ///
    /// 보존 기간 워커를 중단하고 완료를 기다린 뒤 모든 인덱스를 닫습니다.
    /// 진행 중인 색인은 락 순서에 의해 먼저 완료됩니다.
    pub async fn close(&self) -> Result<(), EngineError> {
        self.cancel.cancel();
        if let Some(task) = self.retention_task.lock().await.take() {
            let _ = task.await;
        }

        let indexes = self.inner.indexes.read().await;
        for index in indexes.iter() {
            index.close()?;
        }
        info!(path = %self.inner.path.display(), "engine closed");
        Ok(())
    }
}

impl EventIndexer for Engine {
    async fn index(&self, events: Vec<Event>) -> Result<(), LoghiveError> {
        Engine::index(self, events).await.map_err(LoghiveError::from)
    }
}

/// 정렬: 종료 시각 내림차순, 같으면 시작 시각 내림차순.
fn sort_indexes(indexes: &mut [Arc<Index>]) {
    indexes.sort_by(|a, b| {
        b.end_time()
            .cmp(&a.end_time())
            .then(b.start_time().cmp(&a.start_time()))
    });
}

/// 기준 시각을 담당하는 첫 인덱스를 선형 탐색으로 찾습니다.
fn index_for(indexes: &[Arc<Index>], t: DateTime<Utc>) -> Option<Arc<Index>> {
    indexes.iter().find(|i| i.contains(t)).cloned()
}

/// 기준 시각을 파티션 폭의 배수로 내림합니다 (Unix epoch 기준).
fn truncate(t: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    let span = duration.num_nanoseconds().unwrap_or(i64::MAX);
    let nanos = t.timestamp_nanos_opt().unwrap_or_default();
    let rem = nanos.rem_euclid(span);
    Utc.timestamp_nanos(nanos - rem)
}

/// 기준 시각에 맞는 인덱스를 생성합니다. 쓰기 락 아래에서 호출해야 합니다.
///
/// 시작 시각이 기존 인덱스와 충돌하면 그 인덱스의 종료 시각으로 시작
/// 시각을 옮기고, 충돌이 없어질 때까지 반복합니다. 경계 순간의 겹침은
/// 맞닿되 동일하지 않은 범위를 만들 수 있습니다.
fn create_index_for_reference_time(
    inner: &EngineInner,
    indexes: &mut Vec<Arc<Index>>,
    rt: DateTime<Utc>,
) -> Result<Arc<Index>, EngineError> {
    let mut start = truncate(rt, inner.index_duration);
    let end = start + inner.index_duration;

    loop {
        let collision = indexes
            .iter()
            .find(|i| i.start_time() == start)
            .map(|i| i.end_time());
        match collision {
            Some(colliding_end) => {
                start = colliding_end;
                assert!(start <= end, "new start time after end time");
            }
            None => break,
        }
    }

    let index = Arc::new(Index::create(
        &inner.path,
        start,
        end,
        inner.num_shards,
    )?);
    indexes.push(Arc::clone(&index));
    sort_indexes(indexes);
    Ok(index)
}

/// 만료 인덱스를 삭제합니다. 닫은 뒤 디렉토리를 재귀 삭제합니다.
fn delete_index(index: &Arc<Index>) -> Result<(), EngineError> {
    index.close()?;
    fs::remove_dir_all(index.path())?;
    Ok(())
}

async fn enforce_retention(inner: &EngineInner, now: DateTime<Utc>) {
    let mut indexes = inner.indexes.write().await;

    let mut kept = Vec::with_capacity(indexes.len());
    for index in indexes.drain(..) {
        if !index.expired(now, inner.retention_period) {
            kept.push(index);
            continue;
        }

        match delete_index(&index) {
            Ok(()) => {
                info!(path = %index.path().display(), "retention enforcement deleted index");
                counter!(metric_names::RETENTION_DELETIONS_TOTAL).increment(1);
            }
            Err(e) => {
                // 목록에 남겨 다음 주기에 재시도한다
                warn!(
                    path = %index.path().display(),
                    error = %e,
                    "retention enforcement failed to delete index"
                );
                counter!(metric_names::RETENTION_FAILURES_TOTAL).increment(1);
                kept.push(index);
            }
        }
    }
    *indexes = kept;
    gauge!(metric_names::ENGINE_INDEXES_OPEN).set(indexes.len() as f64);
}

fn spawn_retention_worker(
    inner: Arc<EngineInner>,
    cancel: CancellationToken,
    check_interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // 첫 틱은 즉시 발화하므로 소비하고 시작
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("retention worker received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    info!("retention enforcement commencing");
                    counter!(metric_names::RETENTION_RUNS_TOTAL).increment(1);
                    enforce_retention(&inner, Utc::now()).await;
                }
            }
        }
    })
}
