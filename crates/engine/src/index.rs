//! 인덱스 — 하나의 시간 범위를 담당하는 샤드 묶음
//!
//! 인덱스는 `[start, end)` 범위의 기준 시각을 가진 이벤트를 보관합니다.
//! 디렉토리 이름이 UTC 시작 시각(`YYYYMMDD_HHMM`)이고, `endtime` 파일이
//! 같은 형식의 종료 시각을 담습니다. 샤드 수는 생성 시점에 고정됩니다.
//!
//! 문서는 `fnv32a(id) mod N`으로 샤드에 라우팅됩니다. 해시 입력과 샤드
//! 수가 생성 후 변하지 않으므로 주어진 ID의 샤드는 영구히 같습니다.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use loghive_core::event::Event;
use loghive_query::Expr;

use crate::docid::DocId;
use crate::error::EngineError;
use crate::shard::Shard;

/// 인덱스 디렉토리/endtime 파일의 시각 형식 (UTC)
pub const INDEX_NAME_FORMAT: &str = "%Y%m%d_%H%M";

/// 종료 시각 파일 이름
const END_TIME_FILE: &str = "endtime";

/// FNV-1a 32비트 해시. 문서를 샤드에 라우팅하는 유일한 해시입니다.
fn fnv32a(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 16_777_619;

    let mut hash = OFFSET_BASIS;
    for byte in data {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// 색인 가능한 이벤트 — 이벤트와 그 문서 ID의 쌍
#[derive(Debug, Clone)]
pub struct IndexableEvent {
    /// 문서 ID (기준 시각 + 시퀀스)
    pub id: DocId,
    /// 원본 이벤트
    pub event: Event,
}

impl IndexableEvent {
    /// 이벤트에서 문서 ID를 계산하여 래핑합니다.
    pub fn new(event: Event) -> Self {
        Self {
            id: DocId::from_event(&event),
            event,
        }
    }
}

/// 시간 범위 인덱스
pub struct Index {
    path: PathBuf,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    shards: Vec<Arc<Shard>>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("path", &self.path)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("num_shards", &self.shards.len())
            .finish()
    }
}

impl Index {
    /// 새 인덱스를 생성합니다.
    ///
    /// 같은 시작 시각의 디렉토리가 이미 있으면 실패합니다. `endtime` 파일을
    /// 쓰고 `0..N-1` 샤드 디렉토리를 만듭니다.
    pub fn create(
        root: &Path,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        num_shards: usize,
    ) -> Result<Self, EngineError> {
        let name = start_time.format(INDEX_NAME_FORMAT).to_string();
        let path = root.join(&name);
        if path.exists() {
            return Err(EngineError::IndexExists {
                path: path.display().to_string(),
            });
        }
        fs::create_dir_all(&path)?;

        fs::write(
            path.join(END_TIME_FILE),
            end_time.format(INDEX_NAME_FORMAT).to_string(),
        )?;

        let mut shards = Vec::with_capacity(num_shards);
        for n in 0..num_shards {
            shards.push(Arc::new(Shard::open(&path.join(n.to_string()))?));
        }

        Ok(Self {
            path,
            start_time,
            end_time,
            shards,
        })
    }

    /// 기존 인덱스를 엽니다.
    ///
    /// 디렉토리 이름에서 시작 시각을, `endtime` 파일에서 종료 시각을
    /// 읽고, 점으로 시작하지 않는 모든 하위 디렉토리를 샤드로 엽니다.
    /// 샤드는 라우팅 안정성을 위해 번호 순으로 정렬됩니다.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let layout_err = |reason: String| EngineError::InvalidLayout {
            path: path.display().to_string(),
            reason,
        };

        if !path.is_dir() {
            return Err(layout_err("not a directory".to_owned()));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| layout_err("unreadable directory name".to_owned()))?;
        let start_time = parse_index_time(name)
            .ok_or_else(|| layout_err(format!("cannot parse start time from '{name}'")))?;

        let end_raw = fs::read_to_string(path.join(END_TIME_FILE))?;
        let end_trimmed = end_raw.trim();
        let end_time = parse_index_time(end_trimmed)
            .ok_or_else(|| layout_err(format!("cannot parse end time from '{end_trimmed}'")))?;

        let mut numbered: Vec<(usize, PathBuf)> = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();
            if !entry_path.is_dir() {
                continue;
            }
            let Some(file_name) = entry_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            let number: usize = file_name
                .parse()
                .map_err(|_| layout_err(format!("unexpected shard directory '{file_name}'")))?;
            numbered.push((number, entry_path));
        }
        numbered.sort_by_key(|(n, _)| *n);

        let mut shards = Vec::with_capacity(numbered.len());
        for (_, shard_path) in numbered {
            shards.push(Arc::new(Shard::open(&shard_path)?));
        }
        if shards.is_empty() {
            return Err(layout_err("index has no shards".to_owned()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            start_time,
            end_time,
            shards,
        })
    }

    /// 인덱스 디렉토리 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 시작 시각 (포함)
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// 종료 시각 (미포함)
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// 샤드 수
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// 기준 시각이 이 인덱스의 범위에 속하는지 확인합니다.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start_time && t < self.end_time
    }

    /// 보존 기간이 지나 만료되었는지 확인합니다.
    pub fn expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.end_time + retention < now
    }

    /// ID가 라우팅되는 샤드 번호를 반환합니다. `(id, N)`의 순수 함수입니다.
    pub fn shard_of(&self, id: &DocId) -> usize {
        fnv32a(id.as_str().as_bytes()) as usize % self.shards.len()
    }

    /// 문서 배치를 색인합니다.
    ///
    /// 배치를 샤드별 서브 배치로 나누고 병렬로 색인합니다.
    /// 모든 서브 배치가 완료된 뒤에 반환합니다.
    pub async fn index(&self, docs: Vec<IndexableEvent>) -> Result<(), EngineError> {
        let mut sub_batches: HashMap<usize, Vec<IndexableEvent>> = HashMap::new();
        for doc in docs {
            sub_batches.entry(self.shard_of(&doc.id)).or_default().push(doc);
        }

        let mut tasks = Vec::with_capacity(sub_batches.len());
        for (shard_idx, batch) in sub_batches {
            let shard = Arc::clone(&self.shards[shard_idx]);
            tasks.push(tokio::task::spawn_blocking(move || shard.index(&batch)));
        }
        for task in tasks {
            task.await.map_err(|e| EngineError::Task(e.to_string()))??;
        }
        Ok(())
    }

    /// 모든 샤드를 병렬로 검색하여 매칭 ID를 오름차순으로 반환합니다.
    ///
    /// ID 오름차순은 기준 시각 오름차순, 같은 시각에서는 시퀀스
    /// 오름차순과 같습니다.
    pub async fn search(&self, expr: &Expr) -> Result<Vec<DocId>, EngineError> {
        let mut tasks = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            let shard = Arc::clone(shard);
            let expr = expr.clone();
            tasks.push(tokio::task::spawn_blocking(move || shard.search(&expr)));
        }

        let mut ids = Vec::new();
        for task in tasks {
            let mut shard_ids = task.await.map_err(|e| EngineError::Task(e.to_string()))??;
            ids.append(&mut shard_ids);
        }
        ids.sort();
        Ok(ids)
    }

    /// ID로 원본 바이트를 조회합니다.
    pub async fn document(&self, id: &DocId) -> Result<Vec<u8>, EngineError> {
        let shard = Arc::clone(&self.shards[self.shard_of(id)]);
        let lookup_id = id.clone();
        let found = tokio::task::spawn_blocking(move || shard.document(&lookup_id))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;
        found.ok_or_else(|| EngineError::DocumentNotFound {
            id: id.to_string(),
        })
    }

    /// 인덱스의 전체 문서 수를 반환합니다.
    pub fn total(&self) -> u64 {
        self.shards.iter().map(|s| s.total()).sum()
    }

    /// 모든 샤드를 닫습니다.
    pub fn close(&self) -> Result<(), EngineError> {
        for shard in &self.shards {
            shard.close()?;
        }
        Ok(())
    }
}

/// `YYYYMMDD_HHMM` 형식의 UTC 시각을 파싱합니다.
fn parse_index_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, INDEX_NAME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn t(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn fnv32a_known_vectors() {
        // 표준 FNV-1a 32비트 테스트 벡터
        assert_eq!(fnv32a(b""), 0x811c_9dc5);
        assert_eq!(fnv32a(b"a"), 0xe40c_292c);
        assert_eq!(fnv32a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn index_name_format_roundtrip() {
        let start = t(2006, 1, 2, 15, 4);
        let formatted = start.format(INDEX_NAME_FORMAT).to_string();
        assert_eq!(formatted, "20060102_1504");
        assert_eq!(parse_index_time(&formatted), Some(start));
    }

    #[test]
    fn parse_index_time_rejects_garbage() {
        assert_eq!(parse_index_time("not_a_time"), None);
        assert_eq!(parse_index_time("20060102"), None);
        assert_eq!(parse_index_time(""), None);
    }

    #[tokio::test]
    async fn create_writes_layout() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::create(dir.path(), t(2015, 5, 5, 0, 0), t(2015, 5, 6, 0, 0), 4).unwrap();

        assert!(dir.path().join("20150505_0000").is_dir());
        let endtime = fs::read_to_string(dir.path().join("20150505_0000").join("endtime")).unwrap();
        assert_eq!(endtime, "20150506_0000");
        for n in 0..4 {
            assert!(dir.path().join("20150505_0000").join(n.to_string()).is_dir());
        }
        assert_eq!(index.num_shards(), 4);
        assert_eq!(index.total(), 0);
    }

    #[tokio::test]
    async fn create_fails_on_existing_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let _first =
            Index::create(dir.path(), t(2015, 5, 5, 0, 0), t(2015, 5, 6, 0, 0), 1).unwrap();
        let err = Index::create(dir.path(), t(2015, 5, 5, 0, 0), t(2015, 5, 7, 0, 0), 1)
            .unwrap_err();
        assert!(matches!(err, EngineError::IndexExists { .. }));
    }

    #[tokio::test]
    async fn open_restores_times_and_shards() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index =
                Index::create(dir.path(), t(2015, 5, 5, 0, 0), t(2015, 5, 6, 0, 0), 4).unwrap();
            index.close().unwrap();
        }
        // 점으로 시작하는 항목과 일반 파일은 무시되어야 함
        fs::create_dir(dir.path().join("20150505_0000").join(".hidden")).unwrap();

        let opened = Index::open(&dir.path().join("20150505_0000")).unwrap();
        assert_eq!(opened.start_time(), t(2015, 5, 5, 0, 0));
        assert_eq!(opened.end_time(), t(2015, 5, 6, 0, 0));
        assert_eq!(opened.num_shards(), 4);
    }

    #[test]
    fn contains_is_half_open() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::create(dir.path(), t(2015, 5, 5, 0, 0), t(2015, 5, 6, 0, 0), 1).unwrap();

        assert!(index.contains(t(2015, 5, 5, 0, 0)));
        assert!(index.contains(t(2015, 5, 5, 23, 59)));
        assert!(!index.contains(t(2015, 5, 6, 0, 0)));
        assert!(!index.contains(t(2015, 5, 4, 23, 59)));
    }

    #[test]
    fn expired_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::create(dir.path(), t(2015, 5, 5, 0, 0), t(2015, 5, 6, 0, 0), 1).unwrap();

        let retention = Duration::hours(24);
        // end + retention == now 는 아직 만료 아님
        assert!(!index.expired(t(2015, 5, 7, 0, 0), retention));
        assert!(index.expired(t(2015, 5, 7, 0, 1), retention));
        assert!(!index.expired(t(2015, 5, 6, 12, 0), retention));
    }

    #[test]
    fn shard_routing_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::create(dir.path(), t(2015, 5, 5, 0, 0), t(2015, 5, 6, 0, 0), 4).unwrap();

        // 같은 ID는 항상 같은 샤드로 라우팅되어야 함
        for seq in 0..100u64 {
            let id = DocId::new(1_000 + seq as i64, seq);
            let first = index.shard_of(&id);
            for _ in 0..3 {
                assert_eq!(index.shard_of(&id), first);
            }
            assert!(first < 4);
        }
    }
}
