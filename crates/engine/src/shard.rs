//! 샤드 — 한 파티션을 담당하는 tantivy 전문 검색 스토어
//!
//! 샤드는 인덱스 디렉토리 아래의 번호 붙은 하위 디렉토리 하나입니다.
//! 분석된 토큰(검색용)과 원본 바이트(ID 조회용)를 함께 보관합니다.
//!
//! # 분석기
//! 기본 분석기는 정규식 `[^\W_]+`로 토큰을 자르고 소문자화합니다.
//! 밑줄은 구분자로 취급되므로 `steelhead_cloud`는 `steelhead`와 `cloud`
//! 두 토큰이 됩니다.
//!
//! # 동시성
//! 샤드 인덱싱은 단일 라이터입니다. 한 샤드에 대해 동시에 하나의
//! `index()` 호출만 허용되며, 인덱스 수준의 병렬성은 배치를 샤드별로
//! 나누는 것으로 얻습니다.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::{Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, INDEXED, STORED,
    STRING,
};
use tantivy::tokenizer::{LowerCaser, RegexTokenizer, TextAnalyzer};
use tantivy::{
    DateTime as TantivyDateTime, Index as TantivyIndex, IndexReader, IndexWriter, ReloadPolicy,
    TantivyDocument, Term,
};

use crate::docid::DocId;
use crate::error::EngineError;
use crate::index::IndexableEvent;
use crate::search;

/// 샤드당 검색에서 수집하는 최대 문서 수
pub const MAX_SEARCH_HITS: usize = 10_000;

/// 기본 분석기 등록 이름
pub(crate) const TOKENIZER_NAME: &str = "loghive_terms";

/// 토큰 분리 정규식. 밑줄은 단어 문자가 아닌 것으로 취급합니다.
const TOKEN_PATTERN: &str = r"[^\W_]+";

/// 라이터 메모리 예산 (바이트). tantivy 최소치보다 넉넉하게 잡습니다.
const WRITER_MEMORY_BUDGET: usize = 32_000_000;

/// 샤드 스키마의 필드 핸들 모음
#[derive(Debug, Clone, Copy)]
pub(crate) struct ShardFields {
    pub id: Field,
    pub message: Field,
    pub host: Field,
    pub app: Field,
    pub message_id: Field,
    pub timestamp: Field,
    pub priority: Field,
    pub version: Field,
    pub pid: Field,
    pub reference_time: Field,
    pub reception_time: Field,
    pub source: Field,
}

impl ShardFields {
    fn from_schema(schema: &Schema) -> Result<Self, EngineError> {
        Ok(Self {
            id: schema.get_field("id")?,
            message: schema.get_field("message")?,
            host: schema.get_field("host")?,
            app: schema.get_field("app")?,
            message_id: schema.get_field("message_id")?,
            timestamp: schema.get_field("timestamp")?,
            priority: schema.get_field("priority")?,
            version: schema.get_field("version")?,
            pid: schema.get_field("pid")?,
            reference_time: schema.get_field("reference_time")?,
            reception_time: schema.get_field("reception_time")?,
            source: schema.get_field("source")?,
        })
    }

    /// 쿼리의 필드명을 스키마 필드로 해석합니다. 분석 대상 텍스트 필드만
    /// 검색 가능하며, 모르는 필드는 `None`입니다.
    pub(crate) fn searchable(&self, name: &str) -> Option<Field> {
        match name {
            "message" => Some(self.message),
            "host" => Some(self.host),
            "app" => Some(self.app),
            "message_id" => Some(self.message_id),
            "timestamp" => Some(self.timestamp),
            "priority" => Some(self.priority),
            "version" => Some(self.version),
            "pid" => Some(self.pid),
            _ => None,
        }
    }
}

/// 샤드 스키마를 구성합니다.
///
/// - `id`: 원문 그대로 색인 + 저장 (ID 조회 키)
/// - `message`: 원본 레코드 전체, 기본 분석기로 색인
/// - 파싱 필드들: 짧은 텍스트로 색인
/// - `reference_time`/`reception_time`: 날짜 색인 (자유 텍스트 분석 제외)
/// - `source`: 원본 바이트, 저장만 하고 색인하지 않음
fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    let indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let analyzed = TextOptions::default().set_indexing_options(indexing);

    builder.add_text_field("id", STRING | STORED);
    builder.add_text_field("message", analyzed.clone());
    builder.add_text_field("host", analyzed.clone());
    builder.add_text_field("app", analyzed.clone());
    builder.add_text_field("message_id", analyzed.clone());
    builder.add_text_field("timestamp", analyzed.clone());
    builder.add_text_field("priority", analyzed.clone());
    builder.add_text_field("version", analyzed.clone());
    builder.add_text_field("pid", analyzed);
    builder.add_date_field("reference_time", INDEXED);
    builder.add_date_field("reception_time", INDEXED);
    builder.add_bytes_field("source", STORED);

    builder.build()
}

/// 기본 분석기를 생성합니다. 샤드 열기와 쿼리 컴파일이 같은 구성을 씁니다.
pub(crate) fn build_analyzer() -> Result<TextAnalyzer, EngineError> {
    let tokenizer = RegexTokenizer::new(TOKEN_PATTERN)?;
    Ok(TextAnalyzer::builder(tokenizer).filter(LowerCaser).build())
}

/// 전문 검색 샤드
pub struct Shard {
    path: PathBuf,
    reader: IndexReader,
    writer: Mutex<Option<IndexWriter>>,
    fields: ShardFields,
}

impl Shard {
    /// 샤드를 엽니다. 경로에 데이터가 없으면 빈 스토어를 새로 만듭니다.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let index = if path.exists() {
            TantivyIndex::open_in_dir(path)?
        } else {
            fs::create_dir_all(path)?;
            TantivyIndex::create_in_dir(path, build_schema())?
        };
        index.tokenizers().register(TOKENIZER_NAME, build_analyzer()?);

        let fields = ShardFields::from_schema(&index.schema())?;
        let writer = index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            writer: Mutex::new(Some(writer)),
            fields,
        })
    }

    /// 샤드 데이터 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 문서 배치를 원자적으로 색인합니다. 배치 전체가 성공하거나 전체가
    /// 롤백됩니다.
    pub fn index(&self, docs: &[IndexableEvent]) -> Result<(), EngineError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| EngineError::Task("shard writer lock poisoned".to_owned()))?;
        let writer = guard.as_mut().ok_or(EngineError::ShardClosed)?;

        let result = (|| -> Result<(), EngineError> {
            for doc in docs {
                writer.add_document(self.to_document(doc))?;
            }
            writer.commit()?;
            Ok(())
        })();

        if result.is_err() {
            let _ = writer.rollback();
            return result;
        }
        drop(guard);

        self.reader.reload()?;
        Ok(())
    }

    fn to_document(&self, doc: &IndexableEvent) -> TantivyDocument {
        let f = &self.fields;
        let event = &doc.event;

        let mut tdoc = TantivyDocument::default();
        tdoc.add_text(f.id, doc.id.as_str());
        tdoc.add_text(f.message, &event.text);
        if let Some(parsed) = &event.parsed {
            tdoc.add_text(f.host, &parsed.host);
            tdoc.add_text(f.app, &parsed.app);
            tdoc.add_text(f.message_id, &parsed.message_id);
            tdoc.add_text(f.timestamp, &parsed.timestamp);
            tdoc.add_text(f.priority, parsed.priority.to_string());
            tdoc.add_text(f.version, parsed.version.to_string());
            tdoc.add_text(f.pid, parsed.pid.to_string());
        }
        tdoc.add_date(
            f.reference_time,
            TantivyDateTime::from_timestamp_nanos(
                doc.event.reference_time().timestamp_nanos_opt().unwrap_or_default(),
            ),
        );
        tdoc.add_date(
            f.reception_time,
            TantivyDateTime::from_timestamp_nanos(
                event.reception_time.timestamp_nanos_opt().unwrap_or_default(),
            ),
        );
        tdoc.add_bytes(f.source, event.text.as_bytes());
        tdoc
    }

    /// 표현식 트리를 이 샤드에서 검색하여 매칭 문서 ID를 반환합니다.
    /// 최대 [`MAX_SEARCH_HITS`]건까지 수집합니다.
    pub fn search(&self, expr: &loghive_query::Expr) -> Result<Vec<DocId>, EngineError> {
        let query = search::compile(expr, &self.fields)?;
        self.search_query(&*query)
    }

    fn search_query(&self, query: &dyn Query) -> Result<Vec<DocId>, EngineError> {
        let searcher = self.reader.searcher();
        let hits = searcher.search(query, &TopDocs::with_limit(MAX_SEARCH_HITS))?;

        let mut ids = Vec::with_capacity(hits.len());
        for (_score, addr) in hits {
            let doc: TantivyDocument = searcher.doc(addr)?;
            if let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_str()) {
                ids.push(DocId::parse(id)?);
            }
        }
        Ok(ids)
    }

    /// ID로 원본 바이트를 조회합니다. 없으면 `None`입니다.
    pub fn document(&self, id: &DocId) -> Result<Option<Vec<u8>>, EngineError> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.fields.id, id.as_str());
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let hits = searcher.search(&query, &TopDocs::with_limit(1))?;

        let Some((_score, addr)) = hits.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(addr)?;
        Ok(doc
            .get_first(self.fields.source)
            .and_then(|v| v.as_bytes())
            .map(|b| b.to_vec()))
    }

    /// 샤드에 저장된 문서 수를 반환합니다.
    pub fn total(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// 샤드를 닫습니다. 이후의 색인 호출은 [`EngineError::ShardClosed`]입니다.
    pub fn close(&self) -> Result<(), EngineError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| EngineError::Task("shard writer lock poisoned".to_owned()))?;
        if let Some(writer) = guard.take() {
            writer.wait_merging_threads()?;
        }
        Ok(())
    }
}
