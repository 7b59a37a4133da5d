//! 쿼리 컴파일 — 표현식 트리를 샤드 스토어 쿼리로 변환
//!
//! `loghive-query`가 만든 AST를 tantivy 쿼리 객체로 내립니다.
//! 검색어는 색인과 같은 분석기로 토큰화되므로 색인 시점과 질의 시점의
//! 토큰이 항상 일치합니다. 스키마에 없는 필드는 0건 매칭으로 처리합니다.

use loghive_query::{BinaryOp, Expr};
use tantivy::query::{BooleanQuery, EmptyQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::Term;

use crate::error::EngineError;
use crate::shard::{build_analyzer, ShardFields};

/// 표현식 트리를 tantivy 쿼리로 컴파일합니다.
pub(crate) fn compile(expr: &Expr, fields: &ShardFields) -> Result<Box<dyn Query>, EngineError> {
    let mut analyzer = build_analyzer()?;
    Ok(compile_expr(expr, fields, &mut analyzer))
}

fn compile_expr(expr: &Expr, fields: &ShardFields, analyzer: &mut TextAnalyzer) -> Box<dyn Query> {
    match expr {
        Expr::Paren(inner) => compile_expr(inner, fields, analyzer),
        Expr::Field(field_expr) => match fields.searchable(&field_expr.field) {
            Some(field) => term_query(field, &field_expr.term, analyzer),
            None => Box::new(EmptyQuery),
        },
        Expr::Binary(binary) => {
            let lhs = compile_expr(&binary.lhs, fields, analyzer);
            let rhs = compile_expr(&binary.rhs, fields, analyzer);
            let clauses = match binary.op {
                BinaryOp::And => vec![(Occur::Must, lhs), (Occur::Must, rhs)],
                BinaryOp::Or => vec![(Occur::Should, lhs), (Occur::Should, rhs)],
                BinaryOp::Not => vec![(Occur::Must, lhs), (Occur::MustNot, rhs)],
            };
            Box::new(BooleanQuery::new(clauses))
        }
    }
}

/// 검색어를 분석기로 토큰화해 모든 토큰이 매칭되어야 하는 쿼리를 만듭니다.
///
/// 토큰이 하나면 단일 TermQuery, 여러 개면 Must 결합, 없으면 0건 매칭입니다.
fn term_query(field: Field, term: &str, analyzer: &mut TextAnalyzer) -> Box<dyn Query> {
    let tokens = tokenize(term, analyzer);
    match tokens.len() {
        0 => Box::new(EmptyQuery),
        1 => Box::new(TermQuery::new(
            Term::from_field_text(field, &tokens[0]),
            IndexRecordOption::Basic,
        )),
        _ => {
            let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
                .iter()
                .map(|token| {
                    let q: Box<dyn Query> = Box::new(TermQuery::new(
                        Term::from_field_text(field, token),
                        IndexRecordOption::Basic,
                    ));
                    (Occur::Must, q)
                })
                .collect();
            Box::new(BooleanQuery::new(clauses))
        }
    }
}

/// 분석기로 텍스트를 토큰 목록으로 변환합니다.
fn tokenize(text: &str, analyzer: &mut TextAnalyzer) -> Vec<String> {
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}
