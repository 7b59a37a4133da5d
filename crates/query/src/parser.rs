//! 쿼리 파서 — 토큰 스트림을 표현식 트리로 변환
//!
//! 암묵적 AND(공백), 명시적 `AND`/`OR`/`NOT`, 괄호 그룹,
//! `field:term` 형식을 지원합니다. 연산자 우선순위는 `OR < AND < NOT`이며
//! 좌결합 파싱 후 우선순위에 따라 트리를 재배치합니다.

use std::fmt;

use crate::lexer::Lexer;
use crate::token::{tokstr, Token};

/// 쿼리 구문 에러
///
/// 메시지 형식은 `found '<토큰>', expected <기대>`로 고정되어 있으며
/// 클라이언트에 그대로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("found '{found}', expected {expected}")]
pub struct ParseError {
    /// 실제로 만난 토큰 (리터럴 또는 토큰 이름)
    pub found: String,
    /// 기대한 구문 요소
    pub expected: String,
}

/// 이항 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// 두 피연산자 모두 매칭
    And,
    /// 둘 중 하나라도 매칭
    Or,
    /// 좌측은 매칭, 우측은 비매칭
    Not,
}

impl BinaryOp {
    /// 연산자 우선순위
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Not => 3,
        }
    }

    fn from_token(tok: Token) -> Option<Self> {
        match tok {
            Token::And => Some(BinaryOp::And),
            Token::Or => Some(BinaryOp::Or),
            Token::Not => Some(BinaryOp::Not),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::And => write!(f, "AND"),
            BinaryOp::Or => write!(f, "OR"),
            BinaryOp::Not => write!(f, "NOT"),
        }
    }
}

/// 필드 검색식. 필드가 명시되지 않은 검색어는 기본 필드에 대해 매칭됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExpr {
    /// 대상 필드명
    pub field: String,
    /// 검색어
    pub term: String,
}

impl fmt::Display for FieldExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.term)
    }
}

/// 이항 표현식
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    /// 연산자
    pub op: BinaryOp,
    /// 좌측 피연산자
    pub lhs: Box<Expr>,
    /// 우측 피연산자
    pub rhs: Box<Expr>,
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// 쿼리 표현식 트리
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `field:term` 또는 기본 필드 검색어
    Field(FieldExpr),
    /// 이항 연산
    Binary(BinaryExpr),
    /// 괄호 그룹
    Paren(Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(e) => e.fmt(f),
            Expr::Binary(e) => e.fmt(f),
            Expr::Paren(inner) => write!(f, "({inner})"),
        }
    }
}

/// 쿼리 파서
///
/// 한 토큰 되돌리기(unlex) 버퍼를 가진 재귀 하강 파서입니다.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    buf: (Token, String),
    buffered: bool,
    default_field: String,
}

impl<'a> Parser<'a> {
    /// 입력과 기본 검색 필드에 대한 파서를 생성합니다.
    pub fn new(input: &'a str, default_field: impl Into<String>) -> Self {
        Self {
            lexer: Lexer::new(input),
            buf: (Token::Eof, String::new()),
            buffered: false,
            default_field: default_field.into(),
        }
    }

    /// 표현식을 파싱합니다. 빈 입력은 `Ok(None)`입니다.
    pub fn parse(&mut self) -> Result<Option<Expr>, ParseError> {
        let (tok, _) = self.lex_ignore_whitespace();
        if tok == Token::Eof {
            return Ok(None);
        }
        self.unlex();

        let mut expr = self.parse_field_expr()?;

        loop {
            let (op_tok, _) = self.lex_ignore_whitespace();
            if op_tok == Token::Eof {
                return Ok(Some(expr));
            }
            if op_tok == Token::RParen {
                self.unlex();
                return Ok(Some(expr));
            }

            let op = match BinaryOp::from_token(op_tok) {
                Some(op) => op,
                None => {
                    // 공백으로 이어진 항은 암묵적 AND
                    self.unlex();
                    BinaryOp::And
                }
            };

            let rhs = self.parse_field_expr()?;

            // 좌측이 더 낮은 우선순위의 이항식이면 새 연산자를 그 우측으로 내림
            expr = match expr {
                Expr::Binary(lhs_bin) if lhs_bin.op.precedence() < op.precedence() => {
                    Expr::Binary(BinaryExpr {
                        op: lhs_bin.op,
                        lhs: lhs_bin.lhs,
                        rhs: Box::new(Expr::Binary(BinaryExpr {
                            op,
                            lhs: lhs_bin.rhs,
                            rhs: Box::new(rhs),
                        })),
                    })
                }
                _ => Expr::Binary(BinaryExpr {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                }),
            };
        }
    }

    /// 단일 항을 파싱합니다: 괄호 그룹 또는 `field:term` / 검색어.
    fn parse_field_expr(&mut self) -> Result<Expr, ParseError> {
        let (tok, _) = self.lex_ignore_whitespace();
        if tok == Token::LParen {
            let inner = self.parse()?;

            let (tok, lit) = self.lex_ignore_whitespace();
            if tok != Token::RParen {
                return Err(ParseError {
                    found: tokstr(tok, &lit),
                    expected: ")".to_owned(),
                });
            }

            return match inner {
                Some(expr) => Ok(Expr::Paren(Box::new(expr))),
                // "()"는 parse()가 먼저 거부하므로 도달하지 않지만 방어적으로 처리
                None => Err(ParseError {
                    found: ")".to_owned(),
                    expected: "FIELD or SEARCH TERM".to_owned(),
                }),
            };
        }
        self.unlex();

        let (tok, field_or_term) = self.lex_ignore_whitespace();
        if tok != Token::String {
            return Err(ParseError {
                found: tokstr(tok, &field_or_term),
                expected: "FIELD or SEARCH TERM".to_owned(),
            });
        }

        let (tok, _) = self.lex_ignore_whitespace();
        if tok == Token::Colon {
            let (tok, term) = self.lex_ignore_whitespace();
            if tok != Token::String {
                return Err(ParseError {
                    found: tokstr(tok, &term),
                    expected: "SEARCH TERM".to_owned(),
                });
            }
            return Ok(Expr::Field(FieldExpr {
                field: field_or_term,
                term,
            }));
        }
        self.unlex();

        Ok(Expr::Field(FieldExpr {
            field: self.default_field.clone(),
            term: field_or_term,
        }))
    }

    /// 다음 토큰을 읽습니다. unlex된 토큰이 있으면 그것을 반환합니다.
    fn lex(&mut self) -> (Token, String) {
        if self.buffered {
            self.buffered = false;
            return self.buf.clone();
        }
        let next = self.lexer.next_token();
        self.buf = next.clone();
        next
    }

    /// 마지막으로 읽은 토큰을 버퍼에 되돌립니다.
    fn unlex(&mut self) {
        self.buffered = true;
    }

    /// 공백이 아닌 다음 토큰을 읽습니다.
    fn lex_ignore_whitespace(&mut self) -> (Token, String) {
        let (tok, lit) = self.lex();
        if tok == Token::Ws {
            return self.lex();
        }
        (tok, lit)
    }
}
