//! Go token stream, just rich enough for declaration parsing.
//!
//! Comments and newlines are tokens here: newlines separate struct fields and
//! blank lines cut doc-comment groups, so the parser has to see both.
use logos::{Lexer, Logos};

use super::{Position, SyntaxError};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token {
    #[token("\n")]
    Newline,

    /// `// text`, payload excludes the slashes
    #[regex(r"//[^\n]*", |lex| lex.slice()[2..].to_string())]
    LineComment(String),
    /// `/* text */`, payload excludes the delimiters
    #[token("/*", block_comment)]
    BlockComment(String),

    // keywords the declaration parser cares about
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("type")]
    Type,
    #[token("struct")]
    Struct,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("chan")]
    Chan,
    #[token("func")]
    Func,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// interpreted string, quotes included
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice().to_string())]
    Str(String),
    /// raw string, backquotes included
    #[regex(r"`[^`]*`", |lex| lex.slice().to_string())]
    RawStr(String),
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Rune,
    #[regex(r"[0-9][0-9A-Za-z_]*(\.[0-9A-Za-z_]*)?")]
    Number,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("*")]
    Star,
    #[token("=", priority = 10)]
    Assign,
    #[token("<-", priority = 10)]
    Arrow,
    /// every other operator; only ever skipped
    #[regex(r"[-+/%&|^<>!~=:]+")]
    Op,
}

/// Scans past the closing `*/`; an unterminated comment is a lex error.
fn block_comment(lex: &mut Lexer<'_, Token>) -> Option<String> {
    let end = lex.remainder().find("*/")?;
    let text = lex.remainder()[..end].to_string();
    lex.bump(end + 2);
    Some(text)
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::Newline | Token::LineComment(_) | Token::BlockComment(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexed {
    pub token: Token,
    pub position: Position,
    pub start: usize,
    pub end: usize,
}

/// Byte offset → 1-based line/column.
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    pub fn position(&self, source: &str, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.line_starts[line];
        let column = source[start..offset].chars().count() + 1;
        Position { line: line as u32 + 1, column: column as u32 }
    }
}

pub fn lex(source: &str) -> Result<Vec<Lexed>, SyntaxError> {
    let index = LineIndex::new(source);
    let mut out = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        let span = lexer.span();
        let position = index.position(source, span.start);
        match token {
            Ok(token) => out.push(Lexed { token, position, start: span.start, end: span.end }),
            Err(()) => {
                return Err(SyntaxError::UnexpectedCharacter {
                    text: lexer.slice().to_string(),
                    position,
                });
            }
        }
    }
    Ok(out)
}
