//! Lexer for nginx configuration files
//!
//! Key features:
//! - Whitespace (newlines included) only separates tokens
//! - `;` ends a simple directive, `{ }` delimit blocks
//! - "..." and '...' are quoted arguments, quotes are stripped
//! - # starts a comment running to the end of the line (kept as a token)
//! - `${name}` may appear inside a bare word without opening a block

use logos::{Logos, Span};

/// Source location for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

/// A token with its location in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Location,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: impl Into<Location>) -> Self {
        Self {
            value,
            span: span.into(),
        }
    }
}

/// Token types for nginx syntax
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("{")]
    BlockOpen,

    #[token("}")]
    BlockClose,

    #[token(";")]
    Semicolon,

    /// Comment text without the leading `#`
    #[regex(r"#[^\n]*", |lex| lex.slice()[1..].trim_end_matches('\r').to_string())]
    Comment(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unquote(lex.slice()))]
    QuotedString(String),

    // A `#` only starts a comment at the beginning of a word
    #[regex(
        r#"([^ \t\r\n\f{};"'#\\$]|\\.|\$\{[A-Za-z0-9_]*\}|\$)([^ \t\r\n\f{};"'\\$]|\\.|\$\{[A-Za-z0-9_]*\}|\$)*"#,
        |lex| lex.slice().to_string()
    )]
    Word(String),
}

/// Strip the surrounding quotes and unescape `\"`, `\'` and `\\`.
/// Other escapes are kept verbatim, nginx interprets them later.
fn unquote(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('"' | '\'' | '\\')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub type LexResult = Result<Vec<Spanned<Token>>, LexError>;

/// Lexer error
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character at position {position}")]
    UnexpectedChar { position: usize },
}

impl LexError {
    pub fn position(&self) -> usize {
        match self {
            LexError::UnexpectedChar { position } => *position,
        }
    }
}

/// Tokenize an nginx configuration source string
pub fn tokenize(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    for (result, span) in lexer.spanned() {
        match result {
            Ok(token) => tokens.push(Spanned::new(token, span)),
            // Unterminated quotes and a trailing lone backslash end up here
            Err(_) => return Err(LexError::UnexpectedChar { position: span.start }),
        }
    }

    Ok(tokens)
}

/// 1-based line number of a byte offset
pub fn line_of(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
