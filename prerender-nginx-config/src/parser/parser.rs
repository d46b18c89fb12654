//! nginx configuration parser
//!
//! Recursive descent parser that converts tokens into a directive tree.

use crate::parser::lexer::{tokenize, LexError, Location, Spanned, Token};
use prerender_nginx_core::DirectiveNode;
use thiserror::Error;

/// Parser error types
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Lexer error: {0}")]
    Lex(#[from] LexError),

    #[error("Unexpected token at position {position}: expected {expected}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { position: usize, expected: String },
}

impl ParseError {
    /// Byte offset the error points at
    pub fn position(&self) -> usize {
        match self {
            ParseError::Lex(e) => e.position(),
            ParseError::UnexpectedToken { position, .. } => *position,
            ParseError::UnexpectedEof { position, .. } => *position,
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parser state
pub struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    /// Create a new parser from source code
    pub fn new(source: &str) -> ParseResult<Self> {
        let tokens = tokenize(source)?;
        Ok(Self {
            tokens,
            pos: 0,
            source_len: source.len(),
        })
    }

    /// Parse the whole file into its top-level directives
    pub fn parse(&mut self) -> ParseResult<Vec<DirectiveNode>> {
        self.parse_block(0)
    }

    /// Parse directives until the `}` closing this block, or EOF at the top level
    fn parse_block(&mut self, depth: usize) -> ParseResult<Vec<DirectiveNode>> {
        let mut nodes = Vec::new();

        loop {
            match self.peek().cloned() {
                None if depth == 0 => return Ok(nodes),
                None => {
                    return Err(ParseError::UnexpectedEof {
                        position: self.source_len,
                        expected: "\"}\"".to_string(),
                    })
                }
                Some(Token::BlockClose) if depth > 0 => {
                    self.advance();
                    return Ok(nodes);
                }
                Some(Token::Comment(text)) => {
                    self.advance();
                    nodes.push(DirectiveNode::new("#", [text]));
                }
                Some(Token::Word(_)) | Some(Token::QuotedString(_)) => {
                    let (directive, trailing) = self.parse_directive(depth)?;
                    nodes.push(directive);
                    nodes.extend(trailing);
                }
                Some(tok) => return Err(self.unexpected("directive", &tok)),
            }
        }
    }

    /// Parse one directive; comments found between its arguments are
    /// returned separately and placed after it.
    fn parse_directive(
        &mut self,
        depth: usize,
    ) -> ParseResult<(DirectiveNode, Vec<DirectiveNode>)> {
        let name = self.expect_argument()?;
        let mut args = Vec::new();
        let mut trailing = Vec::new();

        let children = loop {
            match self.peek().cloned() {
                Some(Token::Word(s)) | Some(Token::QuotedString(s)) => {
                    self.advance();
                    args.push(s);
                }
                Some(Token::Comment(text)) => {
                    self.advance();
                    trailing.push(DirectiveNode::new("#", [text]));
                }
                Some(Token::Semicolon) => {
                    self.advance();
                    break None;
                }
                Some(Token::BlockOpen) => {
                    self.advance();
                    break Some(self.parse_block(depth + 1)?);
                }
                Some(tok @ Token::BlockClose) => {
                    return Err(self.unexpected("\";\" or \"{\"", &tok))
                }
                None => {
                    return Err(ParseError::UnexpectedEof {
                        position: self.source_len,
                        expected: "\";\" or \"{\"".to_string(),
                    })
                }
            }
        };

        if name == "if" {
            strip_condition_parens(&mut args);
        }

        let mut node = DirectiveNode::new(name, args);
        node.children = children;
        Ok((node, trailing))
    }

    // ========================================
    // Helper Methods
    // ========================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.value)
    }

    fn advance(&mut self) -> Option<Token> {
        if self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].value.clone();
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    fn expect_argument(&mut self) -> ParseResult<String> {
        match self.peek().cloned() {
            Some(Token::Word(s)) | Some(Token::QuotedString(s)) => {
                self.advance();
                Ok(s)
            }
            Some(tok) => Err(self.unexpected("directive name", &tok)),
            None => Err(ParseError::UnexpectedEof {
                position: self.source_len,
                expected: "directive name".to_string(),
            }),
        }
    }

    fn unexpected(&self, expected: &str, found: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            position: self.current_span().start,
            expected: expected.to_string(),
            found: describe(found),
        }
    }

    fn current_span(&self) -> Location {
        self.tokens
            .get(self.pos)
            .map(|s| s.span)
            .unwrap_or(Location {
                start: self.source_len,
                end: self.source_len,
            })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::BlockOpen => "\"{\"".to_string(),
        Token::BlockClose => "\"}\"".to_string(),
        Token::Semicolon => "\";\"".to_string(),
        Token::Comment(_) => "comment".to_string(),
        Token::QuotedString(s) | Token::Word(s) => format!("{s:?}"),
    }
}

/// `if ($a = 1)` is stored as `["$a", "=", "1"]`
fn strip_condition_parens(args: &mut Vec<String>) {
    if let Some(first) = args.first_mut() {
        if let Some(rest) = first.strip_prefix('(') {
            *first = rest.to_string();
        }
        if first.is_empty() {
            args.remove(0);
        }
    }
    if let Some(last) = args.last_mut() {
        if let Some(rest) = last.strip_suffix(')') {
            *last = rest.to_string();
        }
        if last.is_empty() {
            args.pop();
        }
    }
}

/// Parse nginx configuration source into its top-level directives
pub fn parse(source: &str) -> ParseResult<Vec<DirectiveNode>> {
    let mut parser = Parser::new(source)?;
    parser.parse()
}
