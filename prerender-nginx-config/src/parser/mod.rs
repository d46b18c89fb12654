//! Parser module for nginx configuration
//!
//! This module provides the lexer and the recursive descent parser.

pub mod lexer;
pub mod parser;

pub use lexer::{line_of, tokenize, LexError, Location, Spanned, Token};
pub use parser::{parse, ParseError, Parser};
