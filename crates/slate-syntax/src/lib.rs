//! Concrete syntax for the Slate language.
//!
//! Provides the lexer, the error-tolerant parser and the arena-backed
//! [`SyntaxTree`] the semantic layer consumes. Parsing never fails: any
//! input yields a tree plus a list of collected errors.

mod kind;
mod lexer;
mod parser;
mod tree;

pub use kind::{Field, SyntaxKind};
pub use lexer::{lex, LexError, Token};
pub use parser::{parse_file, Parse, ParseError};
pub use tree::{NodeId, SyntaxTree};
