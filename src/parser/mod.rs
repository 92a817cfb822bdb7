//! Recursive-descent parser from tokens to the AST.
//!
//! One token of lookahead everywhere, plus a three-token peek at the
//! two ambiguous sites: assignment disambiguation (`x = …` vs
//! `x.y = …` vs `x[] = …`) and the foreach header (`for k v in …` vs
//! a plain condition loop).

mod expr;
mod stmt;
mod stream;

pub use stream::TokenStream;

use crate::ast::Node;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::Token;

/// Parse a token list into a code-block AST.
pub fn parse(tokens: &[Token<'_>]) -> Result<Node, ParseError> {
    let mut stream = TokenStream::new(tokens);
    let block = stmt::parse_code_block(&mut stream)?;
    if !stream.at_end() {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            stream.current().start,
        ));
    }
    Ok(block)
}
