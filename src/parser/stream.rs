//! Token stream wrapper for the hand-written parser.

use crate::lexer::{Token, TokenKind};
use crate::position::Position;

/// Token cursor with lookahead and position helpers.
///
/// The grammar needs one token of lookahead everywhere and a three-token
/// peek at two sites (assignment disambiguation and the foreach header),
/// all served by [`TokenStream::peek_kind`].
pub struct TokenStream<'src, 'tok> {
    tokens: &'tok [Token<'src>],
    pos: usize,
}

impl<'src, 'tok> TokenStream<'src, 'tok> {
    pub fn new(tokens: &'tok [Token<'src>]) -> Self {
        TokenStream { tokens, pos: 0 }
    }

    /// The token `n` ahead of the cursor, without consuming.
    pub fn peek(&self, n: usize) -> Option<&'tok Token<'src>> {
        self.tokens.get(self.pos + n)
    }

    /// Kind of the token `n` ahead of the cursor.
    pub fn peek_kind(&self, n: usize) -> Option<TokenKind> {
        self.peek(n).map(|t| t.kind)
    }

    /// The current token. The parser only calls this at positions it
    /// has already bounds-checked.
    pub fn current(&self) -> &'tok Token<'src> {
        &self.tokens[self.pos]
    }

    /// Consume and return the current token.
    pub fn advance(&mut self) -> Option<&'tok Token<'src>> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consume `n` tokens.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.tokens.len());
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Number of tokens left, including the current one.
    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.pos
    }

    /// End position of the final token; the anchor for errors about
    /// source that ran out.
    pub fn last_end(&self) -> Position {
        self.tokens.last().map(|t| t.end).unwrap_or_default()
    }
}
