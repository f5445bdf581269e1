//! Positional access over a token slice.

use super::token::{Token, TokenKind};
use thiserror::Error;

/// Read cursor over a flat token stream.
///
/// The block builder relies on fixed token shapes (an `inline` token right
/// after `heading_open`, for example); the cursor names those expectations
/// so a shape mismatch surfaces as an error instead of a silent misread.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

/// Token shape did not match what the cursor was asked for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "expected {expected} at token {index}, found {}",
    .found.map_or("end of stream", |kind| kind.as_str())
)]
pub struct ShapeError {
    /// Index that was inspected.
    pub index: usize,
    /// Kind that was required there.
    pub expected: TokenKind,
    /// Kind that was found, `None` past the end of the stream.
    pub found: Option<TokenKind>,
}

impl<'a> TokenCursor<'a> {
    /// Create a cursor positioned on the first token.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Current index.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether every token has been consumed.
    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Token `k` positions ahead of the current one (`peek(0)` is current).
    pub fn peek(&self, k: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + k)
    }

    /// Current token.
    pub fn current(&self) -> Option<&'a Token> {
        self.peek(0)
    }

    /// Require the token `k` positions ahead to be of `kind`.
    pub fn expect(&self, k: usize, kind: TokenKind) -> Result<&'a Token, ShapeError> {
        match self.peek(k) {
            Some(token) if token.kind == kind => Ok(token),
            other => Err(ShapeError {
                index: self.pos + k,
                expected: kind,
                found: other.map(|t| t.kind),
            }),
        }
    }

    /// Offset of the first token of `kind` ahead of the current one,
    /// stopping at any token for which `stop` returns true.
    pub fn find_before(
        &self,
        kind: TokenKind,
        stop: impl Fn(TokenKind) -> bool,
    ) -> Option<usize> {
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, token)| token.kind == kind || stop(token.kind))
            .filter(|(_, token)| token.kind == kind)
            .map(|(offset, _)| offset)
    }

    /// Move past the current token and the `n` tokens after it.
    pub fn advance_past(&mut self, n: usize) {
        self.pos = (self.pos + n + 1).min(self.tokens.len());
    }

    /// Move to the next token.
    pub fn advance(&mut self) {
        self.advance_past(0);
    }
}
