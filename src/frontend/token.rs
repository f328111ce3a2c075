use std::fmt;

use serde::Serialize;

use crate::frontend::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Literal,
    HexLiteral,
    Str,
    Variable,
    Function,
    Operator,
    UnaryOperator,
    OpenParen,
    CloseParen,
    Comma,
    Marker,
}

/// A single lexed token. `surface` holds the text as it participates in
/// parsing, which is not always the raw source text: string escapes are
/// already resolved and unary operators carry a `u` suffix so they get their
/// own registry slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub surface: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, surface: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            surface: surface.into(),
            position,
        }
    }

    /// Same source location, different role. Used by the desugaring pass.
    pub fn morphed(&self, kind: TokenKind, surface: impl Into<String>) -> Self {
        Token::new(kind, surface, self.position)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.surface)
    }
}
