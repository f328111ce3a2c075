//! Token stream desugaring.
//!
//! Runs over the lexed tokens in reverse so each decision can look at the
//! token that follows in source order. Three rewrites happen here: comment
//! markers disappear, redundant semicolons (trailing, or sitting before a
//! `)` `,` or another `;`) are dropped and the survivors normalize to the
//! binary `;` operator, and brace/bracket markers turn into calls to the
//! `m` and `l` constructor functions.

use crate::frontend::token::{Token, TokenKind};

fn is_semicolon(token: &Token) -> bool {
    (token.kind == TokenKind::Operator && token.surface == ";")
        || (token.kind == TokenKind::UnaryOperator && token.surface == ";u")
}

pub fn post_process(tokens: Vec<Token>) -> Vec<Token> {
    let mut cleaned: Vec<Token> = Vec::new();
    let mut last: Option<Token> = None;
    for raw in tokens.into_iter().rev() {
        if raw.kind == TokenKind::Marker && raw.surface.starts_with("//") {
            continue;
        }
        let semi = is_semicolon(&raw);
        let keep = !semi
            || matches!(&last, Some(l) if l.kind != TokenKind::CloseParen
                && l.kind != TokenKind::Comma
                && !is_semicolon(l));
        let mut current = raw;
        if keep {
            if semi {
                current = current.morphed(TokenKind::Operator, ";");
            }
            if current.kind == TokenKind::Marker {
                match current.surface.as_str() {
                    "{" => {
                        cleaned.push(current.morphed(TokenKind::OpenParen, "("));
                        current = current.morphed(TokenKind::Function, "m");
                    }
                    "[" => {
                        cleaned.push(current.morphed(TokenKind::OpenParen, "("));
                        current = current.morphed(TokenKind::Function, "l");
                    }
                    "}" | "]" => {
                        current = current.morphed(TokenKind::CloseParen, ")");
                    }
                    _ => {}
                }
            }
            cleaned.push(current.clone());
        }
        // `$` markers are invisible to the lookahead.
        if !(current.kind == TokenKind::Marker && current.surface == "$") {
            last = Some(current);
        }
    }
    cleaned.reverse();
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::position::Position;

    fn op(surface: &str) -> Token {
        Token::new(TokenKind::Operator, surface, Position::default())
    }

    fn tok(kind: TokenKind, surface: &str) -> Token {
        Token::new(kind, surface, Position::default())
    }

    fn surfaces(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.surface.as_str()).collect()
    }

    #[test]
    fn test_trailing_semicolons_dropped() {
        let out = post_process(vec![tok(TokenKind::Literal, "1"), op(";"), op(";")]);
        assert_eq!(surfaces(&out), ["1"]);
    }

    #[test]
    fn test_semicolon_before_close_paren_dropped() {
        let out = post_process(vec![
            tok(TokenKind::OpenParen, "("),
            tok(TokenKind::Literal, "1"),
            op(";"),
            tok(TokenKind::CloseParen, ")"),
        ]);
        assert_eq!(surfaces(&out), ["(", "1", ")"]);
    }

    #[test]
    fn test_interior_semicolon_kept_and_normalized() {
        let out = post_process(vec![
            tok(TokenKind::Literal, "1"),
            tok(TokenKind::UnaryOperator, ";u"),
            tok(TokenKind::Literal, "2"),
        ]);
        assert_eq!(surfaces(&out), ["1", ";", "2"]);
        assert_eq!(out[1].kind, TokenKind::Operator);
    }

    #[test]
    fn test_braces_become_map_constructor_call() {
        let out = post_process(vec![
            tok(TokenKind::Marker, "{"),
            tok(TokenKind::Literal, "1"),
            tok(TokenKind::Marker, "}"),
        ]);
        assert_eq!(surfaces(&out), ["m", "(", "1", ")"]);
        assert_eq!(out[0].kind, TokenKind::Function);
        assert_eq!(out[1].kind, TokenKind::OpenParen);
        assert_eq!(out[3].kind, TokenKind::CloseParen);
    }

    #[test]
    fn test_brackets_become_list_constructor_call() {
        let out = post_process(vec![
            tok(TokenKind::Marker, "["),
            tok(TokenKind::Literal, "1"),
            tok(TokenKind::Comma, ","),
            tok(TokenKind::Literal, "2"),
            tok(TokenKind::Marker, "]"),
        ]);
        assert_eq!(surfaces(&out), ["l", "(", "1", ",", "2", ")"]);
    }

    #[test]
    fn test_comment_markers_vanish() {
        let out = post_process(vec![
            tok(TokenKind::Literal, "1"),
            tok(TokenKind::Marker, "// gone\n"),
            op("+"),
            tok(TokenKind::Literal, "2"),
        ]);
        assert_eq!(surfaces(&out), ["1", "+", "2"]);
    }

    #[test]
    fn test_newline_marker_does_not_shield_semicolons() {
        // a trailing `;` is still trailing with a `$` after it
        let out = post_process(vec![
            tok(TokenKind::Literal, "1"),
            op(";"),
            tok(TokenKind::Marker, "$"),
        ]);
        assert_eq!(surfaces(&out), ["1", "$"]);
    }
}
