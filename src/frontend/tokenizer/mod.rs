//! The lexer.
//!
//! Works on a char slice so token offsets stay valid for the newline-marker
//! rewriting the parser does later. Operator scanning is greedy with
//! backtracking: the longest run of symbol characters is taken, then trimmed
//! back to the longest prefix the registry actually knows, so `1+=2` lexes
//! `+=` but `1+-2` falls back to `+` and a unary `-`.

pub mod post_process;

use crate::frontend::FrontendError;
use crate::frontend::position::Position;
use crate::frontend::token::{Token, TokenKind};
use crate::registry::Registry;

pub struct Tokenizer<'a> {
    chars: &'a [char],
    registry: &'a Registry,
    comments: bool,
    newline_markers: bool,
    pos: usize,
    line: usize,
    column: usize,
    previous: Option<Token>,
    /// Marker produced mid-scan, handed out without adjacency bookkeeping.
    pending: Option<Token>,
}

/// Runs the whole input through the lexer.
pub fn tokenize(
    chars: &[char],
    registry: &Registry,
    comments: bool,
    newline_markers: bool,
) -> Result<Vec<Token>, FrontendError> {
    let mut tokenizer = Tokenizer::new(chars, registry, comments, newline_markers);
    let mut out = Vec::new();
    while let Some(token) = tokenizer.next_token()? {
        out.push(token);
    }
    Ok(out)
}

fn is_hex_digit(ch: char) -> bool {
    matches!(ch, 'x' | 'X' | '0'..='9' | 'a'..='f' | 'A'..='F')
}

/// Characters that end a symbolic operator run.
fn stops_operator(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() || matches!(ch, '(' | ')' | ',')
}

impl<'a> Tokenizer<'a> {
    pub fn new(
        chars: &'a [char],
        registry: &'a Registry,
        comments: bool,
        newline_markers: bool,
    ) -> Tokenizer<'a> {
        Tokenizer {
            chars,
            registry,
            comments,
            newline_markers,
            pos: 0,
            line: 0,
            column: 0,
            previous: None,
            pending: None,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) {
        if self.chars[self.pos] == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        self.pos += 1;
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, FrontendError> {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.bump();
        }
        if self.pos >= self.chars.len() {
            return Ok(None);
        }
        let start = Position::new(self.pos, self.line, self.column);
        let ch = self.chars[self.pos];

        let token = if ch.is_numeric() {
            self.scan_number(start)
        } else if ch == '\'' {
            self.scan_string(start)?
        } else if ch.is_alphabetic() || ch == '_' {
            self.scan_identifier(start)
        } else if matches!(ch, '(' | ')' | ',' | '{' | '}' | '[' | ']') {
            self.scan_structural(ch, start)?
        } else {
            match self.scan_operator(start)? {
                Some(token) => token,
                // Comment and newline markers bypass adjacency tracking.
                None => return Ok(self.take_pending()),
            }
        };

        if let Some(prev) = &self.previous {
            let current_clashes = matches!(
                token.kind,
                TokenKind::Literal
                    | TokenKind::HexLiteral
                    | TokenKind::Variable
                    | TokenKind::Str
                    | TokenKind::Function
            ) || (token.kind == TokenKind::Marker
                && (prev.surface == "{" || prev.surface == "["));
            let prev_clashes = matches!(
                prev.kind,
                TokenKind::Variable
                    | TokenKind::Function
                    | TokenKind::Literal
                    | TokenKind::CloseParen
                    | TokenKind::HexLiteral
                    | TokenKind::Str
            ) || (prev.kind == TokenKind::Marker
                && (prev.surface == "}" || prev.surface == "]"));
            if current_clashes && prev_clashes {
                return Err(FrontendError::at(
                    prev,
                    format!("'{}' is not allowed after '{}'", token.surface, prev.surface),
                ));
            }
        }
        self.previous = Some(token.clone());
        Ok(Some(token))
    }

    fn take_pending(&mut self) -> Option<Token> {
        self.pending.take()
    }

    fn scan_number(&mut self, start: Position) -> Token {
        let is_hex = self.chars[self.pos] == '0' && matches!(self.peek(1), Some('x' | 'X'));
        let mut surface = String::new();
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            let after_exponent = matches!(surface.chars().last(), Some('e' | 'E'));
            let take = (is_hex && is_hex_digit(ch))
                || ch.is_numeric()
                || ch == '.'
                || ch == 'e'
                || ch == 'E'
                || ((ch == '-' || ch == '+') && after_exponent);
            if !take {
                break;
            }
            surface.push(ch);
            self.bump();
        }
        let kind = if is_hex {
            TokenKind::HexLiteral
        } else {
            TokenKind::Literal
        };
        Token::new(kind, surface, start)
    }

    fn scan_string(&mut self, start: Position) -> Result<Token, FrontendError> {
        let opener = Token::new(TokenKind::Str, "'", start);
        self.bump();
        let mut surface = String::new();
        loop {
            if self.pos >= self.chars.len() {
                return Err(FrontendError::at(&opener, "Program truncated"));
            }
            let ch = self.chars[self.pos];
            if ch == '\'' {
                self.bump();
                break;
            }
            if ch == '\\' {
                match self.peek(1) {
                    Some('n') => {
                        surface.push('\n');
                        self.bump();
                        self.bump();
                    }
                    Some('t') => {
                        surface.push('\t');
                        self.bump();
                        self.bump();
                    }
                    Some('r') => {
                        return Err(FrontendError::at(
                            &opener,
                            "Carriage return character is not supported",
                        ));
                    }
                    Some(escaped @ ('\\' | '\'')) => {
                        surface.push(escaped);
                        self.bump();
                        self.bump();
                    }
                    // Unknown escape: the backslash is dropped, the next
                    // character reenters the loop on its own.
                    _ => self.bump(),
                }
            } else {
                surface.push(ch);
                self.bump();
            }
        }
        Ok(Token::new(TokenKind::Str, surface, start))
    }

    fn scan_identifier(&mut self, start: Position) -> Token {
        let mut surface = String::new();
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            if !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            surface.push(ch);
            self.bump();
        }
        // Whitespace between a name and its argument list is allowed.
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.bump();
        }
        let kind = if self.peek(0) == Some('(') {
            TokenKind::Function
        } else {
            TokenKind::Variable
        };
        Token::new(kind, surface, start)
    }

    fn scan_structural(&mut self, ch: char, start: Position) -> Result<Token, FrontendError> {
        let kind = match ch {
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            ',' => TokenKind::Comma,
            _ => TokenKind::Marker,
        };
        self.bump();
        if let Some(prev) = &self.previous {
            if prev.kind == TokenKind::Operator
                && matches!(ch, ')' | ',' | ']' | '}')
                && prev.surface != ";"
            {
                return Err(FrontendError::at(
                    prev,
                    format!(
                        "Can't have operator {} at the end of a subexpression",
                        prev.surface
                    ),
                ));
            }
        }
        Ok(Token::new(kind, ch.to_string(), start))
    }

    /// Returns `None` after stashing a marker token in `pending`: comments
    /// and `$` markers skip the adjacency bookkeeping entirely.
    fn scan_operator(&mut self, start: Position) -> Result<Option<Token>, FrontendError> {
        let run_start = self.pos;
        let column_start = self.column;
        let mut greedy = String::new();
        let mut valid_until = None;
        while self.pos < self.chars.len() {
            let ch = self.chars[self.pos];
            if stops_operator(ch) {
                break;
            }
            greedy.push(ch);
            if self.comments && greedy == "//" {
                self.bump();
                while self.pos < self.chars.len() {
                    let rest = self.chars[self.pos];
                    greedy.push(rest);
                    self.bump();
                    if rest == '\n' {
                        break;
                    }
                }
                self.pending = Some(Token::new(TokenKind::Marker, greedy, start));
                return Ok(None);
            }
            self.bump();
            if self.registry.is_operator(&greedy) {
                valid_until = Some(self.pos);
            }
        }
        if self.newline_markers && greedy == "$" {
            self.line += 1;
            self.column = 0;
            self.pending = Some(Token::new(TokenKind::Marker, "$", start));
            return Ok(None);
        }
        let surface: String = match valid_until {
            Some(until) => {
                self.pos = until;
                self.column = column_start + (until - run_start);
                self.chars[run_start..until].iter().collect()
            }
            None => greedy,
        };
        // Operators in prefix position become their own unary flavor.
        let unary = match &self.previous {
            None => true,
            Some(p) => {
                p.kind == TokenKind::Operator
                    || p.kind == TokenKind::OpenParen
                    || p.kind == TokenKind::Comma
                    || (p.kind == TokenKind::Marker
                        && (p.surface == "{" || p.surface == "["))
            }
        };
        let token = if unary {
            Token::new(TokenKind::UnaryOperator, format!("{surface}u"), start)
        } else {
            Token::new(TokenKind::Operator, surface, start)
        };
        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FunctionEntry, FunctionImp, OperatorEntry, OperatorImp, precedence};
    use std::rc::Rc;

    fn registry() -> Registry {
        let mut r = Registry::new();
        for op in ["+", "-", "*", "/", "=", "+=", "->", "==", ";", "~", ":"] {
            r.put_operator(op, OperatorEntry {
                precedence: precedence::ADDITIVE,
                left_assoc: true,
                imp: OperatorImp::EagerBinary(Rc::new(|a, b| a.add(&b))),
            });
        }
        for op in ["-", "+", "!"] {
            r.put_operator(op, OperatorEntry {
                precedence: precedence::UNARY,
                left_assoc: false,
                imp: OperatorImp::EagerUnary(Rc::new(Ok)),
            });
        }
        r.put_function("f", FunctionEntry {
            arity: Some(1),
            imp: FunctionImp::Eager(Rc::new(|mut args| Ok(args.remove(0)))),
        });
        r
    }

    fn lex(src: &str) -> Vec<Token> {
        let chars: Vec<char> = src.chars().collect();
        tokenize(&chars, &registry(), false, true).unwrap()
    }

    fn surfaces(src: &str) -> Vec<String> {
        lex(src).into_iter().map(|t| t.surface).collect()
    }

    #[test]
    fn test_basic_arithmetic() {
        let tokens = lex("1 + 23.5");
        assert_eq!(tokens[0].kind, TokenKind::Literal);
        assert_eq!(tokens[1].kind, TokenKind::Operator);
        assert_eq!(tokens[2].surface, "23.5");
    }

    #[test]
    fn test_unary_minus_has_suffixed_surface() {
        let tokens = lex("-x + (-3)");
        assert_eq!(tokens[0].kind, TokenKind::UnaryOperator);
        assert_eq!(tokens[0].surface, "-u");
        assert_eq!(tokens[4].surface, "-u");
    }

    #[test]
    fn test_operator_backtracking_takes_longest_match() {
        assert_eq!(surfaces("a += 1"), ["a", "+=", "1"]);
        assert_eq!(surfaces("a +- 1"), ["a", "+", "-u", "1"]);
    }

    #[test]
    fn test_function_vs_variable_detection() {
        let tokens = lex("f (x) + fx");
        assert_eq!(tokens[0].kind, TokenKind::Function);
        assert_eq!(tokens[5].kind, TokenKind::Variable);
        assert_eq!(tokens[5].surface, "fx");
    }

    #[test]
    fn test_hex_literal() {
        let tokens = lex("0xFF + 1");
        assert_eq!(tokens[0].kind, TokenKind::HexLiteral);
        assert_eq!(tokens[0].surface, "0xFF");
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r"'it\'s a\ttab\n'");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].surface, "it's a\ttab\n");
    }

    #[test]
    fn test_unknown_escape_drops_backslash() {
        assert_eq!(lex(r"'a\z'")[0].surface, "az");
    }

    #[test]
    fn test_unterminated_string_is_truncated_program() {
        let chars: Vec<char> = "'oops".chars().collect();
        let err = tokenize(&chars, &registry(), false, true).unwrap_err();
        assert_eq!(err.message, "Program truncated");
    }

    #[test]
    fn test_carriage_return_escape_rejected() {
        let chars: Vec<char> = r"'a\rb'".chars().collect();
        let err = tokenize(&chars, &registry(), false, true).unwrap_err();
        assert_eq!(err.message, "Carriage return character is not supported");
    }

    #[test]
    fn test_comment_becomes_marker_when_enabled() {
        let chars: Vec<char> = "1 // note\n+2".chars().collect();
        let tokens = tokenize(&chars, &registry(), true, true).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Marker);
        assert!(tokens[1].surface.starts_with("//"));
        assert_eq!(tokens[2].surface, "+");
    }

    #[test]
    fn test_newline_marker() {
        let tokens = lex("1 $ 2");
        assert_eq!(tokens[1].kind, TokenKind::Marker);
        assert_eq!(tokens[1].surface, "$");
        // the marker bumps the line counter for what follows
        assert_eq!(tokens[2].position.line, 1);
    }

    #[test]
    fn test_adjacent_values_rejected() {
        let chars: Vec<char> = "1 2".chars().collect();
        let err = tokenize(&chars, &registry(), false, true).unwrap_err();
        assert_eq!(err.message, "'2' is not allowed after '1'");
    }

    #[test]
    fn test_operator_before_close_paren_rejected() {
        let chars: Vec<char> = "(1 + )".chars().collect();
        let err = tokenize(&chars, &registry(), false, true).unwrap_err();
        assert_eq!(
            err.message,
            "Can't have operator + at the end of a subexpression"
        );
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = lex("a =\n 'x'");
        assert_eq!(tokens[2].position.line, 1);
        assert_eq!(tokens[2].position.column, 1);
    }
}
