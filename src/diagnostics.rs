//! Positioned error reporting.
//!
//! A [`Diagnostic`] is pure renderable data: a headline plus the snippet
//! lines around the offending token. Rendering happens when the diagnostic
//! is built, against the program text held by [`ProgramMeta`], so the value
//! can outlive the engine that produced it. An embedder may install an
//! interceptor to take over snippet formatting entirely.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::frontend::position::Position;
use crate::frontend::token::Token;

/// Replaces the default snippet renderer. Receives the program metadata, the
/// offending token and the bare message; returns the full display lines.
pub type ErrorInterceptor = Rc<dyn Fn(&ProgramMeta, &Token, &str) -> Vec<String>>;

/// Shared, swappable interceptor slot. One slot per engine, shared by every
/// program the engine compiles.
pub type InterceptorSlot = Rc<RefCell<Option<ErrorInterceptor>>>;

/// Shared metadata of one compiled program: its display name (if any) and
/// the final program text, after newline markers have been folded in.
/// Function definitions hold a renamed handle to the same text, so errors
/// inside a function report the function's name.
pub struct ProgramMeta {
    pub name: Option<String>,
    pub source: Rc<str>,
    pub interceptor: InterceptorSlot,
}

impl ProgramMeta {
    pub fn new(
        name: Option<&str>,
        source: impl Into<Rc<str>>,
        interceptor: InterceptorSlot,
    ) -> Rc<Self> {
        Rc::new(ProgramMeta {
            name: name.map(str::to_string),
            source: source.into(),
            interceptor,
        })
    }

    /// Metadata without an engine behind it, mostly for tests.
    pub fn anonymous(source: impl Into<Rc<str>>) -> Rc<Self> {
        ProgramMeta::new(None, source, Rc::new(RefCell::new(None)))
    }

    /// Same program text, different display name.
    pub fn named(self: &Rc<Self>, name: &str) -> Rc<Self> {
        Rc::new(ProgramMeta {
            name: Some(name.to_string()),
            source: Rc::clone(&self.source),
            interceptor: Rc::clone(&self.interceptor),
        })
    }
}

impl fmt::Debug for ProgramMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramMeta")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// The headline, including the position and program name suffix.
    pub message: String,
    pub position: Option<Position>,
    lines: Vec<String>,
}

impl Diagnostic {
    /// A diagnostic with no position, e.g. a whole-program validation error.
    pub fn plain(message: impl Into<String>) -> Self {
        let message = message.into();
        Diagnostic {
            lines: vec![message.clone()],
            position: None,
            message,
        }
    }

    /// Renders the snippet around `token` against the program text. Goes
    /// through the interceptor when one is installed.
    pub fn positioned(meta: &ProgramMeta, token: &Token, message: &str) -> Self {
        if let Some(snoop) = meta.interceptor.borrow().as_ref() {
            let lines = snoop(meta, token, message);
            return Diagnostic {
                message: message.to_string(),
                position: Some(token.position),
                lines,
            };
        }
        let (message, lines) = render(meta, token, message);
        Diagnostic {
            message,
            position: Some(token.position),
            lines,
        }
    }

    /// Full display lines: snippet first, headline last.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

impl std::error::Error for Diagnostic {}

/// Default rendering: for multi-line programs, one line of context on each
/// side of the offending line, which is split at the token with a
/// ` HERE>> ` marker; for one-liners, a forty-character window around the
/// token. The headline carries a one-based position and the program name.
fn render(meta: &ProgramMeta, token: &Token, message: &str) -> (String, Vec<String>) {
    let source_lines: Vec<&str> = meta.source.split('\n').collect();
    let mut out = Vec::new();
    let mut headline = message.to_string();

    if source_lines.len() > 1 {
        let line = token.position.line.min(source_lines.len() - 1);
        let current: Vec<char> = source_lines[line].chars().collect();
        let column = token.position.column.min(current.len());
        if line > 0 {
            out.push(source_lines[line - 1].to_string());
        }
        let left: String = current[..column].iter().collect();
        let right: String = current[column..].iter().collect();
        out.push(format!("{left} HERE>> {right}"));
        if line + 1 < source_lines.len() {
            out.push(source_lines[line + 1].to_string());
        }
        headline.push_str(&format!(" at line {}, pos {}", line + 1, column + 1));
    } else {
        let chars: Vec<char> = meta.source.chars().collect();
        let at = token.position.offset.min(chars.len());
        let left: String = chars[at.saturating_sub(40)..at].iter().collect();
        let right: String = chars[at..(at + 41).min(chars.len())].iter().collect();
        out.push(format!("{left} HERE>> {right}"));
        headline.push_str(&format!(" at pos {}", at + 1));
    }
    if let Some(name) = &meta.name {
        headline.push_str(&format!(" ({name})"));
    }
    out.push(headline.clone());
    (headline, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::token::TokenKind;

    fn token_at(offset: usize, line: usize, column: usize) -> Token {
        Token::new(TokenKind::Operator, "+", Position::new(offset, line, column))
    }

    #[test]
    fn test_single_line_snippet() {
        let meta = ProgramMeta::anonymous("1 + + 2");
        let d = Diagnostic::positioned(&meta, &token_at(4, 0, 4), "Missing parameter(s) for operator");
        assert_eq!(d.message, "Missing parameter(s) for operator at pos 5");
        assert_eq!(d.lines()[0], "1 +  HERE>> + 2");
    }

    #[test]
    fn test_multi_line_snippet_has_context() {
        let meta = ProgramMeta::anonymous("a = 1;\nb = ;\nc = 3");
        let d = Diagnostic::positioned(&meta, &token_at(11, 1, 4), "Unnecessary semicolon");
        assert_eq!(d.message, "Unnecessary semicolon at line 2, pos 5");
        assert_eq!(d.lines()[0], "a = 1;");
        assert_eq!(d.lines()[1], "b =  HERE>> ;");
        assert_eq!(d.lines()[2], "c = 3");
    }

    #[test]
    fn test_named_program_suffix() {
        let meta = ProgramMeta::anonymous("x +").named("boot");
        let d = Diagnostic::positioned(&meta, &token_at(2, 0, 2), "Missing parameter(s) for operator");
        assert!(d.message.ends_with("(boot)"));
    }

    #[test]
    fn test_interceptor_takes_over() {
        let meta = ProgramMeta::anonymous("1 +");
        *meta.interceptor.borrow_mut() = Some(Rc::new(|_, _, msg| vec![format!("custom: {msg}")]));
        let d = Diagnostic::positioned(&meta, &token_at(2, 0, 2), "boom");
        assert_eq!(d.lines(), ["custom: boom"]);
    }
}
