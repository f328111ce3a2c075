//! Non-local control flow and runtime failures.
//!
//! Everything that interrupts straight-line evaluation travels through the
//! `Err` side of [`EvalResult`]: `return`, `throw` and `exit` as much as
//! genuine errors. Callers that understand a given signal absorb it, the
//! rest propagate with `?`.

use crate::diagnostics::{Diagnostic, ProgramMeta};
use crate::frontend::token::Token;
use crate::runtime::value::Value;

pub type EvalResult = Result<Value, Flow>;

/// A control signal or failure travelling up the thunk tree.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Unwinds to the nearest function call frame.
    Return(Value),
    /// Unwinds to the nearest `try`, or to the top level.
    Throw(Value),
    /// Unwinds unconditionally to the top level.
    Exit(Value),
    Error(Problem),
}

/// A failure that has not necessarily been attributed to a source position
/// yet. `Internal` and `Math` are raised where the position is unknown and
/// reframed into `Positioned` by the nearest operator or call site.
#[derive(Debug, Clone)]
pub enum Problem {
    Internal(String),
    Math(String),
    TooDeep,
    Positioned(Diagnostic),
}

impl Flow {
    pub fn internal(message: impl Into<String>) -> Flow {
        Flow::Error(Problem::Internal(message.into()))
    }

    pub fn math(message: impl Into<String>) -> Flow {
        Flow::Error(Problem::Math(message.into()))
    }

    pub fn positioned(meta: &ProgramMeta, token: &Token, message: &str) -> Flow {
        Flow::Error(Problem::Positioned(Diagnostic::positioned(meta, token, message)))
    }

    /// Attributes a floating failure to `token`. Control signals and already
    /// positioned errors pass through unchanged.
    pub fn reframe(self, meta: &ProgramMeta, token: &Token) -> Flow {
        match self {
            Flow::Error(Problem::Internal(m)) => Flow::positioned(meta, token, &m),
            Flow::Error(Problem::Math(m)) => {
                Flow::positioned(meta, token, &format!("Your math is wrong, {m}"))
            }
            other => other,
        }
    }
}
