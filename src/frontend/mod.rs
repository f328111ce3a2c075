//! Source text to RPN: lexing, desugaring, and the shunting yard.

pub mod parser;
pub mod position;
pub mod token;
pub mod tokenizer;

use crate::frontend::token::Token;

/// A lexing or parsing failure. The offending token is kept separate from
/// the message because the program text it should be rendered against may
/// still be under rewriting when the error is raised; the compiler turns
/// this into a [`crate::diagnostics::Diagnostic`] once the text settles.
#[derive(Debug, Clone)]
pub struct FrontendError {
    pub message: String,
    pub token: Option<Token>,
}

impl FrontendError {
    pub fn at(token: &Token, message: impl Into<String>) -> FrontendError {
        FrontendError {
            message: message.into(),
            token: Some(token.clone()),
        }
    }

    pub fn plain(message: impl Into<String>) -> FrontendError {
        FrontendError {
            message: message.into(),
            token: None,
        }
    }
}
