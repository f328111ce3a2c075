//! RPN sanity check.
//!
//! Walks the output of the shunting yard with a stack of per-scope operand
//! counters before any thunks are built, so the builder can assume every pop
//! succeeds. Each open paren pushes a fresh scope; a function token closes
//! one and folds it into a single result.

use crate::frontend::FrontendError;
use crate::frontend::token::{Token, TokenKind};
use crate::registry::Registry;

pub fn validate(rpn: &[Token], registry: &Registry) -> Result<(), FrontendError> {
    let mut counts: Vec<i32> = vec![0];

    for token in rpn {
        match token.kind {
            TokenKind::UnaryOperator => {
                if *counts.last().unwrap_or(&0) < 1 {
                    return Err(FrontendError::at(
                        token,
                        format!("Missing parameter(s) for operator {token}"),
                    ));
                }
            }
            TokenKind::Operator => {
                if *counts.last().unwrap_or(&0) < 2 {
                    if token.surface == ";" {
                        return Err(FrontendError::at(token, "Unnecessary semicolon"));
                    }
                    return Err(FrontendError::at(
                        token,
                        format!("Missing parameter(s) for operator {token}"),
                    ));
                }
                if let Some(top) = counts.last_mut() {
                    *top -= 1;
                }
            }
            TokenKind::Function => {
                let got = counts.pop().unwrap_or(0);
                // user-defined functions resolve at run time and go unchecked
                if let Some(entry) = registry.function(&token.surface) {
                    if let Some(expected) = entry.arity {
                        if got != expected as i32 {
                            return Err(FrontendError::at(
                                token,
                                format!(
                                    "Function {token} expected {expected} parameters, got {got}"
                                ),
                            ));
                        }
                    }
                }
                match counts.last_mut() {
                    Some(top) => *top += 1,
                    None => {
                        return Err(FrontendError::at(
                            token,
                            "Too many function calls, maximum scope exceeded",
                        ));
                    }
                }
            }
            TokenKind::OpenParen => counts.push(0),
            _ => {
                if let Some(top) = counts.last_mut() {
                    *top += 1;
                }
            }
        }
    }

    if counts.len() > 1 {
        return Err(FrontendError::plain("Too many unhandled function parameter lists"));
    }
    match counts.last() {
        Some(top) if *top > 1 => Err(FrontendError::plain("Too many numbers or variables")),
        Some(top) if *top < 1 => Err(FrontendError::plain("Empty expression")),
        _ => Ok(()),
    }
}
