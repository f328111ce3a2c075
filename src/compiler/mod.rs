//! RPN to thunk tree.
//!
//! The builder resolves every operator and function strategy once, at
//! compile time, and captures it in a closure together with its token. At
//! run time a node evaluates its operands (eagerly or not, per strategy) and
//! reframes any floating failure against its own source position.

pub mod validate;

use std::rc::Rc;

use crate::diagnostics::ProgramMeta;
use crate::frontend::FrontendError;
use crate::frontend::token::{Token, TokenKind};
use crate::registry::{FunctionImp, OperatorImp, Registry};
use crate::runtime::signal::EvalResult;
use crate::runtime::thunk::{EvalKind, Thunk};
use crate::runtime::value::Value;

enum Slot {
    /// Argument-list boundary, pushed for each function's own paren.
    Start,
    Value(Thunk),
}

pub fn build(
    rpn: Vec<Token>,
    registry: &Rc<Registry>,
    meta: &Rc<ProgramMeta>,
) -> Result<Thunk, FrontendError> {
    let mut stack: Vec<Slot> = Vec::new();

    for token in rpn {
        match token.kind {
            TokenKind::UnaryOperator => {
                let operand = pop_value(&mut stack, &token)?;
                let entry = registry
                    .operator(&token.surface)
                    .ok_or_else(|| unknown(&token))?
                    .clone();
                let meta = Rc::clone(meta);
                stack.push(Slot::Value(match entry.imp {
                    OperatorImp::EagerUnary(f) => Thunk::new(move |ctx, _| {
                        attribute(
                            operand.eval(ctx, EvalKind::None).and_then(|v| f(v)),
                            &meta,
                            &token,
                        )
                    }),
                    OperatorImp::LazyUnary(f) => Thunk::new(move |ctx, kind| {
                        attribute(f(ctx, kind, &meta, &token, &operand), &meta, &token)
                    }),
                    _ => return Err(unknown(&token)),
                }));
            }
            TokenKind::Operator => {
                let rhs = pop_value(&mut stack, &token)?;
                let lhs = pop_value(&mut stack, &token)?;
                let entry = registry
                    .operator(&token.surface)
                    .ok_or_else(|| unknown(&token))?
                    .clone();
                let meta = Rc::clone(meta);
                stack.push(Slot::Value(match entry.imp {
                    OperatorImp::EagerBinary(f) => Thunk::new(move |ctx, _| {
                        let out = lhs
                            .eval(ctx, EvalKind::None)
                            .and_then(|a| Ok((a, rhs.eval(ctx, EvalKind::None)?)))
                            .and_then(|(a, b)| f(a, b));
                        attribute(out, &meta, &token)
                    }),
                    OperatorImp::LazyBinary(f) => Thunk::new(move |ctx, kind| {
                        attribute(f(ctx, kind, &meta, &token, &lhs, &rhs), &meta, &token)
                    }),
                    _ => return Err(unknown(&token)),
                }));
            }
            TokenKind::Variable => {
                let name = token.surface.clone();
                stack.push(Slot::Value(Thunk::new(move |ctx, kind| {
                    let thunk = match ctx.get_variable(&name) {
                        Some(t) => t,
                        None => {
                            // reading a variable brings it into being
                            let zero =
                                Thunk::constant(Value::number(0.0).rebound_to(name.as_str()));
                            ctx.set_variable(&name, zero.clone());
                            zero
                        }
                    };
                    thunk.eval(ctx, kind)
                })));
            }
            TokenKind::Function => {
                let name = token.surface.to_lowercase();
                let known = registry.has_function(&name);
                let mut args: Vec<Thunk> = Vec::new();
                while let Some(slot) = stack.pop() {
                    match slot {
                        Slot::Start => break,
                        Slot::Value(t) => args.insert(0, t),
                    }
                }
                let entry = if known {
                    registry.function(&name).ok_or_else(|| unknown(&token))?.clone()
                } else {
                    // unresolved names route through the dispatch entry with
                    // the call name appended as a final string argument
                    args.push(Thunk::constant(Value::str(name)));
                    registry.function(".").ok_or_else(|| unknown(&token))?.clone()
                };
                let meta = Rc::clone(meta);
                stack.push(Slot::Value(match entry.imp {
                    FunctionImp::Eager(f) => Thunk::new(move |ctx, _| {
                        let out = eval_all(ctx, &args).and_then(|values| f(values));
                        attribute(out, &meta, &token)
                    }),
                    FunctionImp::Lazy(f) => Thunk::new(move |ctx, kind| {
                        attribute(f(ctx, kind, &meta, &token, &args), &meta, &token)
                    }),
                }));
            }
            TokenKind::OpenParen => stack.push(Slot::Start),
            TokenKind::Literal => {
                let parsed: f64 = token
                    .surface
                    .parse()
                    .map_err(|_| FrontendError::at(&token, "Not a number"))?;
                stack.push(Slot::Value(Thunk::constant(Value::number(parsed))));
            }
            TokenKind::HexLiteral => {
                stack.push(Slot::Value(Thunk::constant(Value::number(parse_hex(
                    &token,
                )?))));
            }
            TokenKind::Str => {
                stack.push(Slot::Value(Thunk::constant(Value::str(
                    token.surface.clone(),
                ))));
            }
            _ => return Err(unknown(&token)),
        }
    }

    match stack.pop() {
        Some(Slot::Value(thunk)) => Ok(thunk),
        _ => Err(FrontendError::plain("Empty expression")),
    }
}

fn unknown(token: &Token) -> FrontendError {
    FrontendError::at(token, format!("Unexpected token '{}'", token.surface))
}

fn pop_value(stack: &mut Vec<Slot>, token: &Token) -> Result<Thunk, FrontendError> {
    match stack.pop() {
        Some(Slot::Value(t)) => Ok(t),
        _ => Err(unknown(token)),
    }
}

fn eval_all(ctx: &mut crate::runtime::context::Context, args: &[Thunk]) -> Result<Vec<Value>, crate::runtime::signal::Flow> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(arg.eval(ctx, EvalKind::None)?);
    }
    Ok(values)
}

fn attribute(
    out: EvalResult,
    meta: &Rc<ProgramMeta>,
    token: &Token,
) -> EvalResult {
    out.map_err(|flow| flow.reframe(meta, token))
}

/// Hex literals fold digit by digit so values beyond `i64` degrade to the
/// nearest double instead of failing.
fn parse_hex(token: &Token) -> Result<f64, FrontendError> {
    let digits = token.surface.get(2..).unwrap_or("");
    if digits.is_empty() {
        return Err(FrontendError::at(token, "Not a number"));
    }
    let mut acc: f64 = 0.0;
    for ch in digits.chars() {
        match ch.to_digit(16) {
            Some(d) => acc = acc * 16.0 + f64::from(d),
            None => return Err(FrontendError::at(token, "Not a number")),
        }
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::position::Position;
    use crate::registry::{FunctionEntry, OperatorEntry, precedence};
    use crate::runtime::context::Context;
    use crate::runtime::host::Host;

    fn tok(kind: TokenKind, surface: &str) -> Token {
        Token::new(kind, surface, Position::default())
    }

    fn registry() -> Rc<Registry> {
        let mut r = Registry::new();
        r.put_operator("+", OperatorEntry {
            precedence: precedence::ADDITIVE,
            left_assoc: true,
            imp: OperatorImp::EagerBinary(Rc::new(|a, b| a.add(&b))),
        });
        r.put_function("sum", FunctionEntry {
            arity: None,
            imp: FunctionImp::Eager(Rc::new(|values| {
                let mut acc = Value::number(0.0);
                for v in values {
                    acc = acc.add(&v)?;
                }
                Ok(acc)
            })),
        });
        Rc::new(r)
    }

    fn eval(rpn: Vec<Token>) -> Value {
        let registry = registry();
        let meta = ProgramMeta::anonymous("test");
        let thunk = build(rpn, &registry, &meta).unwrap();
        let mut ctx = Context::new(Host::new(""), Rc::clone(&registry));
        thunk.eval(&mut ctx, EvalKind::None).unwrap()
    }

    #[test]
    fn test_binary_operator_evaluates_left_to_right() {
        let out = eval(vec![
            tok(TokenKind::Literal, "2"),
            tok(TokenKind::Literal, "3"),
            tok(TokenKind::Operator, "+"),
        ]);
        assert_eq!(out.as_number().unwrap(), 5.0);
    }

    #[test]
    fn test_function_call_consumes_scope() {
        let out = eval(vec![
            tok(TokenKind::OpenParen, "("),
            tok(TokenKind::Literal, "1"),
            tok(TokenKind::Literal, "2"),
            tok(TokenKind::Literal, "3"),
            tok(TokenKind::Function, "sum"),
        ]);
        assert_eq!(out.as_number().unwrap(), 6.0);
    }

    #[test]
    fn test_hex_literal_folds() {
        let out = eval(vec![tok(TokenKind::HexLiteral, "0xFF")]);
        assert_eq!(out.as_number().unwrap(), 255.0);
    }

    #[test]
    fn test_bad_literal_is_compile_error() {
        let registry = registry();
        let meta = ProgramMeta::anonymous("test");
        let err = build(vec![tok(TokenKind::Literal, "1.2.3")], &registry, &meta).unwrap_err();
        assert_eq!(err.message, "Not a number");
        let err = build(vec![tok(TokenKind::HexLiteral, "0xZZ")], &registry, &meta).unwrap_err();
        assert_eq!(err.message, "Not a number");
    }

    #[test]
    fn test_variable_reads_vivify_zero() {
        let registry = registry();
        let meta = ProgramMeta::anonymous("test");
        let thunk = build(vec![tok(TokenKind::Variable, "x")], &registry, &meta).unwrap();
        let mut ctx = Context::new(Host::new(""), Rc::clone(&registry));
        let out = thunk.eval(&mut ctx, EvalKind::None).unwrap();
        assert_eq!(out.as_number().unwrap(), 0.0);
        assert_eq!(out.bound.as_deref(), Some("x"));
        assert!(ctx.get_variable("x").is_some());
    }
}
