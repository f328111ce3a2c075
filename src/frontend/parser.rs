//! Shunting yard.
//!
//! Turns the desugared token stream into reverse Polish order. Two jobs
//! beyond the classic algorithm: an implicit `*` is inserted when a value
//! butts up against an opening parenthesis, and a function's own `(` is
//! forwarded to the output queue so the compiler can tell where one call's
//! arguments start.
//!
//! Newline markers are folded into the program text here: each `$` token
//! overwrites its source character with a real newline, so diagnostics for
//! marker-joined one-liners point into readable multi-line text.

use crate::frontend::FrontendError;
use crate::frontend::token::{Token, TokenKind};
use crate::registry::Registry;

pub fn shunting_yard(
    tokens: Vec<Token>,
    registry: &Registry,
    chars: &mut [char],
) -> Result<Vec<Token>, FrontendError> {
    let mut output: Vec<Token> = Vec::new();
    let mut stack: Vec<Token> = Vec::new();
    let mut last_function: Option<Token> = None;
    let mut previous: Option<Token> = None;

    for token in tokens {
        match token.kind {
            TokenKind::Str | TokenKind::Literal | TokenKind::HexLiteral => {
                if matches!(
                    previous.as_ref().map(|p| p.kind),
                    Some(TokenKind::Literal | TokenKind::HexLiteral | TokenKind::Str)
                ) {
                    return Err(FrontendError::at(&token, "Missing operator"));
                }
                output.push(token.clone());
            }
            TokenKind::Variable => output.push(token.clone()),
            TokenKind::Function => {
                stack.push(token.clone());
                last_function = Some(token.clone());
            }
            TokenKind::Comma => {
                if let Some(prev) = &previous {
                    if prev.kind == TokenKind::Operator {
                        return Err(FrontendError::at(
                            prev,
                            "Missing parameter(s) for operator",
                        ));
                    }
                }
                while matches!(stack.last(), Some(t) if t.kind != TokenKind::OpenParen) {
                    output.push(stack.pop().unwrap());
                }
                if stack.is_empty() {
                    return match &last_function {
                        None => Err(FrontendError::at(&token, "Unexpected comma")),
                        Some(f) => Err(FrontendError::at(f, "Parse error for function")),
                    };
                }
            }
            TokenKind::Operator => {
                if matches!(
                    previous.as_ref().map(|p| p.kind),
                    Some(TokenKind::Comma | TokenKind::OpenParen)
                ) {
                    return Err(FrontendError::at(
                        &token,
                        format!("Missing parameter(s) for operator '{token}'"),
                    ));
                }
                if registry.operator(&token.surface).is_none() {
                    return Err(FrontendError::at(
                        &token,
                        format!("Unknown operator '{token}'"),
                    ));
                }
                shunt_operators(&mut output, &mut stack, registry, &token);
                stack.push(token.clone());
            }
            TokenKind::UnaryOperator => {
                if matches!(
                    previous.as_ref().map(|p| p.kind),
                    Some(kind) if kind != TokenKind::Operator
                        && kind != TokenKind::Comma
                        && kind != TokenKind::OpenParen
                ) {
                    return Err(FrontendError::at(
                        &token,
                        format!("Invalid position for unary operator {token}"),
                    ));
                }
                if registry.operator(&token.surface).is_none() {
                    let bare = token.surface.trim_end_matches('u');
                    return Err(FrontendError::at(
                        &token,
                        format!("Unknown unary operator '{bare}'"),
                    ));
                }
                shunt_operators(&mut output, &mut stack, registry, &token);
                stack.push(token.clone());
            }
            TokenKind::OpenParen => {
                if let Some(prev) = &previous {
                    // implicit multiplication, e.g. 2(a+b) or (a+b)(a-b)
                    if matches!(
                        prev.kind,
                        TokenKind::Literal
                            | TokenKind::CloseParen
                            | TokenKind::Variable
                            | TokenKind::HexLiteral
                    ) {
                        stack.push(token.morphed(TokenKind::Operator, "*"));
                    }
                    // a function's own paren marks the start of its arguments
                    if prev.kind == TokenKind::Function {
                        output.push(token.clone());
                    }
                }
                stack.push(token.clone());
            }
            TokenKind::CloseParen => {
                if let Some(prev) = &previous {
                    if prev.kind == TokenKind::Operator {
                        return Err(FrontendError::at(
                            prev,
                            format!("Missing parameter(s) for operator {prev}"),
                        ));
                    }
                }
                while matches!(stack.last(), Some(t) if t.kind != TokenKind::OpenParen) {
                    output.push(stack.pop().unwrap());
                }
                if stack.pop().is_none() {
                    return Err(FrontendError::plain("Mismatched parentheses"));
                }
                if matches!(stack.last(), Some(t) if t.kind == TokenKind::Function) {
                    output.push(stack.pop().unwrap());
                }
            }
            TokenKind::Marker => {
                if token.surface == "$" {
                    if let Some(slot) = chars.get_mut(token.position.offset) {
                        *slot = '\n';
                    }
                }
            }
        }
        if token.kind != TokenKind::Marker {
            previous = Some(token);
        }
    }

    while let Some(element) = stack.pop() {
        if element.kind == TokenKind::OpenParen || element.kind == TokenKind::CloseParen {
            return Err(FrontendError::at(&element, "Mismatched parentheses"));
        }
        output.push(element);
    }
    Ok(output)
}

fn shunt_operators(output: &mut Vec<Token>, stack: &mut Vec<Token>, registry: &Registry, incoming: &Token) {
    let entry = match registry.operator(&incoming.surface) {
        Some(e) => e.clone(),
        None => return,
    };
    while let Some(top) = stack.last() {
        if top.kind != TokenKind::Operator && top.kind != TokenKind::UnaryOperator {
            break;
        }
        let top_precedence = match registry.operator(&top.surface) {
            Some(e) => e.precedence,
            None => break,
        };
        if (entry.left_assoc && entry.precedence <= top_precedence)
            || entry.precedence < top_precedence
        {
            output.push(stack.pop().unwrap());
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::position::Position;
    use crate::frontend::tokenizer::post_process::post_process;
    use crate::frontend::tokenizer::tokenize;
    use crate::registry::{OperatorEntry, OperatorImp, Registry, precedence};
    use std::rc::Rc;

    fn registry() -> Registry {
        let mut r = Registry::new();
        let binary = |prec, left| OperatorEntry {
            precedence: prec,
            left_assoc: left,
            imp: OperatorImp::EagerBinary(Rc::new(|a, b| a.add(&b))),
        };
        r.put_operator("+", binary(precedence::ADDITIVE, true));
        r.put_operator("-", binary(precedence::ADDITIVE, true));
        r.put_operator("*", binary(precedence::MULTIPLICATIVE, true));
        r.put_operator("/", binary(precedence::MULTIPLICATIVE, true));
        r.put_operator("^", binary(precedence::EXPONENT, false));
        r.put_operator("=", binary(precedence::ASSIGN, false));
        r.put_operator(";", binary(precedence::SEQUENCE, true));
        r.put_operator("-", OperatorEntry {
            precedence: precedence::UNARY,
            left_assoc: false,
            imp: OperatorImp::EagerUnary(Rc::new(Ok)),
        });
        r
    }

    fn rpn(src: &str) -> String {
        let mut chars: Vec<char> = src.chars().collect();
        let r = registry();
        let tokens = post_process(tokenize(&chars, &r, false, true).unwrap());
        shunting_yard(tokens, &r, &mut chars)
            .unwrap()
            .iter()
            .map(|t| t.surface.clone())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn rpn_err(src: &str) -> FrontendError {
        let mut chars: Vec<char> = src.chars().collect();
        let r = registry();
        let tokens = post_process(tokenize(&chars, &r, false, true).unwrap());
        shunting_yard(tokens, &r, &mut chars).unwrap_err()
    }

    #[test]
    fn test_precedence_ordering() {
        assert_eq!(rpn("2+3*4"), "2 3 4 * +");
        assert_eq!(rpn("(2+3)*4"), "2 3 + 4 *");
    }

    #[test]
    fn test_right_associative_exponent() {
        assert_eq!(rpn("2^3^2"), "2 3 2 ^ ^");
    }

    #[test]
    fn test_left_associative_subtraction() {
        assert_eq!(rpn("9-3-2"), "9 3 - 2 -");
    }

    #[test]
    fn test_unary_binds_tighter_than_multiplication() {
        assert_eq!(rpn("-2*3"), "2 -u 3 *");
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(rpn("2(3+4)"), "2 3 4 + *");
        assert_eq!(rpn("(1+1)(3+4)"), "1 1 + 3 4 + *");
    }

    #[test]
    fn test_function_arguments_delimited_by_paren() {
        // the function's open paren rides along in the output queue
        assert_eq!(rpn("f(1,2)"), "( 1 2 f");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(rpn("a=b=1"), "a b 1 = =");
    }

    #[test]
    fn test_mismatched_parens() {
        assert_eq!(rpn_err("(1+2").message, "Mismatched parentheses");
        assert_eq!(rpn_err("1+2)").message, "Mismatched parentheses");
    }

    #[test]
    fn test_unknown_operator_reported() {
        assert_eq!(rpn_err("1 ? 2").message, "Unknown operator '?'");
    }

    #[test]
    fn test_unexpected_comma() {
        assert_eq!(rpn_err("1, 2").message, "Unexpected comma");
    }

    #[test]
    fn test_newline_marker_rewrites_source() {
        let src = "1 +$2";
        let mut chars: Vec<char> = src.chars().collect();
        let r = registry();
        let tokens = post_process(tokenize(&chars, &r, false, true).unwrap());
        shunting_yard(tokens, &r, &mut chars).unwrap();
        let rewritten: String = chars.iter().collect();
        assert_eq!(rewritten, "1 +\n2");
    }

    #[test]
    fn test_error_positions_point_at_offender() {
        let err = rpn_err("1 ? 2");
        assert_eq!(err.token.unwrap().position, Position::new(2, 0, 2));
    }
}
