//! Operator set: arithmetic, comparison, logic, assignment and definition.

use std::rc::Rc;

use regex::Regex;

use crate::engine::EngineBuilder;
use crate::registry::precedence;
use crate::runtime::context::Context;
use crate::runtime::function::FunctionDefinition;
use crate::runtime::signal::{EvalResult, Flow};
use crate::runtime::thunk::EvalKind;
use crate::runtime::value::{MapKey, Value, ValueData};
use crate::stdlib::{bound_name, set_value};

pub(crate) fn apply(b: &mut EngineBuilder) {
    b.add_binary_operator("+", precedence::ADDITIVE, true, |a, b| a.add(&b));
    b.add_binary_operator("-", precedence::ADDITIVE, true, |a, b| a.subtract(&b));
    b.add_binary_operator("*", precedence::MULTIPLICATIVE, true, |a, b| a.multiply(&b));
    b.add_binary_operator("/", precedence::MULTIPLICATIVE, true, |a, b| a.divide(&b));
    b.add_binary_operator("%", precedence::MULTIPLICATIVE, true, |a, b| {
        Ok(Value::number(a.as_number()? % b.as_number()?))
    });
    b.add_binary_operator("^", precedence::EXPONENT, false, |a, b| {
        Ok(Value::number(a.as_number()?.powf(b.as_number()?)))
    });

    // shift counts wrap modulo the word size, like every hardware shifter;
    // shift towers associate right
    b.add_binary_operator("<<", precedence::SHIFT, false, |a, b| {
        Ok(Value::number(a.as_int()?.wrapping_shl(b.as_int()? as u32) as f64))
    });
    b.add_binary_operator(">>", precedence::SHIFT, false, |a, b| {
        Ok(Value::number(a.as_int()?.wrapping_shr(b.as_int()? as u32) as f64))
    });
    b.add_binary_operator("&", precedence::BIT_AND, true, |a, b| {
        Ok(Value::number((a.as_int()? & b.as_int()?) as f64))
    });
    b.add_binary_operator("|", precedence::BIT_OR, true, |a, b| {
        Ok(Value::number((a.as_int()? | b.as_int()?) as f64))
    });

    b.add_binary_operator("~", precedence::COMPARISON, true, |a, b| match_in(&a, &b));

    b.add_binary_operator(">", precedence::COMPARISON, false, |a, b| {
        Ok(Value::bool(a.compare(&b).is_gt()))
    });
    b.add_binary_operator(">=", precedence::COMPARISON, false, |a, b| {
        Ok(Value::bool(a.compare(&b).is_ge()))
    });
    b.add_binary_operator("<", precedence::COMPARISON, false, |a, b| {
        Ok(Value::bool(a.compare(&b).is_lt()))
    });
    b.add_binary_operator("<=", precedence::COMPARISON, false, |a, b| {
        Ok(Value::bool(a.compare(&b).is_le()))
    });
    b.add_binary_operator("==", precedence::EQUALITY, false, |a, b| {
        Ok(Value::bool(a.val_equals(&b)))
    });
    b.add_binary_operator("!=", precedence::EQUALITY, false, |a, b| {
        Ok(Value::bool(!a.val_equals(&b)))
    });

    b.add_lazy_binary_operator(
        "&&",
        precedence::AND,
        false,
        Rc::new(|ctx, _, _, _, lhs, rhs| {
            let first = lhs.eval(ctx, EvalKind::Boolean)?;
            if !first.truthy() {
                return Ok(first);
            }
            let second = rhs.eval(ctx, EvalKind::Boolean)?;
            Ok(if second.truthy() { second } else { Value::bool(false) })
        }),
    );
    b.add_lazy_binary_operator(
        "||",
        precedence::OR,
        false,
        Rc::new(|ctx, _, _, _, lhs, rhs| {
            let first = lhs.eval(ctx, EvalKind::Boolean)?;
            if first.truthy() {
                return Ok(first);
            }
            let second = rhs.eval(ctx, EvalKind::Boolean)?;
            Ok(if second.truthy() { second } else { Value::bool(false) })
        }),
    );

    b.add_lazy_binary_operator(
        "=",
        precedence::ASSIGN,
        false,
        Rc::new(|ctx, _, _, _, lhs, rhs| {
            let target = lhs.eval(ctx, EvalKind::None)?;
            let value = rhs.eval(ctx, EvalKind::None)?;
            if let Some(targets) = unpack_targets(&target) {
                if let ValueData::List { items, .. } = &value.data {
                    let (names, _) = targets?;
                    return unpack_assign(ctx, &names, items, |_, item| Ok(item.clone()));
                }
            }
            let name = bound_name(&target)?;
            let copy = value.rebound_to(Rc::clone(&name));
            set_value(ctx, &name, copy.clone());
            Ok(copy)
        }),
    );

    b.add_lazy_binary_operator(
        "+=",
        precedence::ASSIGN,
        false,
        Rc::new(|ctx, _, _, _, lhs, rhs| {
            let target = lhs.eval(ctx, EvalKind::None)?;
            let value = rhs.eval(ctx, EvalKind::None)?;
            if let Some(targets) = unpack_targets(&target) {
                if let ValueData::List { items, .. } = &value.data {
                    let (names, lhs_items) = targets?;
                    return unpack_assign(ctx, &names, items, |i, item| lhs_items[i].add(item));
                }
            }
            let name = bound_name(&target)?;
            // appending to a list grows it; every other type accumulates
            let next = match &target.data {
                ValueData::List { items, .. } => {
                    let mut grown = items.clone();
                    grown.push(value.unbound());
                    Value::list(grown)
                }
                _ => target.add(&value)?,
            };
            let copy = next.rebound_to(Rc::clone(&name));
            set_value(ctx, &name, copy.clone());
            Ok(copy)
        }),
    );

    b.add_lazy_binary_operator(
        "<>",
        precedence::ASSIGN,
        false,
        Rc::new(|ctx, _, _, _, lhs, rhs| {
            let first = lhs.eval(ctx, EvalKind::None)?;
            let second = rhs.eval(ctx, EvalKind::None)?;
            match (unpack_targets(&first), unpack_targets(&second)) {
                (Some(left), Some(right)) => {
                    let (left_names, left_items) = left?;
                    let (right_names, right_items) = right?;
                    if left_names.len() != right_names.len() {
                        return Err(Flow::internal("Cannot swap lists of uneven sizes"));
                    }
                    for i in 0..left_names.len() {
                        let (ln, rn) = (&left_names[i], &right_names[i]);
                        set_value(ctx, ln, right_items[i].rebound_to(Rc::clone(ln)));
                        set_value(ctx, rn, left_items[i].rebound_to(Rc::clone(rn)));
                    }
                    Ok(first)
                }
                _ => {
                    let lname = bound_name(&first)?;
                    let rname = bound_name(&second)?;
                    set_value(ctx, &lname, second.rebound_to(Rc::clone(&lname)));
                    set_value(ctx, &rname, first.rebound_to(Rc::clone(&rname)));
                    Ok(first)
                }
            }
        }),
    );

    b.add_lazy_binary_operator(
        "->",
        precedence::DEFINE,
        false,
        Rc::new(|ctx, _, meta, token, lhs, rhs| {
            let head = lhs.eval(ctx, EvalKind::Signature)?;
            match &head.data {
                ValueData::Signature(sig) => {
                    if ctx.registry().has_function(&sig.name) {
                        return Err(Flow::internal(format!(
                            "Function {} would mask a built-in function",
                            sig.name
                        )));
                    }
                    ctx.host().define_function(Rc::new(FunctionDefinition {
                        name: sig.name.clone(),
                        params: sig.params.clone(),
                        outer: sig.outers.clone(),
                        body: rhs.clone(),
                        token: token.clone(),
                        meta: meta.named(&sig.name),
                    }));
                    Ok(Value::str("OK"))
                }
                _ => {
                    // `a -> expr` stores the unevaluated expression itself
                    let name = bound_name(&head)?;
                    ctx.set_variable(&name, rhs.clone());
                    Ok(Value::str("OK"))
                }
            }
        }),
    );

    b.add_lazy_binary_operator(
        ";",
        precedence::SEQUENCE,
        true,
        Rc::new(|ctx, _, _, _, lhs, rhs| {
            lhs.eval(ctx, EvalKind::Void)?;
            rhs.eval(ctx, EvalKind::None)
        }),
    );

    b.add_unary_operator("-", |v| Ok(Value::number(-v.as_number()?)));
    b.add_unary_operator("+", |v| Ok(Value::number(v.as_number()?)));
    b.add_lazy_unary_operator(
        "!",
        Rc::new(|ctx, _, _, _, operand| {
            Ok(Value::bool(!operand.eval(ctx, EvalKind::Boolean)?.truthy()))
        }),
    );
}

/// Targets of an unpacking assignment: a freshly constructed `l(...)` of
/// variables, as names plus the values read from them. A stored list never
/// unpacks.
#[allow(clippy::type_complexity)]
fn unpack_targets(value: &Value) -> Option<Result<(Vec<Rc<str>>, Vec<Value>), Flow>> {
    match &value.data {
        ValueData::List { items, constructor: true } => {
            let names: Result<Vec<Rc<str>>, Flow> = items.iter().map(bound_name).collect();
            Some(names.map(|names| (names, items.clone())))
        }
        _ => None,
    }
}

fn unpack_assign(
    ctx: &mut Context,
    names: &[Rc<str>],
    values: &[Value],
    combine: impl Fn(usize, &Value) -> EvalResult,
) -> EvalResult {
    if values.len() > names.len() {
        return Err(Flow::internal("Too many values to unpack"));
    }
    if values.len() < names.len() {
        return Err(Flow::internal("Too few values to unpack"));
    }
    for (i, (name, value)) in names.iter().zip(values).enumerate() {
        set_value(ctx, name, combine(i, value)?.rebound_to(Rc::clone(name)));
    }
    Ok(Value::bool(true))
}

/// The `~` match operator. Strings match a regular expression and yield the
/// first group (or the whole match), lists yield the index of the needle,
/// maps yield the value under the key.
fn match_in(subject: &Value, needle: &Value) -> EvalResult {
    match &subject.data {
        ValueData::Str(s) => {
            let pattern = needle.display();
            let re = Regex::new(&pattern)
                .map_err(|_| Flow::internal(format!("Invalid regular expression: {pattern}")))?;
            match re.captures(s) {
                Some(caps) if caps.len() > 1 => Ok(caps
                    .get(1)
                    .map_or_else(Value::null, |m| Value::str(m.as_str()))),
                Some(caps) => Ok(Value::str(&caps[0])),
                None => Ok(Value::null()),
            }
        }
        ValueData::List { items, .. } => Ok(items
            .iter()
            .position(|item| item.val_equals(needle))
            .map_or_else(Value::null, |i| Value::number(i as f64))),
        ValueData::Map(entries) => {
            let key = MapKey::from_value(needle)?;
            Ok(entries.get(&key).cloned().unwrap_or_else(Value::null))
        }
        _ => Ok(Value::null()),
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;

    fn run(src: &str) -> String {
        Engine::new().run(src).unwrap().display()
    }

    fn run_err(src: &str) -> String {
        Engine::new().run(src).unwrap_err().message
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(run("2 + 3 * 4"), "14");
        assert_eq!(run("2 ^ 3 ^ 2"), "512");
        assert_eq!(run("7 % 4"), "3");
        assert_eq!(run("-2 ^ 2"), "4");
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(run("6 & 3"), "2");
        assert_eq!(run("6 | 3"), "7");
        assert_eq!(run("1 << 4"), "16");
        assert_eq!(run("-8 >> 1"), "-4");
    }

    #[test]
    fn test_shift_towers_associate_right() {
        assert_eq!(run("1 << 2 << 3"), "65536");
        assert_eq!(run("256 >> 2 >> 1"), "128");
    }

    #[test]
    fn test_assignment_returns_and_stores() {
        assert_eq!(run("a = 3; a + 1"), "4");
        assert_eq!(run("a = b = 2; a + b"), "4");
        assert_eq!(run("a = 1; a += 5; a"), "6");
    }

    #[test]
    fn test_unpacking_assignment() {
        assert_eq!(run("l(a, b) = l(1, 2); a + b"), "3");
        assert_eq!(run_err("l(a, b) = l(1, 2, 3)"), "Too many values to unpack at pos 9");
        assert_eq!(run_err("l(a, b, c) = l(1, 2)"), "Too few values to unpack at pos 12");
    }

    #[test]
    fn test_stored_lists_do_not_unpack() {
        // once bound, a list assigns as a whole value
        assert_eq!(run("pair = l(9, 9); pair = l(1, 2, 3); length(pair)"), "3");
    }

    #[test]
    fn test_swap() {
        assert_eq!(run("a = 1; b = 2; a <> b; str('%d %d', a, b)"), "2 1");
        assert_eq!(run("a = 1; b = 2; c = 3; d = 4; l(a, b) <> l(c, d); str('%d %d %d %d', a, b, c, d)"), "3 4 1 2");
    }

    #[test]
    fn test_append_with_plus_equals() {
        assert_eq!(run("xs = l(1, 2); xs += 3; xs"), "[1, 2, 3]");
    }

    #[test]
    fn test_logic_returns_deciding_operand() {
        assert_eq!(run("0 || 5"), "5");
        assert_eq!(run("3 && 7"), "7");
        assert_eq!(run("0 && 7"), "0");
        assert_eq!(run("!0"), "true");
    }

    #[test]
    fn test_equality_crosses_types() {
        assert_eq!(run("1 == '1'"), "true");
        assert_eq!(run("null == 0"), "false");
        assert_eq!(run("2 != 3"), "true");
    }

    #[test]
    fn test_match_operator() {
        assert_eq!(run("'year 2024 ad' ~ '\\\\d+'"), "2024");
        assert_eq!(run("'abc' ~ 'x'"), "null");
        assert_eq!(run("l(10, 20, 30) ~ 20"), "1");
        assert_eq!(run("m(l('k', 5)) ~ 'k'"), "5");
    }

    #[test]
    fn test_match_binds_looser_than_arithmetic() {
        // the needle expression is evaluated first
        assert_eq!(run("l(10, 20, 30) ~ 10 + 10"), "1");
        assert_eq!(run("'n 42' ~ '\\\\d' + '+'"), "42");
    }

    #[test]
    fn test_function_definition_and_masking() {
        assert_eq!(run("f(x) -> x + 1; f(4)"), "5");
        let msg = run_err("sqrt(x) -> x");
        assert!(msg.starts_with("Function sqrt would mask a built-in function"));
    }

    #[test]
    fn test_arrow_binds_expression_to_variable() {
        // the right side stays lazy and re-evaluates on each read
        assert_eq!(run("a -> b + 1; b = 10; a"), "11");
    }
}
