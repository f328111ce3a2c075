//! Interaction with the world outside the expression: output, time,
//! randomness, and the variable table itself.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::engine::EngineBuilder;
use crate::runtime::signal::Flow;
use crate::runtime::thunk::EvalKind;
use crate::runtime::value::{Value, ValueData};
use crate::stdlib::items_of;

pub(crate) fn apply(b: &mut EngineBuilder) {
    let sink = b.sink();
    b.add_unary_function("print", move |v| {
        let text = v.as_text()?;
        (*sink.borrow_mut())(&text);
        Ok(v)
    });

    // under a condition, string spellings of falsehood count as false
    b.add_lazy_function(
        "bool",
        Some(1),
        Rc::new(|ctx, _, _, _, args| {
            let v = args[0].eval(ctx, EvalKind::Boolean)?;
            if let ValueData::Str(s) = &v.data {
                if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("null") {
                    return Ok(Value::bool(false));
                }
            }
            Ok(Value::number(if v.truthy() { 1.0 } else { 0.0 }))
        }),
    );

    b.add_unary_function("number", |v| {
        if v.is_numeric() {
            return Ok(Value::number(v.as_number()?));
        }
        if let ValueData::Str(s) = &v.data {
            if let Ok(parsed) = s.trim().parse::<f64>() {
                return Ok(Value::number(parsed));
            }
        }
        Ok(Value::null())
    });

    b.add_function("str", |args| {
        let Some((template, rest)) = args.split_first() else {
            return Err(Flow::internal("str requires at least one argument"));
        };
        let template = template.as_text()?;
        if rest.is_empty() {
            return Ok(Value::str(template));
        }
        let values: Vec<Value> = match (rest.len(), items_of(&rest[0])) {
            (1, Some(items)) => items.to_vec(),
            _ => rest.to_vec(),
        };
        Ok(Value::str(format_template(&template, &values)?))
    });

    b.add_unary_function("length", |v| Ok(Value::number(v.len() as f64)));

    b.add_lazy_function(
        "rand",
        Some(1),
        Rc::new(|ctx, kind, _, _, args| {
            let v = args[0].eval(ctx, EvalKind::None)?;
            if let ValueData::List { items, .. } = &v.data {
                if items.is_empty() {
                    return Ok(Value::null());
                }
                let i = (next_random() * items.len() as f64) as usize;
                return Ok(items[i.min(items.len() - 1)].clone());
            }
            let scaled = v.as_number()? * next_random();
            if kind == EvalKind::Boolean {
                return Ok(Value::bool(scaled >= 1.0));
            }
            Ok(Value::number(scaled))
        }),
    );

    b.add_unary_function("sleep", |v| {
        let millis = v.as_int()?;
        if millis > 0 {
            std::thread::sleep(Duration::from_millis(millis as u64));
        }
        Ok(v)
    });

    // milliseconds since the first call, with microsecond resolution
    b.add_lazy_function(
        "time",
        Some(0),
        Rc::new(|_, _, _, _, _| {
            static START: OnceLock<Instant> = OnceLock::new();
            let start = START.get_or_init(Instant::now);
            Ok(Value::number(start.elapsed().as_micros() as f64 / 1000.0))
        }),
    );

    b.add_lazy_function(
        "var",
        Some(1),
        Rc::new(|ctx, kind, _, _, args| {
            let name = args[0].eval(ctx, EvalKind::None)?.display();
            let thunk = match ctx.get_variable(&name) {
                Some(t) => t,
                None => {
                    let zero = crate::runtime::thunk::Thunk::constant(
                        Value::number(0.0).rebound_to(name.as_str()),
                    );
                    ctx.set_variable(&name, zero.clone());
                    zero
                }
            };
            thunk.eval(ctx, kind)
        }),
    );

    b.add_lazy_function(
        "undef",
        Some(1),
        Rc::new(|ctx, _, _, _, args| {
            let name = args[0].eval(ctx, EvalKind::None)?.display();
            if name.starts_with('_') {
                return Err(Flow::internal(
                    "Cannot replace local built-in variables, i.e. those that start with '_'",
                ));
            }
            if name.ends_with('*') {
                let prefix = name.trim_end_matches('*');
                let host = Rc::clone(ctx.host());
                for f in host.function_names() {
                    if f.starts_with(prefix) {
                        host.remove_function(&f);
                    }
                }
                for g in host.global_names() {
                    if g.starts_with(prefix) {
                        host.remove_global(&g);
                    }
                }
                for local in ctx.local_names() {
                    if local.starts_with(prefix) {
                        ctx.remove_local(&local);
                    }
                }
            } else {
                let host = Rc::clone(ctx.host());
                host.remove_function(&name);
                if name.starts_with("global_") {
                    host.remove_global(&name);
                } else {
                    ctx.remove_local(&name);
                }
            }
            Ok(Value::null())
        }),
    );

    b.add_lazy_function(
        "vars",
        Some(1),
        Rc::new(|ctx, _, _, _, args| {
            let prefix = args[0].eval(ctx, EvalKind::None)?.display();
            let mut names = if prefix.starts_with("global") {
                ctx.host().global_names()
            } else {
                ctx.local_names()
            };
            names.retain(|n| n.starts_with(&prefix));
            names.sort();
            Ok(Value::list(names.into_iter().map(Value::str).collect()))
        }),
    );
}

/// xorshift64*, seeded once per thread from the wall clock.
fn next_random() -> f64 {
    thread_local! {
        static STATE: Cell<u64> = Cell::new(random_seed());
    }
    STATE.with(|state| {
        let mut x = state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        state.set(x);
        let bits = x.wrapping_mul(0x2545_f491_4f6c_dd1d);
        (bits >> 11) as f64 / (1u64 << 53) as f64
    })
}

fn random_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0x9e37_79b9, |d| d.subsec_nanos() as u64 ^ d.as_secs());
    nanos | 1
}

struct Spec {
    text: String,
    left_align: bool,
    zero_pad: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
}

/// `%`-template formatting in the usual printf shape: flags, width,
/// precision, one conversion letter.
fn format_template(template: &str, args: &[Value]) -> Result<String, Flow> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut next_arg = 0;
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let spec = parse_spec(&chars, &mut i)?;
        if spec.conversion == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(next_arg) else {
            return Err(Flow::internal(format!("Not enough arguments for {}", spec.text)));
        };
        next_arg += 1;
        out.push_str(&render_spec(&spec, arg)?);
    }
    Ok(out)
}

fn parse_spec(chars: &[char], i: &mut usize) -> Result<Spec, Flow> {
    let start = *i;
    *i += 1;
    let mut spec = Spec {
        text: String::new(),
        left_align: false,
        zero_pad: false,
        width: None,
        precision: None,
        conversion: '%',
    };
    while let Some(&c) = chars.get(*i) {
        match c {
            '-' => spec.left_align = true,
            '0' if spec.width.is_none() => spec.zero_pad = true,
            '+' | ' ' | '#' | ',' | '(' => {}
            _ => break,
        }
        *i += 1;
    }
    while let Some(c) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        spec.width = Some(spec.width.unwrap_or(0) * 10 + c as usize);
        *i += 1;
    }
    if chars.get(*i) == Some(&'.') {
        *i += 1;
        let mut precision = 0;
        while let Some(c) = chars.get(*i).and_then(|c| c.to_digit(10)) {
            precision = precision * 10 + c as usize;
            *i += 1;
        }
        spec.precision = Some(precision);
    }
    let Some(&conversion) = chars.get(*i) else {
        return Err(Flow::internal("format not supported: end of string"));
    };
    *i += 1;
    spec.conversion = conversion;
    spec.text = chars[start..*i].iter().collect();
    Ok(spec)
}

fn render_spec(spec: &Spec, arg: &Value) -> Result<String, Flow> {
    let body = match spec.conversion {
        's' => arg.as_text()?,
        'd' => format!("{}", arg.as_int()?),
        'x' => format!("{:x}", arg.as_int()?),
        'o' => format!("{:o}", arg.as_int()?),
        'b' => arg.truthy().to_string(),
        'e' => format!("{:.*e}", spec.precision.unwrap_or(6), arg.as_number()?),
        'f' => format!("{:.*}", spec.precision.unwrap_or(6), arg.as_number()?),
        'g' => arg.as_text()?,
        other => return Err(Flow::internal(format!("format not supported: {other}"))),
    };
    let Some(width) = spec.width else {
        return Ok(body);
    };
    if body.chars().count() >= width {
        return Ok(body);
    }
    let pad = width - body.chars().count();
    if spec.left_align {
        Ok(format!("{body}{}", " ".repeat(pad)))
    } else if spec.zero_pad && matches!(spec.conversion, 'd' | 'x' | 'o' | 'e' | 'f' | 'g') {
        // the sign stays in front of the zeros
        if let Some(rest) = body.strip_prefix('-') {
            Ok(format!("-{}{rest}", "0".repeat(pad)))
        } else {
            Ok(format!("{}{body}", "0".repeat(pad)))
        }
    } else {
        Ok(format!("{}{body}", " ".repeat(pad)))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::engine::Engine;

    fn run(src: &str) -> String {
        Engine::new().run(src).unwrap().display()
    }

    fn run_err(src: &str) -> String {
        Engine::new().run(src).unwrap_err().message
    }

    #[test]
    fn test_print_goes_to_sink_and_passes_through() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let tap = Rc::clone(&seen);
        let engine = Engine::builder()
            .print_sink(move |line| tap.borrow_mut().push(line.to_string()))
            .build();
        let out = engine.run("print('hello') + '!'").unwrap();
        assert_eq!(out.display(), "hello!");
        assert_eq!(*seen.borrow(), ["hello"]);
    }

    #[test]
    fn test_bool_and_number_coercions() {
        assert_eq!(run("bool(3)"), "1");
        assert_eq!(run("bool(0)"), "0");
        assert_eq!(run("bool('false')"), "false");
        assert_eq!(run("bool('NULL')"), "false");
        assert_eq!(run("number('2.5')"), "2.5");
        assert_eq!(run("number('nope')"), "null");
        assert_eq!(run("number(true)"), "1");
    }

    #[test]
    fn test_str_formatting() {
        assert_eq!(run("str('just text')"), "just text");
        assert_eq!(run("str('%s has %d', 'bag', 3)"), "bag has 3");
        assert_eq!(run("str('%05.1f', 2.26)"), "002.3");
        assert_eq!(run("str('%x', 255)"), "ff");
        assert_eq!(run("str('%-4d|', 7)"), "7   |");
        assert_eq!(run("str('100%%')"), "100%");
        assert_eq!(run("str('%d %d', l(1, 2))"), "1 2");
    }

    #[test]
    fn test_str_error_cases() {
        assert!(run_err("str('%d %d', 1)").starts_with("Not enough arguments for %d"));
        assert!(run_err("str('%q', 1)").starts_with("format not supported: q"));
    }

    #[test]
    fn test_length() {
        assert_eq!(run("length('abcd')"), "4");
        assert_eq!(run("length(l(1, 2, 3))"), "3");
        assert_eq!(run("length(m(l('a', 1)))"), "1");
        assert_eq!(run("length(1234)"), "4");
    }

    #[test]
    fn test_rand_ranges() {
        let engine = Engine::new();
        for _ in 0..50 {
            let v = engine.run("rand(10)").unwrap().as_number().unwrap();
            assert!((0.0..10.0).contains(&v));
        }
        let picked = engine.run("rand(l(1, 2, 3))").unwrap().as_number().unwrap();
        assert!((1.0..=3.0).contains(&picked));
    }

    #[test]
    fn test_var_reads_by_name() {
        assert_eq!(run("a = 41; var('a') + 1"), "42");
        assert_eq!(run("var('fresh')"), "0");
    }

    #[test]
    fn test_undef_removes_definitions() {
        assert_eq!(run("f(x) -> x; undef('f'); try(f(1), 'gone')"), "gone");
        assert_eq!(run("a = 1; undef('a'); a"), "0");
        assert!(run_err("undef('_')")
            .starts_with("Cannot replace local built-in variables"));
    }

    #[test]
    fn test_undef_wildcard() {
        let src = "aa = 1; ab = 2; ba = 3; undef('a*'); vars('')";
        let listed = run(src);
        assert!(!listed.contains("aa"));
        assert!(listed.contains("ba"));
    }

    #[test]
    fn test_vars_lists_by_prefix() {
        assert_eq!(run("ax = 1; ay = 2; bz = 3; vars('a')"), "[ax, ay]");
        assert_eq!(run("global_k = 1; vars('global_')"), "[global_k]");
    }

    #[test]
    fn test_time_is_monotonic() {
        let engine = Engine::new();
        let a = engine.run("time()").unwrap().as_number().unwrap();
        let b = engine.run("sleep(2); time()").unwrap().as_number().unwrap();
        assert!(b >= a);
    }
}
