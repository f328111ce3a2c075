//! Arithmetic builtins. Trigonometry works in degrees.

use std::rc::Rc;

use crate::engine::EngineBuilder;
use crate::runtime::signal::Flow;
use crate::runtime::thunk::EvalKind;
use crate::runtime::value::Value;
use crate::stdlib::items_of;

pub(crate) fn apply(b: &mut EngineBuilder) {
    b.add_lazy_function(
        "not",
        Some(1),
        Rc::new(|ctx, _, _, _, args| {
            Ok(Value::bool(!args[0].eval(ctx, EvalKind::Boolean)?.truthy()))
        }),
    );

    b.add_unary_function("fact", |v| {
        let n = v.as_int()?;
        let mut acc = 1.0;
        for i in 2..=n {
            acc *= i as f64;
        }
        Ok(Value::number(acc))
    });

    b.add_math_unary("sin", |d| d.to_radians().sin());
    b.add_math_unary("cos", |d| d.to_radians().cos());
    b.add_math_unary("tan", |d| d.to_radians().tan());
    b.add_math_unary("asin", |d| d.asin().to_degrees());
    b.add_math_unary("acos", |d| d.acos().to_degrees());
    b.add_math_unary("atan", |d| d.atan().to_degrees());
    b.add_math_binary("atan2", |a, b| a.atan2(b).to_degrees());

    b.add_math_unary("sinh", f64::sinh);
    b.add_math_unary("cosh", f64::cosh);
    b.add_math_unary("tanh", f64::tanh);
    b.add_math_unary("sec", |d| 1.0 / d.to_radians().cos());
    b.add_math_unary("csc", |d| 1.0 / d.to_radians().sin());
    b.add_math_unary("sech", |d| 1.0 / d.cosh());
    b.add_math_unary("csch", |d| 1.0 / d.sinh());
    b.add_math_unary("cot", |d| 1.0 / d.to_radians().tan());
    b.add_math_unary("acot", |d| (1.0 / d).atan().to_degrees());
    b.add_math_unary("coth", |d| d.cosh() / d.sinh());

    b.add_math_unary("asinh", |d| (d + (d * d + 1.0).sqrt()).ln());
    b.add_math_unary("acosh", |d| (d + (d * d - 1.0).sqrt()).ln());
    b.add_unary_function("atanh", |v| {
        let d = v.as_number()?;
        if d.abs() >= 1.0 {
            return Err(Flow::math("Number must be |x| < 1"));
        }
        Ok(Value::number(0.5 * ((1.0 + d) / (1.0 - d)).ln()))
    });

    b.add_math_unary("rad", f64::to_radians);
    b.add_math_unary("deg", f64::to_degrees);
    b.add_math_unary("ln", f64::ln);
    b.add_math_unary("ln1p", f64::ln_1p);
    b.add_math_unary("log10", f64::log10);
    b.add_math_unary("log", f64::log2);
    b.add_math_unary("log1p", |d| d.ln_1p() / std::f64::consts::LN_2);
    b.add_math_unary("sqrt", f64::sqrt);
    b.add_math_unary("abs", f64::abs);
    // rounds half up, towards positive infinity
    b.add_math_unary("round", |d| (d + 0.5).floor());
    b.add_math_unary("floor", f64::floor);
    b.add_math_unary("ceil", f64::ceil);
    b.add_math_unary("relu", |d| if d < 0.0 { 0.0 } else { d });

    b.add_lazy_function(
        "mandelbrot",
        Some(3),
        Rc::new(|ctx, _, _, _, args| {
            let a0 = args[0].eval(ctx, EvalKind::None)?.as_number()?;
            let b0 = args[1].eval(ctx, EvalKind::None)?.as_number()?;
            let max_iter = args[2].eval(ctx, EvalKind::None)?.as_int()?;
            let (mut a, mut b) = (0.0f64, 0.0f64);
            let mut iter: i64 = 0;
            while a * a + b * b < 4.0 && iter < max_iter {
                let next = a * a - b * b + a0;
                b = 2.0 * a * b + b0;
                a = next;
                iter += 1;
            }
            Ok(Value::number(iter as f64))
        }),
    );

    b.add_function("max", |args| extremum("max", args, true));
    b.add_function("min", |args| extremum("min", args, false));
}

/// `max`/`min` over the arguments, or over a single list argument. The
/// winning value keeps its variable binding.
fn extremum(name: &str, args: Vec<Value>, largest: bool) -> Result<Value, Flow> {
    let unwrapped = match args.as_slice() {
        [only] => items_of(only).map(<[Value]>::to_vec),
        _ => None,
    };
    let pool = unwrapped.unwrap_or(args);
    let mut best: Option<Value> = None;
    for candidate in pool {
        let wins = match &best {
            None => true,
            Some(current) => {
                let ord = candidate.compare(current);
                if largest { ord.is_gt() } else { ord.is_lt() }
            }
        };
        if wins {
            best = Some(candidate);
        }
    }
    best.ok_or_else(|| Flow::internal(format!("{name}() requires at least one parameter")))
}
