//! Call dispatch, signatures, and the non-looping control forms.

use std::rc::Rc;

use crate::engine::EngineBuilder;
use crate::runtime::signal::Flow;
use crate::runtime::thunk::EvalKind;
use crate::runtime::value::{Signature, Value, ValueData};
use crate::stdlib::{restore_variable, save_variable, set_value};

pub(crate) fn apply(b: &mut EngineBuilder) {
    // Every call the compiler cannot resolve statically routes here, with
    // the call name appended as a final string argument. Under a Signature
    // evaluation this builds the shape for `->`; otherwise it dispatches to
    // a function defined earlier in the same namespace.
    b.add_lazy_function(
        ".",
        None,
        Rc::new(|ctx, kind, meta, token, args| {
            let Some((name_arg, rest)) = args.split_last() else {
                return Err(Flow::internal("Unknown function call"));
            };
            let name = name_arg.eval(ctx, EvalKind::None)?.display();

            if kind != EvalKind::Signature {
                let def = ctx
                    .host()
                    .get_function(&name)
                    .ok_or_else(|| Flow::internal(format!("Function {name} is not defined yet")))?;
                return def.call(ctx, kind, meta, token, rest);
            }

            let mut params = Vec::new();
            let mut outers = Vec::new();
            for arg in rest {
                let v = arg.eval(ctx, EvalKind::Localization)?;
                match (&v.data, &v.bound) {
                    (ValueData::Outer(n), _) => outers.push(n.to_string()),
                    (_, Some(n)) => params.push(n.to_string()),
                    (_, None) => {
                        return Err(Flow::internal(format!(
                            "Only variables can be used in function signature, not {}",
                            v.display()
                        )));
                    }
                }
            }
            Ok(Value::signature(Signature { name, params, outers }))
        }),
    );

    b.add_lazy_function(
        "outer",
        Some(1),
        Rc::new(|ctx, kind, _, _, args| {
            if kind != EvalKind::Localization {
                return Err(Flow::internal(
                    "outer scoping of variables is only possible in function signatures",
                ));
            }
            let v = args[0].eval(ctx, EvalKind::Localization)?;
            match &v.bound {
                Some(name) => Ok(Value::outer(Rc::clone(name))),
                None => Err(Flow::internal(format!(
                    "Only variables can be used in function signature, not {}",
                    v.display()
                ))),
            }
        }),
    );

    b.add_function("return", |args| {
        Err(Flow::Return(args.into_iter().next().unwrap_or_else(Value::null)))
    });
    b.add_function("throw", |args| {
        Err(Flow::Throw(args.into_iter().next().unwrap_or_else(Value::null)))
    });
    b.add_function("exit", |args| {
        Err(Flow::Exit(args.into_iter().next().unwrap_or_else(Value::null)))
    });

    b.add_lazy_function(
        "try",
        None,
        Rc::new(|ctx, kind, _, _, args| {
            if args.is_empty() {
                return Err(Flow::internal("try needs at least an expression block"));
            }
            match args[0].eval(ctx, kind) {
                Err(Flow::Throw(thrown)) => {
                    if args.len() < 2 {
                        return Ok(Value::null());
                    }
                    let saved = save_variable(ctx, "_");
                    set_value(ctx, "_", thrown.rebound_to("_"));
                    let caught = args[1].eval(ctx, kind)?;
                    restore_variable(ctx, "_", saved);
                    Ok(caught)
                }
                other => other,
            }
        }),
    );

    b.add_lazy_function(
        "if",
        None,
        Rc::new(|ctx, _, _, _, args| {
            if args.len() < 2 {
                return Err(Flow::internal(
                    "if statement needs to have at least one condition and one case",
                ));
            }
            let mut i = 0;
            while i + 1 < args.len() {
                if args[i].eval(ctx, EvalKind::Boolean)?.truthy() {
                    return args[i + 1].eval(ctx, EvalKind::None);
                }
                i += 2;
            }
            // a trailing odd expression is the else branch
            if i < args.len() {
                return args[i].eval(ctx, EvalKind::None);
            }
            Ok(Value::number(0.0))
        }),
    );
}
