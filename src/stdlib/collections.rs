//! Containers, iteration and higher order functions.
//!
//! The loop family shares one convention: the current element is visible to
//! the body as `_`, its index as `_i`, and the accumulator of `reduce` as
//! `_a`. Previous bindings of those names are restored on normal completion.

use std::collections::BTreeMap;
use std::cmp::Ordering;
use std::rc::Rc;

use regex::Regex;

use crate::engine::EngineBuilder;
use crate::runtime::context::Context;
use crate::runtime::matrix::Matrix;
use crate::runtime::signal::Flow;
use crate::runtime::thunk::{EvalKind, Thunk};
use crate::runtime::value::{MapKey, Value, ValueData};
use crate::stdlib::{items_of, restore_variable, save_variable, set_value};

const RANGE_LIMIT: usize = 10_000_000;

pub(crate) fn apply(b: &mut EngineBuilder) {
    b.add_function("l", |args| Ok(Value::constructor_list(args)));

    // m(l(k1, v1), l(k2, v2), ...); bare arguments become keys with null
    b.add_function("m", |args| {
        let mut entries = BTreeMap::new();
        for arg in args {
            match items_of(&arg) {
                Some([key, value]) => {
                    entries.insert(MapKey::from_value(key)?, value.clone());
                }
                _ => {
                    entries.insert(MapKey::from_value(&arg)?, Value::null());
                }
            }
        }
        Ok(Value::map(entries))
    });

    b.add_function("matrix", |args| {
        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(args.len());
        for arg in &args {
            let items = items_of(arg)
                .ok_or_else(|| Flow::internal("A matrix must be defined as a list of list of numbers"))?;
            let row: Result<Vec<f64>, Flow> = items
                .iter()
                .map(|v| {
                    v.as_number().map_err(|_| {
                        Flow::internal("A matrix must be defined as a list of list of numbers")
                    })
                })
                .collect();
            let row = row?;
            if let Some(first) = rows.first() {
                if row.len() != first.len() {
                    return Err(Flow::internal("Must have even length rows in a matrix"));
                }
            }
            rows.push(row);
        }
        Ok(Value::matrix(Matrix::from_rows(rows)))
    });

    b.add_unary_function("transpose", |v| match &v.data {
        ValueData::Matrix(m) => Ok(Value::matrix(m.transpose())),
        _ => Err(Flow::internal("Can only transpose a matrix")),
    });

    b.add_function("join", |args| {
        if args.len() < 2 {
            return Err(Flow::internal("join takes at least 2 arguments"));
        }
        let delimiter = args[0].as_text()?;
        let pieces: Vec<&Value> = match (args.len(), items_of(&args[1])) {
            (2, Some(items)) => items.iter().collect(),
            _ => args[1..].iter().collect(),
        };
        let rendered: Result<Vec<String>, Flow> = pieces.iter().map(|v| v.as_text()).collect();
        Ok(Value::str(rendered?.join(&delimiter)))
    });

    b.add_binary_function("split", |delimiter, text| {
        let pattern = delimiter.as_text()?;
        let re = Regex::new(&pattern)
            .map_err(|_| Flow::internal(format!("Invalid regular expression: {pattern}")))?;
        let mut parts: Vec<Value> = re.split(&text.as_text()?).map(Value::str).collect();
        // trailing empty fields carry no information
        while matches!(parts.last(), Some(v) if v.display().is_empty()) {
            parts.pop();
        }
        Ok(Value::list(parts))
    });

    b.add_function("slice", |args| {
        if args.len() < 2 || args.len() > 3 {
            return Err(Flow::internal("slice takes 2 or 3 arguments"));
        }
        let from = args[1].as_int()?;
        let to = if args.len() == 3 { args[2].as_int()? } else { -1 };
        match &args[0].data {
            ValueData::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (from, to) = slice_bounds(from, to, chars.len());
                Ok(Value::str(chars[from..to].iter().collect::<String>()))
            }
            ValueData::List { items, .. } => {
                let (from, to) = slice_bounds(from, to, items.len());
                Ok(Value::list(items[from..to].to_vec()))
            }
            _ => Err(Flow::internal(format!("Cannot slice a {}", args[0].type_name()))),
        }
    });

    b.add_function("sort", |args| {
        let unwrapped = match args.as_slice() {
            [only] => items_of(only).map(<[Value]>::to_vec),
            _ => None,
        };
        let mut items = unwrapped.unwrap_or(args);
        items.sort_by(Value::compare);
        Ok(Value::list(items))
    });

    b.add_lazy_function(
        "sort_key",
        Some(2),
        Rc::new(|ctx, _, _, _, args| {
            let source = args[0].eval(ctx, EvalKind::None)?;
            let Some(items) = items_of(&source) else {
                return Err(Flow::internal("First argument for sort_key should be a List"));
            };
            let mut items = items.to_vec();
            let saved = save_variable(ctx, "_");
            let mut failure: Option<Flow> = None;
            items.sort_by(|a, b| {
                if failure.is_some() {
                    return Ordering::Equal;
                }
                let keys = sort_keys(ctx, &args[1], a, b);
                match keys {
                    Ok((ka, kb)) => ka.compare(&kb),
                    Err(flow) => {
                        failure = Some(flow);
                        Ordering::Equal
                    }
                }
            });
            restore_variable(ctx, "_", saved);
            match failure {
                Some(flow) => Err(flow),
                None => Ok(Value::list(items)),
            }
        }),
    );

    b.add_function("range", |args| {
        if args.is_empty() || args.len() > 3 {
            return Err(Flow::internal(format!(
                "range accepts from 1 to 3 arguments, not {}",
                args.len()
            )));
        }
        let (from, to, step) = match args.len() {
            1 => (0.0, args[0].as_number()?, 1.0),
            2 => (args[0].as_number()?, args[1].as_number()?, 1.0),
            _ => (args[0].as_number()?, args[1].as_number()?, args[2].as_number()?),
        };
        if step == 0.0 {
            return Err(Flow::internal("range will never end with a step of zero"));
        }
        let count = ((to - from) / step).ceil().max(0.0);
        if count > RANGE_LIMIT as f64 {
            return Err(Flow::internal("range is too large"));
        }
        let items = (0..count as usize)
            .map(|i| Value::number(from + i as f64 * step))
            .collect();
        Ok(Value::list(items))
    });

    b.add_lazy_function(
        "get",
        Some(2),
        Rc::new(|ctx, _, _, _, args| {
            let container = args[0].eval(ctx, EvalKind::Container)?;
            let address = args[1].eval(ctx, EvalKind::None)?;
            match &container.data {
                ValueData::List { items, .. } => {
                    if items.is_empty() {
                        return Ok(Value::null());
                    }
                    let i = address.as_int()?.rem_euclid(items.len() as i64);
                    Ok(items[i as usize].clone())
                }
                ValueData::Map(entries) => Ok(entries
                    .get(&MapKey::from_value(&address)?)
                    .cloned()
                    .unwrap_or_else(Value::null)),
                ValueData::Matrix(m) => {
                    let (r, c) = matrix_coords(&address)?;
                    Ok(m.get(r, c).map_or_else(Value::null, Value::number))
                }
                _ => Err(Flow::internal("First argument to 'get' function must be a container")),
            }
        }),
    );

    b.add_lazy_function(
        "has",
        Some(2),
        Rc::new(|ctx, _, _, _, args| {
            let container = args[0].eval(ctx, EvalKind::Container)?;
            let address = args[1].eval(ctx, EvalKind::None)?;
            match &container.data {
                ValueData::List { items, .. } => {
                    let i = address.as_int()?;
                    Ok(Value::bool(i >= 0 && (i as usize) < items.len()))
                }
                ValueData::Map(entries) => {
                    Ok(Value::bool(entries.contains_key(&MapKey::from_value(&address)?)))
                }
                ValueData::Matrix(m) => {
                    let (r, c) = matrix_coords(&address)?;
                    Ok(Value::bool(r < m.rows() && c < m.cols()))
                }
                _ => Err(Flow::internal("First argument to 'has' function must be a container")),
            }
        }),
    );

    b.add_lazy_function(
        "put",
        Some(3),
        Rc::new(|ctx, _, _, _, args| {
            let container = args[0].eval(ctx, EvalKind::Container)?;
            let address = args[1].eval(ctx, EvalKind::None)?;
            let value = args[2].eval(ctx, EvalKind::None)?;
            let updated = match &container.data {
                ValueData::List { items, .. } => {
                    if items.is_empty() {
                        return Ok(Value::bool(false));
                    }
                    let i = address.as_int()?.rem_euclid(items.len() as i64);
                    let mut items = items.clone();
                    items[i as usize] = value.unbound();
                    Value::list(items)
                }
                ValueData::Map(entries) => {
                    let mut entries = entries.clone();
                    entries.insert(MapKey::from_value(&address)?, value.unbound());
                    Value::map(entries)
                }
                ValueData::Matrix(m) => {
                    let (r, c) = matrix_coords(&address)?;
                    let mut m = m.clone();
                    if m.set(r, c, value.as_number()?).is_none() {
                        return Ok(Value::bool(false));
                    }
                    Value::matrix(m)
                }
                _ => return Ok(Value::null()),
            };
            if let Some(name) = &container.bound {
                let name = Rc::clone(name);
                set_value(ctx, &name, updated.rebound_to(Rc::clone(&name)));
            }
            Ok(Value::bool(true))
        }),
    );

    b.add_lazy_function(
        "while",
        Some(3),
        Rc::new(|ctx, _, _, _, args| {
            let limit = args[1].eval(ctx, EvalKind::None)?.as_int()?;
            let saved = save_variable(ctx, "_");
            set_value(ctx, "_", Value::number(0.0).rebound_to("_"));
            let mut last = Value::null();
            let mut count: i64 = 0;
            while count < limit && args[0].eval(ctx, EvalKind::Boolean)?.truthy() {
                last = args[2].eval(ctx, EvalKind::None)?;
                count += 1;
                set_value(ctx, "_", Value::number(count as f64).rebound_to("_"));
            }
            restore_variable(ctx, "_", saved);
            Ok(last)
        }),
    );

    b.add_lazy_function(
        "loop",
        None,
        Rc::new(|ctx, _, _, _, args| {
            if args.len() < 2 || args.len() > 3 {
                return Err(Flow::internal(format!(
                    "Incorrect number of attributes for loop, should be 2 or 3, not {}",
                    args.len()
                )));
            }
            let limit = args[0].eval(ctx, EvalKind::None)?.as_int()?;
            let saved = save_variable(ctx, "_");
            let mut last = Value::null();
            for i in 0..limit.max(0) {
                set_value(ctx, "_", Value::number(i as f64).rebound_to("_"));
                last = args[1].eval(ctx, EvalKind::None)?;
                if args.len() == 3 && args[2].eval(ctx, EvalKind::Boolean)?.truthy() {
                    break;
                }
            }
            restore_variable(ctx, "_", saved);
            Ok(last)
        }),
    );

    b.add_lazy_function(
        "map",
        None,
        Rc::new(|ctx, _, _, _, args| {
            if args.len() < 2 || args.len() > 3 {
                return Err(Flow::internal(format!(
                    "Incorrect number of attributes for map, should be 2 or 3, not {}",
                    args.len()
                )));
            }
            let items = iterated_list(ctx, &args[0], "map")?;
            let mut out = Vec::with_capacity(items.len());
            let frame = IterationFrame::open(ctx);
            for (i, item) in items.iter().enumerate() {
                bind_item(ctx, item, i);
                out.push(args[1].eval(ctx, EvalKind::None)?);
                if args.len() == 3 && args[2].eval(ctx, EvalKind::Boolean)?.truthy() {
                    break;
                }
            }
            frame.close(ctx);
            Ok(Value::list(out))
        }),
    );

    b.add_lazy_function(
        "filter",
        None,
        Rc::new(|ctx, _, _, _, args| {
            if args.len() < 2 || args.len() > 3 {
                return Err(Flow::internal(format!(
                    "Incorrect number of attributes for filter, should be 2 or 3, not {}",
                    args.len()
                )));
            }
            let items = iterated_list(ctx, &args[0], "filter")?;
            let mut out = Vec::new();
            let frame = IterationFrame::open(ctx);
            for (i, item) in items.iter().enumerate() {
                bind_item(ctx, item, i);
                if args[1].eval(ctx, EvalKind::Boolean)?.truthy() {
                    out.push(item.clone());
                }
                if args.len() == 3 && args[2].eval(ctx, EvalKind::Boolean)?.truthy() {
                    break;
                }
            }
            frame.close(ctx);
            Ok(Value::list(out))
        }),
    );

    b.add_lazy_function(
        "first",
        Some(2),
        Rc::new(|ctx, _, _, _, args| {
            let items = iterated_list(ctx, &args[0], "first")?;
            let mut found = Value::null();
            let frame = IterationFrame::open(ctx);
            for (i, item) in items.iter().enumerate() {
                bind_item(ctx, item, i);
                if args[1].eval(ctx, EvalKind::Boolean)?.truthy() {
                    found = item.clone();
                    break;
                }
            }
            frame.close(ctx);
            Ok(found)
        }),
    );

    b.add_lazy_function(
        "all",
        Some(2),
        Rc::new(|ctx, _, _, _, args| {
            let items = iterated_list(ctx, &args[0], "all")?;
            let mut holds = true;
            let frame = IterationFrame::open(ctx);
            for (i, item) in items.iter().enumerate() {
                bind_item(ctx, item, i);
                if !args[1].eval(ctx, EvalKind::Boolean)?.truthy() {
                    holds = false;
                    break;
                }
            }
            frame.close(ctx);
            Ok(Value::bool(holds))
        }),
    );

    b.add_lazy_function(
        "for",
        None,
        Rc::new(|ctx, _, _, _, args| {
            if args.len() < 2 || args.len() > 3 {
                return Err(Flow::internal(format!(
                    "Incorrect number of attributes for 'for', should be 2 or 3, not {}",
                    args.len()
                )));
            }
            let items = iterated_list(ctx, &args[0], "'for'")?;
            let mut successes: i64 = 0;
            let frame = IterationFrame::open(ctx);
            for (i, item) in items.iter().enumerate() {
                bind_item(ctx, item, i);
                if args[1].eval(ctx, EvalKind::None)?.truthy() {
                    successes += 1;
                }
                if args.len() == 3 && args[2].eval(ctx, EvalKind::Boolean)?.truthy() {
                    break;
                }
            }
            frame.close(ctx);
            Ok(Value::number(successes as f64))
        }),
    );

    b.add_lazy_function(
        "reduce",
        Some(3),
        Rc::new(|ctx, _, _, _, args| {
            let source = args[0].eval(ctx, EvalKind::None)?;
            let Some(items) = items_of(&source) else {
                return Err(Flow::internal(
                    "First argument of 'reduce' should be a list or iterator",
                ));
            };
            let items = items.to_vec();
            let mut acc = args[2].eval(ctx, EvalKind::None)?;
            let saved_item = save_variable(ctx, "_");
            let saved_acc = save_variable(ctx, "_a");
            for item in &items {
                set_value(ctx, "_a", acc.rebound_to("_a"));
                set_value(ctx, "_", item.rebound_to("_"));
                acc = args[1].eval(ctx, EvalKind::None)?;
            }
            restore_variable(ctx, "_", saved_item);
            restore_variable(ctx, "_a", saved_acc);
            Ok(acc)
        }),
    );
}

fn slice_bounds(from: i64, to: i64, len: usize) -> (usize, usize) {
    let to = if to < 0 { len } else { (to as usize).min(len) };
    let from = (from.max(0) as usize).min(to);
    (from, to)
}

fn sort_keys(
    ctx: &mut Context,
    key: &Thunk,
    a: &Value,
    b: &Value,
) -> Result<(Value, Value), Flow> {
    set_value(ctx, "_", a.rebound_to("_"));
    let ka = key.eval(ctx, EvalKind::None)?;
    set_value(ctx, "_", b.rebound_to("_"));
    let kb = key.eval(ctx, EvalKind::None)?;
    Ok((ka, kb))
}

/// Matrix cells are addressed with a two-element list of coordinates.
fn matrix_coords(address: &Value) -> Result<(usize, usize), Flow> {
    if let ValueData::List { items, .. } = &address.data {
        if let [r, c] = items.as_slice() {
            if r.is_numeric() && c.is_numeric() {
                return Ok((r.as_int()?.max(0) as usize, c.as_int()?.max(0) as usize));
            }
        }
    }
    Err(Flow::internal(
        "Must access a matrix's content with a pair of numeric coordinates",
    ))
}

fn iterated_list(ctx: &mut Context, arg: &Thunk, what: &str) -> Result<Vec<Value>, Flow> {
    let source = arg.eval(ctx, EvalKind::None)?;
    match items_of(&source) {
        Some(items) => Ok(items.to_vec()),
        None => Err(Flow::internal(format!(
            "First argument of {what} function should be a list or iterator"
        ))),
    }
}

fn bind_item(ctx: &mut Context, item: &Value, index: usize) {
    set_value(ctx, "_", item.rebound_to("_"));
    set_value(ctx, "_i", Value::number(index as f64).rebound_to("_i"));
}

/// Saved `_` and `_i` bindings around one loop.
struct IterationFrame {
    item: Option<Thunk>,
    index: Option<Thunk>,
}

impl IterationFrame {
    fn open(ctx: &Context) -> IterationFrame {
        IterationFrame {
            item: save_variable(ctx, "_"),
            index: save_variable(ctx, "_i"),
        }
    }

    fn close(self, ctx: &mut Context) {
        restore_variable(ctx, "_", self.item);
        restore_variable(ctx, "_i", self.index);
    }
}
