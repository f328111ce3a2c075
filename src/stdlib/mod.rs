//! The built-in language surface.
//!
//! Everything a bare engine understands is registered here, split by concern:
//! operators, control flow, containers and loops, arithmetic, and system
//! interaction. Embedders layer their own registrations on top through the
//! same [`EngineBuilder`] API these modules use.

mod collections;
mod control_flow;
mod math;
mod operators;
mod system;

use std::rc::Rc;

use crate::engine::EngineBuilder;
use crate::runtime::context::Context;
use crate::runtime::signal::Flow;
use crate::runtime::thunk::Thunk;
use crate::runtime::value::{Value, ValueData};

pub(crate) fn install(builder: &mut EngineBuilder) {
    operators::apply(builder);
    control_flow::apply(builder);
    collections::apply(builder);
    math::apply(builder);
    system::apply(builder);
}

/// The variable a value was read from. Assignment and write-back targets
/// must have one.
fn bound_name(value: &Value) -> Result<Rc<str>, Flow> {
    value
        .bound
        .clone()
        .ok_or_else(|| Flow::internal(format!("{} is not a variable", value.display())))
}

fn set_value(ctx: &mut Context, name: &str, value: Value) {
    ctx.set_variable(name, Thunk::constant(value));
}

/// Saves an iteration variable so loops can restore the caller's binding.
fn save_variable(ctx: &Context, name: &str) -> Option<Thunk> {
    ctx.get_variable(name)
}

fn restore_variable(ctx: &mut Context, name: &str, saved: Option<Thunk>) {
    if let Some(thunk) = saved {
        ctx.set_variable(name, thunk);
    } else {
        ctx.remove_local(name);
    }
}

fn items_of(value: &Value) -> Option<&[Value]> {
    match &value.data {
        ValueData::List { items, .. } => Some(items),
        _ => None,
    }
}
