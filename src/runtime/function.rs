//! User-defined functions.
//!
//! A function defined with `->` is a compiled body plus the names it binds:
//! parameters, and `outer` variables that are copied in from the calling
//! scope on entry and copied back on normal exit. Errors raised inside the
//! body are attributed to the definition site under the function's name, not
//! to the call site.

use std::rc::Rc;

use crate::diagnostics::ProgramMeta;
use crate::frontend::token::Token;
use crate::runtime::context::Context;
use crate::runtime::signal::{EvalResult, Flow, Problem};
use crate::runtime::thunk::{EvalKind, Thunk};
use crate::runtime::value::Value;

pub struct FunctionDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub outer: Vec<String>,
    pub body: Thunk,
    /// Definition site, used to position errors escaping the body.
    pub token: Token,
    /// Program metadata renamed after the function.
    pub meta: Rc<ProgramMeta>,
}

impl FunctionDefinition {
    pub fn call(
        &self,
        ctx: &mut Context,
        kind: EvalKind,
        call_meta: &Rc<ProgramMeta>,
        call_token: &Token,
        args: &[Thunk],
    ) -> EvalResult {
        if args.len() != self.params.len() {
            return Err(Flow::positioned(
                call_meta,
                call_token,
                &format!(
                    "Incorrect number of arguments for function {}. Should be {}, not {}",
                    self.name,
                    self.params.len(),
                    args.len()
                ),
            ));
        }
        // Arguments evaluate in the caller's scope, before the new frame
        // exists.
        let mut bound_args = Vec::with_capacity(args.len());
        for (param, arg) in self.params.iter().zip(args) {
            let value = arg.eval(ctx, EvalKind::None)?.rebound_to(param.as_str());
            bound_args.push((param.clone(), value));
        }
        ctx.enter_call()?;
        let out = self.run_frame(ctx, kind, bound_args);
        ctx.leave_call();
        out
    }

    fn run_frame(
        &self,
        caller: &mut Context,
        kind: EvalKind,
        bound_args: Vec<(String, Value)>,
    ) -> EvalResult {
        let mut frame = caller.recreate();
        for name in &self.outer {
            let thunk = match caller.get_variable(name) {
                Some(t) => t,
                None => Thunk::constant(Value::number(0.0).rebound_to(name.as_str())),
            };
            frame.set_variable(name, thunk);
        }
        for (param, value) in bound_args {
            frame.set_variable(&param, Thunk::constant(value));
        }

        let (retval, rethrow) = match self.body.eval(&mut frame, kind) {
            Ok(v) => (v, false),
            Err(Flow::Return(v)) => (v, false),
            Err(Flow::Throw(v)) => (v, true),
            Err(Flow::Error(Problem::Internal(m))) => {
                return Err(Flow::positioned(&self.meta, &self.token, &m));
            }
            Err(Flow::Error(Problem::Math(m))) => {
                return Err(Flow::positioned(
                    &self.meta,
                    &self.token,
                    &format!("Your math is wrong, {m}"),
                ));
            }
            Err(other) => return Err(other),
        };

        // Outer variables write back through to the caller, so a function can
        // mutate the scope it closed over.
        for name in &self.outer {
            if let Some(thunk) = frame.get_variable(name) {
                caller.set_variable(name, thunk);
            }
        }
        if rethrow {
            return Err(Flow::Throw(retval));
        }
        Ok(retval)
    }
}
