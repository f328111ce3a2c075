//! Evaluation scope.
//!
//! One [`Context`] is one local scope plus handles to the shared pieces: the
//! namespace host, the operator/function registry, and a call depth counter
//! shared by the whole run. Function calls get a fresh context with empty
//! locals via [`Context::recreate`].

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::registry::Registry;
use crate::runtime::host::{GLOBAL_PREFIX, Host};
use crate::runtime::signal::{Flow, Problem};
use crate::runtime::thunk::Thunk;

pub struct Context {
    host: Rc<Host>,
    registry: Rc<Registry>,
    variables: HashMap<String, Thunk>,
    depth: Rc<Cell<usize>>,
}

impl Context {
    pub fn new(host: Rc<Host>, registry: Rc<Registry>) -> Context {
        Context {
            host,
            registry,
            variables: HashMap::new(),
            depth: Rc::new(Cell::new(0)),
        }
    }

    /// Fresh locals, everything else shared. Used for each function call
    /// frame.
    pub fn recreate(&self) -> Context {
        Context {
            host: Rc::clone(&self.host),
            registry: Rc::clone(&self.registry),
            variables: HashMap::new(),
            depth: Rc::clone(&self.depth),
        }
    }

    pub fn host(&self) -> &Rc<Host> {
        &self.host
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// `global_` names resolve in the host only; everything else tries the
    /// local scope first and falls back to the host.
    pub fn get_variable(&self, name: &str) -> Option<Thunk> {
        if name.starts_with(GLOBAL_PREFIX) {
            return self.host.get_global(name);
        }
        self.variables
            .get(name)
            .cloned()
            .or_else(|| self.host.get_global(name))
    }

    pub fn set_variable(&mut self, name: &str, thunk: Thunk) {
        if name.starts_with(GLOBAL_PREFIX) {
            self.host.set_global(name, thunk);
        } else {
            self.variables.insert(name.to_string(), thunk);
        }
    }

    pub fn remove_local(&mut self, name: &str) -> bool {
        self.variables.remove(name).is_some()
    }

    pub fn local_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn enter_call(&self) -> Result<(), Flow> {
        let depth = self.depth.get() + 1;
        if depth > self.host.max_call_depth() {
            return Err(Flow::Error(Problem::TooDeep));
        }
        self.depth.set(depth);
        Ok(())
    }

    pub fn leave_call(&self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::thunk::EvalKind;
    use crate::runtime::value::Value;

    fn context() -> Context {
        Context::new(Host::new(""), Rc::new(Registry::new()))
    }

    #[test]
    fn test_global_prefix_routes_to_host() {
        let mut ctx = context();
        ctx.set_variable("global_x", Thunk::constant(Value::number(3.0)));
        assert!(ctx.host().get_global("global_x").is_some());
        let again = ctx.recreate();
        assert!(again.get_variable("global_x").is_some());
    }

    #[test]
    fn test_locals_shadow_host_globals() {
        let mut ctx = context();
        ctx.set_variable("pi", Thunk::constant(Value::number(3.0)));
        let got = ctx
            .get_variable("pi")
            .unwrap()
            .eval(&mut context(), EvalKind::None)
            .unwrap();
        assert_eq!(got.as_number().unwrap(), 3.0);
        assert!(!ctx.recreate().get_variable("pi").is_none());
    }

    #[test]
    fn test_call_depth_limit() {
        let ctx = context();
        ctx.host().set_max_call_depth(2);
        assert!(ctx.enter_call().is_ok());
        assert!(ctx.enter_call().is_ok());
        assert!(ctx.enter_call().is_err());
        ctx.leave_call();
        assert!(ctx.enter_call().is_ok());
    }
}
