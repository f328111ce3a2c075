//! Per-namespace persistent state.
//!
//! A [`Host`] outlives any single program run: globals written with the
//! `global_` prefix and functions defined with `->` land here and are visible
//! to every later run against the same host. [`Namespaces`] hands out hosts
//! by name so independent embedder scripts do not share state.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::function::FunctionDefinition;
use crate::runtime::thunk::Thunk;
use crate::runtime::value::Value;

pub const GLOBAL_PREFIX: &str = "global_";

const DEFAULT_MAX_CALL_DEPTH: usize = 256;

pub struct Host {
    pub name: String,
    globals: RefCell<HashMap<String, Thunk>>,
    functions: RefCell<HashMap<String, Rc<FunctionDefinition>>>,
    max_call_depth: Cell<usize>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Rc<Host> {
        let host = Host {
            name: name.into(),
            globals: RefCell::new(HashMap::new()),
            functions: RefCell::new(HashMap::new()),
            max_call_depth: Cell::new(DEFAULT_MAX_CALL_DEPTH),
        };
        host.seed("euler", Value::number(std::f64::consts::E));
        host.seed("pi", Value::number(std::f64::consts::PI));
        host.seed("phi", Value::number(1.618_033_988_749_894_8));
        host.seed("avogadro", Value::number(6.02214076e23));
        host.seed("null", Value::null());
        host.seed("true", Value::bool(true));
        host.seed("false", Value::bool(false));
        host.seed("_", Value::number(0.0));
        host.seed("_i", Value::number(0.0));
        host.seed("_a", Value::number(0.0));
        Rc::new(host)
    }

    fn seed(&self, name: &str, value: Value) {
        self.globals
            .borrow_mut()
            .insert(name.to_string(), Thunk::constant(value));
    }

    pub fn get_global(&self, name: &str) -> Option<Thunk> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn set_global(&self, name: &str, thunk: Thunk) {
        self.globals.borrow_mut().insert(name.to_string(), thunk);
    }

    pub fn remove_global(&self, name: &str) -> bool {
        self.globals.borrow_mut().remove(name).is_some()
    }

    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().keys().cloned().collect()
    }

    /// Redefinition replaces the previous body silently.
    pub fn define_function(&self, def: Rc<FunctionDefinition>) {
        self.functions
            .borrow_mut()
            .insert(def.name.clone(), def);
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<FunctionDefinition>> {
        self.functions.borrow().get(name).cloned()
    }

    pub fn remove_function(&self, name: &str) -> bool {
        self.functions.borrow_mut().remove(name).is_some()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.borrow().keys().cloned().collect()
    }

    /// Functions an embedder may call from outside. A single leading
    /// underscore hides a function from this list.
    pub fn public_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .borrow()
            .keys()
            .filter(|n| !n.starts_with('_'))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Functions scripts may call. Double underscore marks internals.
    pub fn available_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .borrow()
            .keys()
            .filter(|n| !n.starts_with("__"))
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth.get()
    }

    pub fn set_max_call_depth(&self, depth: usize) {
        self.max_call_depth.set(depth);
    }
}

/// The set of hosts an engine knows about, keyed by lowercased name.
pub struct Namespaces {
    default_host: Rc<Host>,
    named: RefCell<HashMap<String, Rc<Host>>>,
}

impl Namespaces {
    pub fn new() -> Namespaces {
        Namespaces {
            default_host: Host::new(""),
            named: RefCell::new(HashMap::new()),
        }
    }

    pub fn default_host(&self) -> Rc<Host> {
        Rc::clone(&self.default_host)
    }

    pub fn get_or_create(&self, name: &str) -> Rc<Host> {
        let key = name.to_lowercase();
        if key.is_empty() {
            return self.default_host();
        }
        Rc::clone(
            self.named
                .borrow_mut()
                .entry(key.clone())
                .or_insert_with(|| Host::new(key)),
        )
    }
}

impl Default for Namespaces {
    fn default() -> Namespaces {
        Namespaces::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_constants_present() {
        let host = Host::new("");
        assert!(host.get_global("pi").is_some());
        assert!(host.get_global("avogadro").is_some());
        assert!(host.get_global("nope").is_none());
    }

    #[test]
    fn test_namespaces_are_case_insensitive() {
        let ns = Namespaces::new();
        let a = ns.get_or_create("App");
        let b = ns.get_or_create("app");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &ns.default_host()));
    }
}
