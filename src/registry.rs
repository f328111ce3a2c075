//! Operator and function tables.
//!
//! The [`Registry`] is the single source of truth for what counts as an
//! operator or function, from lexing (longest-match operator scanning)
//! through parsing (precedence, associativity, arity checks) to evaluation
//! (the strategies themselves). Strategies come in eager and lazy flavors;
//! lazy ones receive their operands as unevaluated thunks, which is how
//! control flow is expressed without special forms in the grammar.

use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostics::ProgramMeta;
use crate::frontend::token::Token;
use crate::runtime::context::Context;
use crate::runtime::signal::EvalResult;
use crate::runtime::thunk::{EvalKind, Thunk};
use crate::runtime::value::Value;

/// Binding strengths. Higher binds tighter.
pub mod precedence {
    pub const UNARY: u8 = 60;
    pub const EXPONENT: u8 = 40;
    pub const MULTIPLICATIVE: u8 = 30;
    pub const ADDITIVE: u8 = 20;
    pub const COMPARISON: u8 = 10;
    pub const SHIFT: u8 = 9;
    pub const EQUALITY: u8 = 8;
    pub const BIT_AND: u8 = 7;
    pub const BIT_OR: u8 = 6;
    pub const AND: u8 = 5;
    pub const OR: u8 = 4;
    pub const ASSIGN: u8 = 3;
    pub const DEFINE: u8 = 2;
    pub const SEQUENCE: u8 = 1;
}

pub type EagerUnary = Rc<dyn Fn(Value) -> EvalResult>;
pub type EagerBinary = Rc<dyn Fn(Value, Value) -> EvalResult>;
pub type EagerCall = Rc<dyn Fn(Vec<Value>) -> EvalResult>;
pub type LazyUnary = Rc<dyn Fn(&mut Context, EvalKind, &Rc<ProgramMeta>, &Token, &Thunk) -> EvalResult>;
pub type LazyBinary =
    Rc<dyn Fn(&mut Context, EvalKind, &Rc<ProgramMeta>, &Token, &Thunk, &Thunk) -> EvalResult>;
pub type LazyCall =
    Rc<dyn Fn(&mut Context, EvalKind, &Rc<ProgramMeta>, &Token, &[Thunk]) -> EvalResult>;

#[derive(Clone)]
pub enum OperatorImp {
    EagerUnary(EagerUnary),
    EagerBinary(EagerBinary),
    LazyUnary(LazyUnary),
    LazyBinary(LazyBinary),
}

#[derive(Clone)]
pub struct OperatorEntry {
    pub precedence: u8,
    pub left_assoc: bool,
    pub imp: OperatorImp,
}

impl OperatorEntry {
    pub fn is_unary(&self) -> bool {
        matches!(self.imp, OperatorImp::EagerUnary(_) | OperatorImp::LazyUnary(_))
    }
}

#[derive(Clone)]
pub enum FunctionImp {
    Eager(EagerCall),
    Lazy(LazyCall),
}

#[derive(Clone)]
pub struct FunctionEntry {
    /// `None` for variadic functions.
    pub arity: Option<usize>,
    pub imp: FunctionImp,
}

pub struct Registry {
    operators: HashMap<String, OperatorEntry>,
    functions: HashMap<String, FunctionEntry>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            operators: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    /// Unary operators register under their surface plus a `u` suffix, so
    /// `-` and unary `-` hold separate entries.
    pub fn put_operator(&mut self, surface: &str, entry: OperatorEntry) {
        let key = if entry.is_unary() && !surface.ends_with('u') {
            format!("{surface}u")
        } else {
            surface.to_string()
        };
        self.operators.insert(key, entry);
    }

    /// Function names are case insensitive; the table holds them lowercased.
    pub fn put_function(&mut self, name: &str, entry: FunctionEntry) {
        self.functions.insert(name.to_lowercase(), entry);
    }

    pub fn operator(&self, surface: &str) -> Option<&OperatorEntry> {
        self.operators.get(surface)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    /// True when `surface` is registered in either its binary or unary form.
    /// The lexer uses this to find the longest operator at a scan position.
    pub fn is_operator(&self, surface: &str) -> bool {
        self.operators.contains_key(surface)
            || self.operators.contains_key(&format!("{surface}u"))
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}
