//! Deferred expressions.
//!
//! Compilation produces a tree of [`Thunk`]s. A thunk is re-entrant and
//! side-effect free until forced; forcing it with an [`EvalKind`] tells the
//! node what its caller intends to do with the result, which lets a handful
//! of constructs change shape without new syntax.

use std::rc::Rc;

use crate::runtime::context::Context;
use crate::runtime::signal::EvalResult;
use crate::runtime::value::Value;

/// What the consumer of a value intends to do with it. Most code evaluates
/// at `None` and ignores the hint; the exceptions are documented where they
/// apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalKind {
    /// Plain value wanted.
    None,
    /// Result discarded, e.g. all but the last arm of a `;` sequence.
    Void,
    /// Result used as a condition. `bool()` and `rand()` answer differently.
    Boolean,
    /// Left side of `->`: evaluate to a call signature, not a value.
    Signature,
    /// Operand of `outer()` inside a signature.
    Localization,
    /// Target of `get`/`has`/`put`: containers stay containers.
    Container,
}

#[derive(Clone)]
pub struct Thunk(Rc<dyn Fn(&mut Context, EvalKind) -> EvalResult>);

impl Thunk {
    pub fn new(f: impl Fn(&mut Context, EvalKind) -> EvalResult + 'static) -> Thunk {
        Thunk(Rc::new(f))
    }

    /// A thunk that always yields the same value.
    pub fn constant(value: Value) -> Thunk {
        Thunk::new(move |_, _| Ok(value.clone()))
    }

    pub fn eval(&self, ctx: &mut Context, kind: EvalKind) -> EvalResult {
        (self.0)(ctx, kind)
    }
}

impl std::fmt::Debug for Thunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Thunk")
    }
}
