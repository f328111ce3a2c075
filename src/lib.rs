//! An embeddable, expression-oriented scripting engine.
//!
//! Programs are single expressions: `;` sequences them, `->` defines
//! functions, and every construct yields a value. Compilation goes through a
//! tokenizer, a shunting-yard parser and an RPN validator into a tree of
//! lazily evaluated thunks; compiled programs are cached by content digest.
//! Embedders extend the language through [`EngineBuilder`] and keep
//! per-namespace state in a [`Host`].
//!
//! ```
//! use quill::Engine;
//!
//! let engine = Engine::new();
//! let out = engine.run("f(x) -> x * x; f(7)").unwrap();
//! assert_eq!(out.display(), "49");
//! ```

pub mod compiler;
pub mod diagnostics;
pub mod engine;
pub mod frontend;
pub mod registry;
pub mod runtime;
mod stdlib;

pub use crate::diagnostics::{Diagnostic, ErrorInterceptor, ProgramMeta};
pub use crate::engine::{Engine, EngineBuilder, InvokeError, PrintSink, Program};
pub use crate::frontend::position::Position;
pub use crate::frontend::token::{Token, TokenKind};
pub use crate::registry::precedence;
pub use crate::runtime::context::Context;
pub use crate::runtime::host::{Host, Namespaces};
pub use crate::runtime::matrix::Matrix;
pub use crate::runtime::signal::{EvalResult, Flow, Problem};
pub use crate::runtime::thunk::{EvalKind, Thunk};
pub use crate::runtime::value::{MapKey, Signature, Value, ValueData};
