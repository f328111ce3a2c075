//! Engine assembly and the compile/eval entry points.
//!
//! An [`EngineBuilder`] starts from the full standard library and lets the
//! embedder layer its own operators and functions on top before freezing the
//! registry into an [`Engine`]. Compiled programs are cached by a digest of
//! their normalized text, so recompiling the same script is free.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::compiler::validate::validate;
use crate::compiler::build;
use crate::diagnostics::{Diagnostic, ErrorInterceptor, InterceptorSlot, ProgramMeta};
use crate::frontend::FrontendError;
use crate::frontend::parser::shunting_yard;
use crate::frontend::token::Token;
use crate::frontend::tokenizer::post_process::post_process;
use crate::frontend::tokenizer::tokenize;
use crate::registry::{
    EagerCall, FunctionEntry, FunctionImp, LazyBinary, LazyCall, LazyUnary, OperatorEntry,
    OperatorImp, Registry, precedence,
};
use crate::runtime::context::Context;
use crate::runtime::host::{Host, Namespaces};
use crate::runtime::signal::{EvalResult, Flow, Problem};
use crate::runtime::thunk::Thunk;
use crate::runtime::value::Value;

/// Where `print()` output goes. Swappable at run time, shared by every
/// program the engine runs.
pub type PrintSink = Rc<RefCell<Box<dyn FnMut(&str)>>>;

/// A compiled program: the executable thunk tree plus everything needed to
/// render errors against its source.
pub struct Program {
    thunk: Thunk,
    meta: Rc<ProgramMeta>,
    rpn: Vec<Token>,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program").finish_non_exhaustive()
    }
}

impl Program {
    pub fn meta(&self) -> &Rc<ProgramMeta> {
        &self.meta
    }

    /// The reverse Polish token stream, mostly useful for debugging grammars.
    pub fn rpn(&self) -> &[Token] {
        &self.rpn
    }
}

/// Why [`Engine::invoke`] could not produce a value.
#[derive(Debug)]
pub enum InvokeError {
    UnknownFunction(String),
    ArityMismatch { expected: usize, got: usize },
    Failed(Diagnostic),
}

pub struct EngineBuilder {
    registry: Registry,
    sink: PrintSink,
    comments: bool,
    newline_markers: bool,
    builtins: Vec<String>,
}

impl EngineBuilder {
    pub fn new() -> EngineBuilder {
        let sink: PrintSink = Rc::new(RefCell::new(Box::new(|line: &str| {
            println!("{line}");
        }) as Box<dyn FnMut(&str)>));
        let mut builder = EngineBuilder {
            registry: Registry::new(),
            sink,
            comments: false,
            newline_markers: true,
            builtins: Vec::new(),
        };
        crate::stdlib::install(&mut builder);
        builder.builtins = builder.registry.function_names();
        builder.builtins.sort();
        builder
    }

    /// Allow `//` line comments in program text.
    pub fn comments(mut self, allow: bool) -> EngineBuilder {
        self.comments = allow;
        self
    }

    /// Treat `$` as a line break marker in one-line program text.
    pub fn newline_markers(mut self, allow: bool) -> EngineBuilder {
        self.newline_markers = allow;
        self
    }

    pub fn print_sink(self, sink: impl FnMut(&str) + 'static) -> EngineBuilder {
        *self.sink.borrow_mut() = Box::new(sink);
        self
    }

    pub(crate) fn sink(&self) -> PrintSink {
        Rc::clone(&self.sink)
    }

    pub fn add_unary_operator(
        &mut self,
        surface: &str,
        f: impl Fn(Value) -> EvalResult + 'static,
    ) -> &mut Self {
        self.registry.put_operator(surface, OperatorEntry {
            precedence: precedence::UNARY,
            left_assoc: false,
            imp: OperatorImp::EagerUnary(Rc::new(f)),
        });
        self
    }

    pub fn add_binary_operator(
        &mut self,
        surface: &str,
        prec: u8,
        left_assoc: bool,
        f: impl Fn(Value, Value) -> EvalResult + 'static,
    ) -> &mut Self {
        self.registry.put_operator(surface, OperatorEntry {
            precedence: prec,
            left_assoc,
            imp: OperatorImp::EagerBinary(Rc::new(f)),
        });
        self
    }

    pub fn add_lazy_unary_operator(&mut self, surface: &str, f: LazyUnary) -> &mut Self {
        self.registry.put_operator(surface, OperatorEntry {
            precedence: precedence::UNARY,
            left_assoc: false,
            imp: OperatorImp::LazyUnary(f),
        });
        self
    }

    pub fn add_lazy_binary_operator(
        &mut self,
        surface: &str,
        prec: u8,
        left_assoc: bool,
        f: LazyBinary,
    ) -> &mut Self {
        self.registry.put_operator(surface, OperatorEntry {
            precedence: prec,
            left_assoc,
            imp: OperatorImp::LazyBinary(f),
        });
        self
    }

    pub fn add_unary_function(
        &mut self,
        name: &str,
        f: impl Fn(Value) -> EvalResult + 'static,
    ) -> &mut Self {
        let f = Rc::new(f);
        self.add_eager(name, Some(1), Rc::new(move |mut args: Vec<Value>| {
            f(args.remove(0))
        }))
    }

    pub fn add_binary_function(
        &mut self,
        name: &str,
        f: impl Fn(Value, Value) -> EvalResult + 'static,
    ) -> &mut Self {
        let f = Rc::new(f);
        self.add_eager(name, Some(2), Rc::new(move |mut args: Vec<Value>| {
            let b = args.remove(1);
            let a = args.remove(0);
            f(a, b)
        }))
    }

    /// Variadic eager function.
    pub fn add_function(
        &mut self,
        name: &str,
        f: impl Fn(Vec<Value>) -> EvalResult + 'static,
    ) -> &mut Self {
        self.add_eager(name, None, Rc::new(f))
    }

    pub fn add_math_unary(&mut self, name: &str, f: impl Fn(f64) -> f64 + 'static) -> &mut Self {
        self.add_unary_function(name, move |v| Ok(Value::number(f(v.as_number()?))))
    }

    pub fn add_math_binary(
        &mut self,
        name: &str,
        f: impl Fn(f64, f64) -> f64 + 'static,
    ) -> &mut Self {
        self.add_binary_function(name, move |a, b| {
            Ok(Value::number(f(a.as_number()?, b.as_number()?)))
        })
    }

    pub fn add_lazy_function(&mut self, name: &str, arity: Option<usize>, f: LazyCall) -> &mut Self {
        self.registry.put_function(name, FunctionEntry {
            arity,
            imp: FunctionImp::Lazy(f),
        });
        self
    }

    fn add_eager(&mut self, name: &str, arity: Option<usize>, f: EagerCall) -> &mut Self {
        self.registry.put_function(name, FunctionEntry {
            arity,
            imp: FunctionImp::Eager(f),
        });
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            registry: Rc::new(self.registry),
            namespaces: Namespaces::new(),
            cache: RefCell::new(HashMap::new()),
            interceptor: Rc::new(RefCell::new(None)),
            sink: self.sink,
            builtins: self.builtins,
            comments: self.comments,
            newline_markers: self.newline_markers,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> EngineBuilder {
        EngineBuilder::new()
    }
}

pub struct Engine {
    registry: Rc<Registry>,
    namespaces: Namespaces,
    cache: RefCell<HashMap<String, Rc<Program>>>,
    interceptor: InterceptorSlot,
    sink: PrintSink,
    builtins: Vec<String>,
    comments: bool,
    newline_markers: bool,
}

impl Engine {
    pub fn new() -> Engine {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn default_host(&self) -> Rc<Host> {
        self.namespaces.default_host()
    }

    pub fn host(&self, name: &str) -> Rc<Host> {
        self.namespaces.get_or_create(name)
    }

    pub fn new_context(&self, host: &Rc<Host>) -> Context {
        Context::new(Rc::clone(host), Rc::clone(&self.registry))
    }

    /// Redirects `print()` output.
    pub fn set_printer(&self, sink: impl FnMut(&str) + 'static) {
        *self.sink.borrow_mut() = Box::new(sink);
    }

    pub fn set_error_interceptor(&self, interceptor: ErrorInterceptor) {
        *self.interceptor.borrow_mut() = Some(interceptor);
    }

    pub fn clear_error_interceptor(&self) {
        *self.interceptor.borrow_mut() = None;
    }

    /// Functions installed by the engine itself.
    pub fn builtin_functions(&self) -> &[String] {
        &self.builtins
    }

    /// Functions the embedder registered on top of the standard set.
    pub fn extension_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .function_names()
            .into_iter()
            .filter(|n| self.builtins.binary_search(n).is_err())
            .collect();
        names.sort();
        names
    }

    pub fn compile(&self, name: Option<&str>, source: &str) -> Result<Rc<Program>, Diagnostic> {
        let normalized = normalize(source);
        let key = self.cache_key(name, &normalized);
        if let Some(hit) = self.cache.borrow().get(&key) {
            trace!(name, "program cache hit");
            return Ok(Rc::clone(hit));
        }
        debug!(name, bytes = normalized.len(), "compiling program");

        let mut chars: Vec<char> = normalized.chars().collect();
        let tokens = tokenize(&chars, &self.registry, self.comments, self.newline_markers)
            .map_err(|e| self.frontend_diagnostic(name, &chars, e))?;
        let tokens = post_process(tokens);
        let rpn = shunting_yard(tokens, &self.registry, &mut chars)
            .map_err(|e| self.frontend_diagnostic(name, &chars, e))?;

        // the parser may have folded newline markers into the text; the
        // program's metadata is built from the final form
        let meta = ProgramMeta::new(
            name,
            chars.iter().collect::<String>(),
            Rc::clone(&self.interceptor),
        );
        validate(&rpn, &self.registry).map_err(|e| to_diagnostic(&meta, e))?;
        let thunk =
            build(rpn.clone(), &self.registry, &meta).map_err(|e| to_diagnostic(&meta, e))?;

        let program = Rc::new(Program { thunk, meta, rpn });
        self.cache.borrow_mut().insert(key, Rc::clone(&program));
        Ok(program)
    }

    /// Evaluates a compiled program in the given context. Control signals
    /// reaching the top level resolve to their carried value.
    pub fn eval(&self, program: &Program, ctx: &mut Context) -> Result<Value, Diagnostic> {
        match program
            .thunk
            .eval(ctx, crate::runtime::thunk::EvalKind::None)
        {
            Ok(v) => Ok(v),
            Err(Flow::Return(v)) | Err(Flow::Throw(v)) | Err(Flow::Exit(v)) => Ok(v),
            Err(Flow::Error(Problem::TooDeep)) => {
                Err(Diagnostic::plain("Your thoughts are too deep"))
            }
            Err(Flow::Error(Problem::Internal(m))) => Err(Diagnostic::plain(format!(
                "Your expression result is incorrect: {m}"
            ))),
            Err(Flow::Error(Problem::Math(m))) => Err(Diagnostic::plain(format!(
                "The final result is incorrect, {m}"
            ))),
            Err(Flow::Error(Problem::Positioned(d))) => Err(d),
        }
    }

    /// Compile and evaluate against the default namespace.
    pub fn run(&self, source: &str) -> Result<Value, Diagnostic> {
        let program = self.compile(None, source)?;
        let mut ctx = self.new_context(&self.default_host());
        self.eval(&program, &mut ctx)
    }

    /// Calls a function previously defined with `->` in the given namespace.
    pub fn invoke(
        &self,
        host: &Rc<Host>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, InvokeError> {
        let def = host
            .get_function(&name.to_lowercase())
            .ok_or_else(|| InvokeError::UnknownFunction(name.to_string()))?;
        if args.len() != def.params.len() {
            return Err(InvokeError::ArityMismatch {
                expected: def.params.len(),
                got: args.len(),
            });
        }
        let thunks: Vec<Thunk> = args.into_iter().map(Thunk::constant).collect();
        let mut ctx = self.new_context(host);
        let meta = Rc::clone(&def.meta);
        let token = def.token.clone();
        match def.call(
            &mut ctx,
            crate::runtime::thunk::EvalKind::None,
            &meta,
            &token,
            &thunks,
        ) {
            Ok(v) | Err(Flow::Return(v)) | Err(Flow::Exit(v)) => Ok(v),
            Err(Flow::Throw(v)) => Err(InvokeError::Failed(Diagnostic::plain(format!(
                "Uncaught exception: {}",
                v.display()
            )))),
            Err(Flow::Error(Problem::TooDeep)) => Err(InvokeError::Failed(Diagnostic::plain(
                "Your thoughts are too deep",
            ))),
            Err(Flow::Error(Problem::Internal(m))) => Err(InvokeError::Failed(Diagnostic::plain(
                format!("Your expression result is incorrect: {m}"),
            ))),
            Err(Flow::Error(Problem::Math(m))) => Err(InvokeError::Failed(Diagnostic::plain(
                format!("The final result is incorrect, {m}"),
            ))),
            Err(Flow::Error(Problem::Positioned(d))) => Err(InvokeError::Failed(d)),
        }
    }

    /// Compiles and returns the RPN surfaces, for grammar debugging.
    pub fn rpn(&self, source: &str) -> Result<Vec<String>, Diagnostic> {
        let program = self.compile(None, source)?;
        Ok(program.rpn().iter().map(|t| t.surface.clone()).collect())
    }

    fn cache_key(&self, name: Option<&str>, normalized: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.unwrap_or("").as_bytes());
        hasher.update([0, self.comments as u8, self.newline_markers as u8, 0]);
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn frontend_diagnostic(
        &self,
        name: Option<&str>,
        chars: &[char],
        err: FrontendError,
    ) -> Diagnostic {
        let meta = ProgramMeta::new(
            name,
            chars.iter().collect::<String>(),
            Rc::clone(&self.interceptor),
        );
        to_diagnostic(&meta, err)
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

fn to_diagnostic(meta: &Rc<ProgramMeta>, err: FrontendError) -> Diagnostic {
    match &err.token {
        Some(token) => Diagnostic::positioned(meta, token, &err.message),
        None => Diagnostic::plain(err.message),
    }
}

/// Trims the program, normalizes line endings, and drops trailing
/// semicolons so the last expression's value is the program's value.
fn normalize(source: &str) -> String {
    source
        .trim()
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end_matches(';')
        .to_string()
}
