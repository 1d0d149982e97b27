//! Signal sandbox: a small restricted strategy language
//!
//! Strategy code is parsed into an AST and evaluated by a tree-walking
//! interpreter. The only capabilities available to a strategy are the
//! builtins in [`builtins::BUILTINS`]; there is no I/O, clock, randomness
//! or module system. Every evaluation runs under [`SandboxLimits`].

pub mod ast;
mod builtins;
mod interpreter;
mod lexer;
mod parser;
pub mod templates;
mod value;

use thiserror::Error;

use crate::types::Signal;
use ast::{Expr, Program, Stmt, StmtKind};
pub use builtins::{is_builtin, BUILTINS};
pub use interpreter::Interpreter;
pub use value::Value;

/// Name and arity of the entry point every strategy must define
pub const ENTRY_POINT: &str = "signal";
pub const ENTRY_POINT_ARITY: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SandboxError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unknown function '{name}' called on line {line}")]
    UnknownFunction { line: usize, name: String },

    #[error("strategy must define fn signal(prices, position, params)")]
    MissingEntryPoint,

    #[error("fn signal must take 3 parameters (prices, position, params), found {0}")]
    EntryPointArity(usize),

    #[error("runtime error on line {line}: {message}")]
    Runtime { line: usize, message: String },

    #[error("fuel budget of {0} steps exhausted")]
    FuelExhausted(u64),

    #[error("maximum call depth of {0} exceeded")]
    CallDepth(usize),

    #[error("list length limit of {0} exceeded")]
    ListTooLong(usize),

    #[error("string length limit of {0} bytes exceeded")]
    StringTooLong(usize),
}

impl SandboxError {
    /// Compile-time failures reject the strategy; everything else is per-evaluation
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::Syntax { .. }
                | Self::UnknownFunction { .. }
                | Self::MissingEntryPoint
                | Self::EntryPointArity(_)
        )
    }
}

/// Resource limits applied to each `signal` evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Steps (statements, expression nodes, builtin element visits)
    pub fuel: u64,
    pub max_call_depth: usize,
    pub max_list_len: usize,
    /// Bytes
    pub max_string_len: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            fuel: 1_000_000,
            max_call_depth: 64,
            max_list_len: 100_000,
            max_string_len: 100_000,
        }
    }
}

/// A strategy that parsed and passed static validation
#[derive(Debug, Clone)]
pub struct CompiledStrategy {
    program: Program,
    limits: SandboxLimits,
}

/// Parse and validate strategy code without running it
pub fn compile(code: &str) -> Result<CompiledStrategy, SandboxError> {
    let program = parser::parse_program(code)?;

    let entry = program
        .functions
        .get(ENTRY_POINT)
        .ok_or(SandboxError::MissingEntryPoint)?;
    if entry.params.len() != ENTRY_POINT_ARITY {
        return Err(SandboxError::EntryPointArity(entry.params.len()));
    }

    for function in program.functions.values() {
        check_calls(&program, &function.body)?;
    }

    Ok(CompiledStrategy {
        program,
        limits: SandboxLimits::default(),
    })
}

impl CompiledStrategy {
    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Evaluate `signal` once with a fresh fuel budget
    pub fn evaluate(&self, prices: &[f64], position: f64, params: &Value) -> Result<Signal, SandboxError> {
        let mut interpreter = Interpreter::new(&self.program, self.limits);
        let result = interpreter.call(
            ENTRY_POINT,
            vec![Value::numbers(prices), Value::Number(position), params.clone()],
        )?;
        Ok(coerce_signal(&result))
    }

    /// Bind a JSON parameter mapping, producing a per-bar signal source
    pub fn bind(&self, params: &serde_json::Value) -> BoundStrategy<'_> {
        BoundStrategy {
            strategy: self,
            params: Value::from_json(params),
        }
    }
}

/// Map a `signal` return value onto a trading decision
///
/// -1/0/1 map to Sell/Hold/Buy, `true` to Buy and `false` to Hold;
/// anything else is Hold.
pub fn coerce_signal(value: &Value) -> Signal {
    match value {
        Value::Number(n) => Signal::from_number(*n),
        Value::Bool(true) => Signal::Buy,
        _ => Signal::Hold,
    }
}

/// Per-bar decision source driven by the simulator
pub trait SignalSandbox {
    fn signal(&mut self, window: &[f64], position: f64) -> Result<Signal, SandboxError>;
}

impl<F> SignalSandbox for F
where
    F: FnMut(&[f64], f64) -> Result<Signal, SandboxError>,
{
    fn signal(&mut self, window: &[f64], position: f64) -> Result<Signal, SandboxError> {
        self(window, position)
    }
}

/// A compiled strategy bound to one parameter set
pub struct BoundStrategy<'a> {
    strategy: &'a CompiledStrategy,
    params: Value,
}

impl SignalSandbox for BoundStrategy<'_> {
    fn signal(&mut self, window: &[f64], position: f64) -> Result<Signal, SandboxError> {
        self.strategy.evaluate(window, position, &self.params)
    }
}

fn check_calls(program: &Program, body: &[Stmt]) -> Result<(), SandboxError> {
    for stmt in body {
        let mut exprs: Vec<&Expr> = Vec::new();
        let mut blocks: Vec<&[Stmt]> = Vec::new();
        match &stmt.kind {
            StmtKind::Let { value, .. } | StmtKind::Assign { value, .. } => exprs.push(value),
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, block) in branches {
                    exprs.push(cond);
                    blocks.push(block);
                }
                if let Some(block) = otherwise {
                    blocks.push(block);
                }
            }
            StmtKind::While { cond, body } => {
                exprs.push(cond);
                blocks.push(body);
            }
            StmtKind::For { iterable, body, .. } => {
                exprs.push(iterable);
                blocks.push(body);
            }
            StmtKind::Return(Some(value)) | StmtKind::Expr(value) => exprs.push(value),
            StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
        }

        while let Some(expr) = exprs.pop() {
            match expr {
                Expr::Call { name, args } => {
                    if !program.functions.contains_key(name) && !is_builtin(name) {
                        return Err(SandboxError::UnknownFunction {
                            line: stmt.line,
                            name: name.clone(),
                        });
                    }
                    exprs.extend(args);
                }
                Expr::List(items) => exprs.extend(items),
                Expr::Unary { expr, .. } => exprs.push(expr),
                Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                    exprs.push(lhs);
                    exprs.push(rhs);
                }
                Expr::Index { target, index } => {
                    exprs.push(target);
                    exprs.push(index);
                }
                Expr::Slice { target, start, end } => {
                    exprs.push(target);
                    exprs.extend(start.as_deref());
                    exprs.extend(end.as_deref());
                }
                Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Nil | Expr::Var(_) => {}
            }
        }

        for block in blocks {
            check_calls(program, block)?;
        }
    }
    Ok(())
}
