//! Tree-walking interpreter with fuel, call-depth and list-size limits

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use super::ast::{BinaryOp, Expr, FunctionDef, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
use super::value::Value;
use super::{SandboxError, SandboxLimits};

/// Bound on nested statement/expression evaluation within one call chain
const MAX_EVAL_NESTING: usize = 256;

type Result<T> = std::result::Result<T, SandboxError>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Lexical scopes of one function activation
struct Frame {
    scopes: Vec<HashMap<String, Value>>,
}

impl Frame {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn declare(&mut self, name: String, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, value);
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }
}

pub struct Interpreter<'p> {
    program: &'p Program,
    limits: SandboxLimits,
    fuel_used: u64,
    call_depth: usize,
    nesting: usize,
    line: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, limits: SandboxLimits) -> Self {
        Self {
            program,
            limits,
            fuel_used: 0,
            call_depth: 0,
            nesting: 0,
            line: 0,
        }
    }

    /// Call a user-defined function by name
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let program = self.program;
        match program.functions.get(name) {
            Some(function) => self.call_user(function, args),
            None => Err(self.error(format!("undefined function '{}'", name))),
        }
    }

    pub fn fuel_used(&self) -> u64 {
        self.fuel_used
    }

    // ------------------------------------------------------------------
    // Limits and error helpers (shared with the builtins)
    // ------------------------------------------------------------------

    pub(super) fn consume(&mut self, amount: u64) -> Result<()> {
        self.fuel_used = self.fuel_used.saturating_add(amount);
        if self.fuel_used > self.limits.fuel {
            return Err(SandboxError::FuelExhausted(self.limits.fuel));
        }
        Ok(())
    }

    pub(super) fn check_list_len(&self, len: usize) -> Result<()> {
        if len > self.limits.max_list_len {
            return Err(SandboxError::ListTooLong(self.limits.max_list_len));
        }
        Ok(())
    }

    pub(super) fn check_string_len(&self, len: usize) -> Result<()> {
        if len > self.limits.max_string_len {
            return Err(SandboxError::StringTooLong(self.limits.max_string_len));
        }
        Ok(())
    }

    pub(super) fn error(&self, message: impl Into<String>) -> SandboxError {
        SandboxError::Runtime {
            line: self.line,
            message: message.into(),
        }
    }

    pub(super) fn number(&self, value: &Value, context: &str) -> Result<f64> {
        match value {
            Value::Number(n) => Ok(*n),
            other => Err(self.error(format!(
                "{} expects a number, got {}",
                context,
                other.type_name()
            ))),
        }
    }

    pub(super) fn finite(&self, n: f64) -> Result<Value> {
        if n.is_finite() {
            Ok(Value::Number(n))
        } else {
            Err(self.error("arithmetic produced a non-finite number"))
        }
    }

    pub(super) fn integer(&self, value: &Value, context: &str) -> Result<i64> {
        let n = self.number(value, context)?;
        if n.fract() != 0.0 {
            return Err(self.error(format!("{} expects an integer, got {}", context, n)));
        }
        Ok(n as i64)
    }

    fn enter(&mut self) -> Result<()> {
        self.consume(1)?;
        self.nesting += 1;
        if self.nesting > MAX_EVAL_NESTING {
            self.nesting -= 1;
            return Err(self.error("evaluation nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn call_user(&mut self, function: &'p FunctionDef, args: Vec<Value>) -> Result<Value> {
        if args.len() != function.params.len() {
            return Err(self.error(format!(
                "function '{}' takes {} arguments, got {}",
                function.name,
                function.params.len(),
                args.len()
            )));
        }
        if self.call_depth >= self.limits.max_call_depth {
            return Err(SandboxError::CallDepth(self.limits.max_call_depth));
        }

        let mut frame = Frame::new();
        for (param, arg) in function.params.iter().zip(args) {
            frame.declare(param.clone(), arg);
        }

        self.call_depth += 1;
        let flow = self.exec_block(&mut frame, &function.body);
        self.call_depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
            Flow::Break | Flow::Continue => Err(self.error("break or continue outside of a loop")),
        }
    }

    fn exec_block(&mut self, frame: &mut Frame, body: &'p [Stmt]) -> Result<Flow> {
        frame.scopes.push(HashMap::new());
        let flow = self.exec_stmts(frame, body);
        frame.scopes.pop();
        flow
    }

    fn exec_stmts(&mut self, frame: &mut Frame, body: &'p [Stmt]) -> Result<Flow> {
        for stmt in body {
            match self.exec_stmt(frame, stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, frame: &mut Frame, stmt: &'p Stmt) -> Result<Flow> {
        self.line = stmt.line;
        self.enter()?;
        let flow = self.exec_stmt_inner(frame, stmt);
        self.leave();
        flow
    }

    fn exec_stmt_inner(&mut self, frame: &mut Frame, stmt: &'p Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                let value = self.eval(frame, value)?;
                frame.declare(name.clone(), value);
            }
            StmtKind::Assign { name, op, value } => {
                let rhs = self.eval(frame, value)?;
                let value = match op {
                    None => rhs,
                    Some(op) => {
                        let current = frame
                            .lookup(name)
                            .cloned()
                            .ok_or_else(|| self.error(format!("undefined variable '{}'", name)))?;
                        self.binary(*op, current, rhs)?
                    }
                };
                if !frame.assign(name, value) {
                    return Err(self.error(format!(
                        "assignment to undeclared variable '{}' (use let)",
                        name
                    )));
                }
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(frame, cond)?.is_truthy() {
                        return self.exec_block(frame, body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(frame, body);
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval(frame, cond)?.is_truthy() {
                    match self.exec_block(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For {
                var,
                iterable,
                body,
            } => {
                let items = match self.eval(frame, iterable)? {
                    Value::List(items) => items,
                    Value::Map(map) => Rc::new(
                        map.keys()
                            .map(|k| Value::Str(Arc::from(k.as_str())))
                            .collect(),
                    ),
                    other => {
                        return Err(self.error(format!(
                            "cannot iterate over {}",
                            other.type_name()
                        )))
                    }
                };
                for item in items.iter() {
                    self.consume(1)?;
                    frame
                        .scopes
                        .push(HashMap::from([(var.clone(), item.clone())]));
                    let flow = self.exec_block(frame, body);
                    frame.scopes.pop();
                    match flow? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval(&mut self, frame: &mut Frame, expr: &'p Expr) -> Result<Value> {
        self.enter()?;
        let value = self.eval_inner(frame, expr);
        self.leave();
        value
    }

    fn eval_inner(&mut self, frame: &mut Frame, expr: &'p Expr) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Nil => Ok(Value::Nil),
            Expr::List(items) => {
                self.check_list_len(items.len())?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(frame, item)?);
                }
                Ok(Value::list(values))
            }
            Expr::Var(name) => frame
                .lookup(name)
                .cloned()
                .ok_or_else(|| self.error(format!("undefined variable '{}'", name))),
            Expr::Unary { op, expr } => {
                let value = self.eval(frame, expr)?;
                match op {
                    UnaryOp::Neg => {
                        let n = self.number(&value, "unary '-'")?;
                        Ok(Value::Number(-n))
                    }
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                self.binary(*op, lhs, rhs)
            }
            Expr::Logical { op, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)?;
                match (op, lhs.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(lhs),
                    _ => self.eval(frame, rhs),
                }
            }
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, arg)?);
                }
                let program = self.program;
                match program.functions.get(name) {
                    Some(function) => self.call_user(function, values),
                    None => self.call_builtin(name, values),
                }
            }
            Expr::Index { target, index } => {
                let target = self.eval(frame, target)?;
                let index = self.eval(frame, index)?;
                self.index(&target, &index)
            }
            Expr::Slice { target, start, end } => {
                let target = self.eval(frame, target)?;
                let start = match start {
                    Some(expr) => Some(self.eval(frame, expr)?),
                    None => None,
                };
                let end = match end {
                    Some(expr) => Some(self.eval(frame, expr)?),
                    None => None,
                };
                self.slice(&target, start.as_ref(), end.as_ref())
            }
        }
    }

    pub(super) fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        match op {
            BinaryOp::Eq => return Ok(Value::Bool(self.values_equal(&lhs, &rhs)?)),
            BinaryOp::NotEq => return Ok(Value::Bool(!self.values_equal(&lhs, &rhs)?)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => None,
                }
                .ok_or_else(|| {
                    self.error(format!(
                        "cannot compare {} with {}",
                        lhs.type_name(),
                        rhs.type_name()
                    ))
                })?;
                let result = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::LtEq => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        if op == BinaryOp::Add {
            match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => {
                    let len = a.len() + b.len();
                    self.check_string_len(len)?;
                    self.consume(len as u64)?;
                    let mut joined = String::with_capacity(len);
                    joined.push_str(a);
                    joined.push_str(b);
                    return Ok(Value::Str(Arc::from(joined)));
                }
                (Value::List(a), Value::List(b)) => {
                    let len = a.len() + b.len();
                    self.check_list_len(len)?;
                    self.consume(len as u64)?;
                    let mut items = Vec::with_capacity(len);
                    items.extend(a.iter().cloned());
                    items.extend(b.iter().cloned());
                    return Ok(Value::list(items));
                }
                _ => {}
            }
        }

        let (a, b) = match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => {
                return Err(self.error(format!(
                    "unsupported operand types for {:?}: {} and {}",
                    op,
                    lhs.type_name(),
                    rhs.type_name()
                )))
            }
        };

        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => {
                if b == 0.0 {
                    return Err(self.error("division by zero"));
                }
                a / b
            }
            BinaryOp::Rem => {
                if b == 0.0 {
                    return Err(self.error("modulo by zero"));
                }
                // Result takes the sign of the divisor
                a - b * (a / b).floor()
            }
            BinaryOp::Pow => a.powf(b),
            _ => unreachable!("comparison operators handled above"),
        };
        self.finite(result)
    }

    /// Structural equality, one step per visited pair
    ///
    /// Shared sublists are walked again on every visit, so the cost is
    /// charged as fuel rather than bounded by the size of the allocation.
    fn values_equal(&mut self, lhs: &Value, rhs: &Value) -> Result<bool> {
        let mut pending = vec![(lhs, rhs)];
        while let Some((a, b)) = pending.pop() {
            self.consume(1)?;
            let same = match (a, b) {
                (Value::Nil, Value::Nil) => true,
                (Value::Bool(x), Value::Bool(y)) => x == y,
                (Value::Number(x), Value::Number(y)) => x == y,
                (Value::Str(x), Value::Str(y)) => x == y,
                (Value::List(xs), Value::List(ys)) => {
                    if xs.len() == ys.len() {
                        pending.extend(xs.iter().zip(ys.iter()));
                        true
                    } else {
                        false
                    }
                }
                (Value::Map(xs), Value::Map(ys)) => {
                    if xs.len() == ys.len() && xs.keys().eq(ys.keys()) {
                        pending.extend(xs.values().zip(ys.values()));
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if !same {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn index(&self, target: &Value, index: &Value) -> Result<Value> {
        match target {
            Value::List(items) => {
                let i = self.resolve_index(items.len(), index)?;
                Ok(items[i].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = self.resolve_index(chars.len(), index)?;
                Ok(Value::Str(Arc::from(chars[i].to_string())))
            }
            Value::Map(map) => match index {
                Value::Str(key) => map
                    .get(key.as_ref())
                    .cloned()
                    .ok_or_else(|| self.error(format!("key '{}' not found", key))),
                other => Err(self.error(format!(
                    "map keys are strings, got {}",
                    other.type_name()
                ))),
            },
            other => Err(self.error(format!("cannot index into {}", other.type_name()))),
        }
    }

    fn resolve_index(&self, len: usize, index: &Value) -> Result<usize> {
        let raw = self.integer(index, "index")?;
        let resolved = if raw < 0 { raw + len as i64 } else { raw };
        if resolved < 0 || resolved >= len as i64 {
            return Err(self.error(format!("index {} out of range for length {}", raw, len)));
        }
        Ok(resolved as usize)
    }

    fn slice(&mut self, target: &Value, start: Option<&Value>, end: Option<&Value>) -> Result<Value> {
        let len = match target {
            Value::List(items) => items.len(),
            Value::Str(s) => s.chars().count(),
            other => return Err(self.error(format!("cannot slice {}", other.type_name()))),
        };
        let lo = match start {
            Some(v) => clamp_bound(self.integer(v, "slice bound")?, len),
            None => 0,
        };
        let hi = match end {
            Some(v) => clamp_bound(self.integer(v, "slice bound")?, len),
            None => len,
        };
        let hi = hi.max(lo);
        self.consume((hi - lo) as u64)?;

        match target {
            Value::List(items) => Ok(Value::list(items[lo..hi].to_vec())),
            Value::Str(s) => Ok(Value::Str(Arc::from(
                s.chars().skip(lo).take(hi - lo).collect::<String>(),
            ))),
            _ => unreachable!("non-sliceable values rejected above"),
        }
    }
}

/// Python slice bound: negative counts from the end, out of range clamps
fn clamp_bound(bound: i64, len: usize) -> usize {
    let len = len as i64;
    let resolved = if bound < 0 { bound + len } else { bound };
    resolved.clamp(0, len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::parser::parse_program;

    fn run(source: &str, args: Vec<Value>) -> Result<Value> {
        let program = parse_program(source).unwrap();
        Interpreter::new(&program, SandboxLimits::default()).call("f", args)
    }

    fn eval(expr: &str) -> Result<Value> {
        run(&format!("fn f() {{ return {}; }}", expr), vec![])
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Number(7.0));
        assert_eq!(eval("2 ** 3 ** 2").unwrap(), Value::Number(512.0));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Number(2.0));
        assert_eq!(eval("-2 ** 2").unwrap(), Value::Number(-4.0));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert!(matches!(eval("1 / 0"), Err(SandboxError::Runtime { .. })));
    }

    #[test]
    fn test_short_circuit() {
        // rhs would fail if evaluated
        assert_eq!(eval("false and 1 / 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("1 || 1 / 0").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_indexing_and_slicing() {
        let xs = Value::numbers(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let src = "fn f(xs) { return [xs[-1], xs[1:3], xs[-2:], xs[:100], xs[4:1]]; }";
        let out = run(src, vec![xs]).unwrap();
        let Value::List(items) = out else {
            panic!("expected list")
        };
        assert_eq!(items[0], Value::Number(5.0));
        assert_eq!(items[1], Value::numbers(&[2.0, 3.0]));
        assert_eq!(items[2], Value::numbers(&[4.0, 5.0]));
        assert_eq!(items[3], Value::numbers(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(items[4], Value::numbers(&[]));
    }

    #[test]
    fn test_index_out_of_range() {
        let err = run("fn f(xs) { return xs[5]; }", vec![Value::numbers(&[1.0])]).unwrap_err();
        assert!(matches!(err, SandboxError::Runtime { line: 1, .. }));
    }

    #[test]
    fn test_loops_and_scopes() {
        let src = r#"
fn f() {
    let total = 0;
    for x in range(10) {
        if x == 3 { continue; }
        if x == 6 { break; }
        total += x;
    }
    let i = 0;
    while i < 3 { i += 1; }
    return total + i;
}"#;
        // 0+1+2+4+5 = 12, plus 3
        assert_eq!(run(src, vec![]).unwrap(), Value::Number(15.0));
    }

    #[test]
    fn test_assignment_requires_declaration() {
        assert!(run("fn f() { x = 1; return x; }", vec![]).is_err());
    }

    #[test]
    fn test_user_functions_and_recursion() {
        let src = "fn fib(n) { if n < 2 { return n; } return fib(n - 1) + fib(n - 2); } fn f() { return fib(10); }";
        assert_eq!(run(src, vec![]).unwrap(), Value::Number(55.0));
    }

    #[test]
    fn test_infinite_loop_exhausts_fuel() {
        let err = run("fn f() { while true { } }", vec![]).unwrap_err();
        assert!(matches!(err, SandboxError::FuelExhausted(_)));
    }

    #[test]
    fn test_unbounded_recursion_hits_call_depth() {
        let err = run("fn f() { return f(); }", vec![]).unwrap_err();
        assert!(matches!(err, SandboxError::CallDepth(64)));
    }

    #[test]
    fn test_list_growth_is_limited() {
        let program = parse_program("fn f() { let xs = [0]; while true { xs = xs + xs; } }").unwrap();
        let limits = SandboxLimits {
            max_list_len: 1000,
            ..SandboxLimits::default()
        };
        let err = Interpreter::new(&program, limits).call("f", vec![]).unwrap_err();
        assert!(matches!(err, SandboxError::ListTooLong(1000)));
    }

    #[test]
    fn test_string_growth_is_limited() {
        let src = r#"fn f() { let s = "a"; for i in range(27) { s = s + s; } return len(s); }"#;
        let err = run(src, vec![]).unwrap_err();
        assert_eq!(err, SandboxError::StringTooLong(100_000));
    }

    #[test]
    fn test_string_concat_costs_fuel() {
        let program =
            parse_program(r#"fn f() { let s = "a"; for i in range(27) { s = s + s; } return s; }"#)
                .unwrap();
        let limits = SandboxLimits {
            fuel: 10_000,
            max_string_len: usize::MAX,
            ..SandboxLimits::default()
        };
        let err = Interpreter::new(&program, limits).call("f", vec![]).unwrap_err();
        assert_eq!(err, SandboxError::FuelExhausted(10_000));

        let short = parse_program(r#"fn f() { return "ab" + "cd"; }"#).unwrap();
        let mut interpreter = Interpreter::new(&short, SandboxLimits::default());
        assert_eq!(interpreter.call("f", vec![]).unwrap(), Value::Str(Arc::from("abcd")));
        assert!(interpreter.fuel_used() >= 4);
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(eval("[1, [2, 'x']] == [1, [2, 'x']]").unwrap(), Value::Bool(true));
        assert_eq!(eval("[1, [2, 'x']] != [1, [2, 'y']]").unwrap(), Value::Bool(true));
        assert_eq!(eval("[1] == [1, 2]").unwrap(), Value::Bool(false));
        assert_eq!(eval("nil == 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("'a' + 'b' == 'ab'").unwrap(), Value::Bool(true));

        let p = Value::from_json(&serde_json::json!({"a": [1, 2], "b": "x"}));
        let q = Value::from_json(&serde_json::json!({"a": [1, 2], "c": "x"}));
        let src = "fn f(p, q) { return [p == p, p == q]; }";
        assert_eq!(
            run(src, vec![p, q]).unwrap(),
            Value::list(vec![Value::Bool(true), Value::Bool(false)])
        );
    }

    #[test]
    fn test_shared_list_equality_costs_fuel() {
        // 2^25 nodes reachable through 24 levels of sharing
        let src = r#"
fn f() {
    let a = [0];
    let b = [0];
    for i in range(24) {
        a = [a, a];
        b = [b, b];
    }
    return a == b;
}"#;
        let err = run(src, vec![]).unwrap_err();
        assert_eq!(err, SandboxError::FuelExhausted(1_000_000));
    }

    #[test]
    fn test_missing_map_key() {
        let params = Value::from_json(&serde_json::json!({"a": 1}));
        assert!(run("fn f(p) { return p[\"b\"]; }", vec![params.clone()]).is_err());
        assert_eq!(
            run("fn f(p) { return p['a']; }", vec![params]).unwrap(),
            Value::Number(1.0)
        );
    }
}
