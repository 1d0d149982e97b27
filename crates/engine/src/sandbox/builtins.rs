//! Builtin function allowlist of the strategy language

use super::interpreter::Interpreter;
use super::value::Value;
use super::SandboxError;

type Result<T> = std::result::Result<T, SandboxError>;

/// Names callable from strategy code besides user-defined functions
pub const BUILTINS: &[&str] = &[
    "abs", "min", "max", "sum", "mean", "len", "round", "floor", "ceil", "sqrt", "float", "int",
    "bool", "range", "sorted", "reversed", "append", "get", "stdev", "print",
];

impl Interpreter<'_> {
    pub(super) fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        match name {
            "abs" => {
                let [x] = self.arity(name, args)?;
                Ok(Value::Number(self.number(&x, name)?.abs()))
            }
            "floor" => {
                let [x] = self.arity(name, args)?;
                Ok(Value::Number(self.number(&x, name)?.floor()))
            }
            "ceil" => {
                let [x] = self.arity(name, args)?;
                Ok(Value::Number(self.number(&x, name)?.ceil()))
            }
            "sqrt" => {
                let [x] = self.arity(name, args)?;
                let n = self.number(&x, name)?;
                if n < 0.0 {
                    return Err(self.error("sqrt of a negative number"));
                }
                Ok(Value::Number(n.sqrt()))
            }
            "round" => match args.len() {
                1 => {
                    let [x] = self.arity(name, args)?;
                    Ok(Value::Number(self.number(&x, name)?.round()))
                }
                _ => {
                    let [x, digits] = self.arity(name, args)?;
                    let x = self.number(&x, name)?;
                    let digits = self.integer(&digits, name)?.clamp(-15, 15);
                    let factor = 10f64.powi(digits as i32);
                    self.finite((x * factor).round() / factor)
                }
            },
            "min" | "max" => {
                let values = if args.len() == 1 {
                    let [list] = self.arity(name, args)?;
                    self.numbers(&list, name)?
                } else {
                    args.iter()
                        .map(|v| self.number(v, name))
                        .collect::<Result<Vec<_>>>()?
                };
                let folded = if name == "min" {
                    values.iter().copied().reduce(f64::min)
                } else {
                    values.iter().copied().reduce(f64::max)
                };
                folded
                    .map(Value::Number)
                    .ok_or_else(|| self.error(format!("{}() of an empty sequence", name)))
            }
            "sum" => {
                let [list] = self.arity(name, args)?;
                let values = self.numbers(&list, name)?;
                self.finite(values.iter().sum())
            }
            "mean" => {
                let [list] = self.arity(name, args)?;
                let values = self.numbers(&list, name)?;
                if values.is_empty() {
                    return Err(self.error("mean() of an empty sequence"));
                }
                self.finite(values.iter().sum::<f64>() / values.len() as f64)
            }
            "stdev" => {
                let [list] = self.arity(name, args)?;
                let values = self.numbers(&list, name)?;
                if values.len() < 2 {
                    return Ok(Value::Number(0.0));
                }
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                self.finite(variance.sqrt())
            }
            "len" => {
                let [x] = self.arity(name, args)?;
                let len = match &x {
                    Value::List(items) => items.len(),
                    Value::Str(s) => s.chars().count(),
                    Value::Map(map) => map.len(),
                    other => {
                        return Err(self.error(format!("len() of {}", other.type_name())))
                    }
                };
                Ok(Value::Number(len as f64))
            }
            "float" => {
                let [x] = self.arity(name, args)?;
                let n = self.coerce_number(&x, name)?;
                Ok(Value::Number(n))
            }
            "int" => {
                let [x] = self.arity(name, args)?;
                let n = self.coerce_number(&x, name)?;
                Ok(Value::Number(n.trunc()))
            }
            "bool" => {
                let [x] = self.arity(name, args)?;
                Ok(Value::Bool(x.is_truthy()))
            }
            "range" => self.range(args),
            "sorted" => {
                let [list] = self.arity(name, args)?;
                let mut items = self.list_items(&list, name)?;
                if items.iter().all(|v| matches!(v, Value::Number(_))) {
                    items.sort_by(|a, b| match (a, b) {
                        (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
                        _ => std::cmp::Ordering::Equal,
                    });
                } else if items.iter().all(|v| matches!(v, Value::Str(_))) {
                    items.sort_by(|a, b| match (a, b) {
                        (Value::Str(a), Value::Str(b)) => a.cmp(b),
                        _ => std::cmp::Ordering::Equal,
                    });
                } else {
                    return Err(self.error("sorted() needs all numbers or all strings"));
                }
                Ok(Value::list(items))
            }
            "reversed" => {
                let [list] = self.arity(name, args)?;
                let mut items = self.list_items(&list, name)?;
                items.reverse();
                Ok(Value::list(items))
            }
            "append" => {
                let [list, item] = self.arity(name, args)?;
                let mut items = self.list_items(&list, name)?;
                self.check_list_len(items.len() + 1)?;
                items.push(item);
                Ok(Value::list(items))
            }
            "get" => {
                if args.len() == 2 {
                    let [container, key] = self.arity(name, args)?;
                    self.lookup_or(&container, &key, Value::Nil)
                } else {
                    let [container, key, default] = self.arity(name, args)?;
                    self.lookup_or(&container, &key, default)
                }
            }
            "print" => {
                self.consume(args.len() as u64)?;
                Ok(Value::Nil)
            }
            other => Err(self.error(format!("undefined function '{}'", other))),
        }
    }

    fn arity<const N: usize>(&self, name: &str, args: Vec<Value>) -> Result<[Value; N]> {
        let got = args.len();
        args.try_into().map_err(|_| {
            self.error(format!("{}() takes {} arguments, got {}", name, N, got))
        })
    }

    fn list_items(&mut self, value: &Value, name: &str) -> Result<Vec<Value>> {
        match value {
            Value::List(items) => {
                self.consume(items.len() as u64)?;
                Ok(items.as_ref().clone())
            }
            other => Err(self.error(format!(
                "{}() expects a list, got {}",
                name,
                other.type_name()
            ))),
        }
    }

    fn numbers(&mut self, value: &Value, name: &str) -> Result<Vec<f64>> {
        let items = match value {
            Value::List(items) => items,
            other => {
                return Err(self.error(format!(
                    "{}() expects a list, got {}",
                    name,
                    other.type_name()
                )))
            }
        };
        self.consume(items.len() as u64)?;
        items.iter().map(|v| self.number(v, name)).collect()
    }

    fn coerce_number(&self, value: &Value, name: &str) -> Result<f64> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| self.error(format!("{}() cannot parse '{}'", name, s))),
            other => Err(self.error(format!(
                "{}() cannot convert {}",
                name,
                other.type_name()
            ))),
        }
    }

    fn range(&mut self, args: Vec<Value>) -> Result<Value> {
        let bounds = args
            .iter()
            .map(|v| self.integer(v, "range"))
            .collect::<Result<Vec<_>>>()?;
        let (start, stop, step) = match bounds.as_slice() {
            [stop] => (0, *stop, 1),
            [start, stop] => (*start, *stop, 1),
            [start, stop, step] => (*start, *stop, *step),
            _ => return Err(self.error("range() takes 1 to 3 arguments")),
        };
        if step == 0 {
            return Err(self.error("range() step must not be zero"));
        }

        let overflow = || self.error("range() bounds overflow");
        let span = if step > 0 {
            stop.checked_sub(start)
        } else {
            start.checked_sub(stop)
        }
        .ok_or_else(overflow)?;
        let stride = step.checked_abs().ok_or_else(overflow)?;
        let count = if span <= 0 { 0 } else { (span - 1) / stride + 1 };
        self.check_list_len(count as usize)?;
        self.consume(count as u64)?;

        let items = (0..count)
            .map(|i| Value::Number((start + i * step) as f64))
            .collect();
        Ok(Value::list(items))
    }

    fn lookup_or(&self, container: &Value, key: &Value, default: Value) -> Result<Value> {
        match (container, key) {
            (Value::Map(map), Value::Str(key)) => {
                Ok(map.get(key.as_ref()).cloned().unwrap_or(default))
            }
            (Value::List(items), Value::Number(_)) => {
                let raw = self.integer(key, "get")?;
                let idx = if raw < 0 { raw + items.len() as i64 } else { raw };
                Ok(usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or(default))
            }
            (Value::Nil, _) => Ok(default),
            (container, key) => Err(self.error(format!(
                "get() cannot look up {} in {}",
                key.type_name(),
                container.type_name()
            ))),
        }
    }
}

/// True when `name` resolves to a builtin
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}
