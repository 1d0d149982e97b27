//! Runtime values of the strategy language

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// nil, false, 0, "", [] and {} are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
        }
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(items))
    }

    pub fn numbers(values: &[f64]) -> Self {
        Self::list(values.iter().copied().map(Self::Number).collect())
    }

    /// Convert a JSON document into a language value (null becomes nil)
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Nil,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Nil),
            serde_json::Value::String(s) => Self::Str(Arc::from(s.as_str())),
            serde_json::Value::Array(items) => {
                Self::list(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Map(Rc::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::Str(Arc::from("x")).is_truthy());
    }

    #[test]
    fn test_from_json() {
        let value = Value::from_json(&json!({"lookback": 20, "tags": ["a"], "x": null}));
        match value {
            Value::Map(map) => {
                assert_eq!(map["lookback"], Value::Number(20.0));
                assert_eq!(map["x"], Value::Nil);
                assert!(matches!(&map["tags"], Value::List(items) if items.len() == 1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
