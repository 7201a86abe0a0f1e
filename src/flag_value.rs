use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::{f64_to_i64_safe, floats_only};

/// One variation of a flag, as written in the flag document.
///
/// Deserialization tries the variants in order, so every number lands in `Float`; `Int` exists
/// for values built in code.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
    Float(f64),
    Int(i64),
    Json(serde_json::Value),
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> FlagValue {
        FlagValue::Bool(b)
    }
}

impl From<String> for FlagValue {
    fn from(s: String) -> FlagValue {
        FlagValue::Str(s)
    }
}

impl From<&str> for FlagValue {
    fn from(s: &str) -> FlagValue {
        FlagValue::Str(s.to_owned())
    }
}

impl From<f64> for FlagValue {
    fn from(f: f64) -> FlagValue {
        FlagValue::Float(f)
    }
}

impl From<i64> for FlagValue {
    fn from(i: i64) -> FlagValue {
        FlagValue::Int(i)
    }
}

impl From<serde_json::Value> for FlagValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            Value::Bool(b) => b.into(),
            Value::Number(n) => match n.as_f64() {
                Some(f) => f.into(),
                None => {
                    warn!("unrepresentable number {}, converting to string", n);
                    FlagValue::Str(n.to_string())
                }
            },
            Value::String(s) => s.into(),
            Value::Null | Value::Object(_) | Value::Array(_) => FlagValue::Json(v),
        }
    }
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => {
                warn!("variation type is not bool but {:?}", self);
                None
            }
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            FlagValue::Str(s) => Some(s.clone()),
            _ => {
                warn!("variation type is not str but {:?}", self);
                None
            }
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FlagValue::Float(f) => Some(*f),
            FlagValue::Int(i) => Some(*i as f64),
            _ => {
                warn!("variation type is not float but {:?}", self);
                None
            }
        }
    }

    /// Integer view of a numeric variation. Floats are truncated toward zero.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(i) => Some(*i),
            FlagValue::Float(f) => f64_to_i64_safe(*f),
            _ => {
                warn!("variation type is not int but {:?}", self);
                None
            }
        }
    }

    /// The variation as a JSON value, with every number carried as an f64.
    pub fn as_json(&self) -> Value {
        match self {
            FlagValue::Bool(b) => Value::from(*b),
            FlagValue::Str(s) => Value::from(s.as_str()),
            FlagValue::Float(f) => Value::from(*f),
            FlagValue::Int(i) => Value::from(*i as f64),
            FlagValue::Json(v) => floats_only(v.clone()),
        }
    }

    pub fn as_object(&self) -> Option<Map<String, Value>> {
        match self.as_json() {
            Value::Object(map) => Some(map),
            _ => {
                warn!("variation type is not a JSON object but {:?}", self);
                None
            }
        }
    }

    pub fn as_array(&self) -> Option<Vec<Value>> {
        match self.as_json() {
            Value::Array(items) => Some(items),
            _ => {
                warn!("variation type is not a JSON array but {:?}", self);
                None
            }
        }
    }
}
