use serde_json::{Number, Value};

const FLOAT_TO_INT_MAX: f64 = 9007199254740991_f64;

/// Converting float to int has undefined behaviour for huge floats: https://stackoverflow.com/a/41139453.
/// To avoid this, refuse to convert floats with magnitude greater than 2**53 - 1, after which 64-bit floats no longer
/// retain integer precision.
pub(crate) fn f64_to_i64_safe(f: f64) -> Option<i64> {
    if f.abs() <= FLOAT_TO_INT_MAX {
        Some(f as i64)
    } else {
        None
    }
}

/// Rewrites every number inside `value` as an f64, recursing into arrays and objects.
///
/// This is the dynamic representation handed out by the engine: JSON does not distinguish
/// integers from floats, so neither do flag payloads.
pub(crate) fn floats_only(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64().and_then(Number::from_f64) {
            Some(f) => Value::Number(f),
            None => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(floats_only).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, floats_only(v)))
                .collect(),
        ),
        other => other,
    }
}

/// The inverse of [floats_only] for integral values: any float without a fractional part that
/// fits in the safe integer range is rewritten as an integer. Other floats are left alone.
#[allow(clippy::float_cmp)]
pub(crate) fn fold_integral_floats(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => {
            let folded = n
                .as_f64()
                .and_then(|f| f64_to_i64_safe(f).filter(|i| *i as f64 == f));
            match folded {
                Some(i) => Value::Number(i.into()),
                None => Value::Number(n),
            }
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(fold_integral_floats).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, fold_integral_floats(v)))
                .collect(),
        ),
        other => other,
    }
}
