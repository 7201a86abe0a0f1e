use std::collections::HashMap;

use chrono::{self, LocalResult, TimeZone, Utc};

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::f64_to_i64_safe;

lazy_static! {
    static ref LOOSE_VERSION_REGEX: Regex = Regex::new(r"^\d+(\.\d+)?(\.\d+)?").unwrap();
}

/// A value attached to an [crate::EvaluationContext] or listed in a targeting clause.
///
/// Numbers are always f64: the flag document is JSON-shaped and makes no integer/float
/// distinction, so neither do clause comparisons.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Array(Vec<AttributeValue>),
    Number(f64),
    Bool(bool),
    Object(HashMap<String, AttributeValue>),
    Null,
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> AttributeValue {
        AttributeValue::String(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> AttributeValue {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> AttributeValue {
        AttributeValue::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Number(i as f64)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        AttributeValue::Number(f)
    }
}

impl<T> From<Vec<T>> for AttributeValue
where
    AttributeValue: From<T>,
{
    fn from(v: Vec<T>) -> AttributeValue {
        AttributeValue::Array(v.into_iter().map(AttributeValue::from).collect())
    }
}

impl From<&Value> for AttributeValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => match n.as_f64() {
                Some(float) => AttributeValue::Number(float),
                None => {
                    warn!("could not interpret '{:?}' as f64", n);
                    AttributeValue::String(n.to_string())
                }
            },
            Value::String(s) => AttributeValue::String(s.clone()),
            Value::Array(arr) => {
                AttributeValue::Array(arr.iter().map(AttributeValue::from).collect())
            }
            Value::Object(obj) => {
                AttributeValue::Object(obj.iter().map(|(k, v)| (k.clone(), v.into())).collect())
            }
        }
    }
}

impl AttributeValue {
    /// Returns None unless self is a String. It will not convert.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interprets the value as a UTC instant: RFC3339 strings, or numbers holding Unix epoch
    /// milliseconds.
    pub fn to_datetime(&self) -> Option<chrono::DateTime<Utc>> {
        match self {
            AttributeValue::Number(millis) => {
                f64_to_i64_safe(*millis).and_then(|millis| match Utc.timestamp_millis_opt(millis) {
                    LocalResult::None | LocalResult::Ambiguous(_, _) => None,
                    LocalResult::Single(time) => Some(time),
                })
            }
            AttributeValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok(),
            AttributeValue::Bool(_) | AttributeValue::Null => None,
            other => {
                warn!("cannot compare attribute value {:?} as a datetime", other);
                None
            }
        }
    }

    /// Parses a string value as a semantic version, accepting "1" and "1.2" as shorthand for
    /// "1.0.0" and "1.2.0". Build metadata is dropped.
    pub fn as_semver(&self) -> Option<semver::Version> {
        let version_str = self.as_str()?;
        semver::Version::parse(version_str)
            .ok()
            .or_else(|| AttributeValue::parse_semver_loose(version_str))
            .map(|mut version| {
                version.build = semver::BuildMetadata::EMPTY;
                version
            })
    }

    fn parse_semver_loose(version_str: &str) -> Option<semver::Version> {
        let parts = LOOSE_VERSION_REGEX.captures(version_str)?;
        let numeric = parts.get(0)?;

        let mut padded = numeric.as_str().to_string();
        for i in 1..parts.len() {
            if parts.get(i).is_none() {
                padded.push_str(".0");
            }
        }
        padded.push_str(&version_str[numeric.end()..]);

        semver::Version::parse(&padded).ok()
    }

    /// Applies `p` to a scalar value, or to each member of an array, returning the first hit.
    pub fn find<P>(&self, p: P) -> Option<&AttributeValue>
    where
        P: Fn(&AttributeValue) -> bool,
    {
        match self {
            AttributeValue::String(_)
            | AttributeValue::Number(_)
            | AttributeValue::Bool(_)
            | AttributeValue::Object(_) => {
                if p(self) {
                    Some(self)
                } else {
                    None
                }
            }
            AttributeValue::Array(values) => values.iter().find(|v| p(v)),
            AttributeValue::Null => None,
        }
    }

    #[allow(clippy::float_cmp)]
    pub(crate) fn as_bucketable(&self) -> Option<String> {
        match self {
            AttributeValue::String(s) => Some(s.clone()),
            // only integral numbers bucket
            AttributeValue::Number(f) => {
                f64_to_i64_safe(*f).and_then(|i| (i as f64 == *f).then(|| i.to_string()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeValue;
    use maplit::hashmap;
    use spectral::prelude::*;
    use test_case::test_case;

    #[test]
    fn deserialization() {
        fn check(json: &str, expected: AttributeValue) {
            assert_eq!(
                serde_json::from_str::<AttributeValue>(json).unwrap(),
                expected
            );
        }

        check("1.0", AttributeValue::Number(1.0));
        check("1", AttributeValue::Number(1.0));
        check("true", AttributeValue::Bool(true));
        check("\"foo\"", AttributeValue::String("foo".to_string()));
        check(
            r#"{"foo":123}"#,
            AttributeValue::Object(hashmap!["foo".to_string() => AttributeValue::Number(123.0)]),
        );
    }

    #[test_case("1.2.3", Some("1.2.3"))]
    #[test_case("1.2", Some("1.2.0"))]
    #[test_case("1", Some("1.0.0"))]
    #[test_case("1-beta1", Some("1.0.0-beta1"))]
    #[test_case("1.2.3+build5", Some("1.2.3"))]
    #[test_case("nope", None)]
    fn semver_parsing(input: &str, expected: Option<&str>) {
        let parsed = AttributeValue::from(input).as_semver();
        assert_that!(parsed.map(|v| v.to_string())).is_equal_to(expected.map(String::from));
    }

    #[test]
    fn datetime_from_millis_and_rfc3339() {
        let from_millis = AttributeValue::Number(1_500_000_000_000.0).to_datetime();
        let from_string = AttributeValue::from("2017-07-14T02:40:00Z").to_datetime();

        assert_that!(from_millis).is_some();
        assert_that!(from_millis).is_equal_to(from_string);
        assert_that!(AttributeValue::Bool(true).to_datetime()).is_none();
    }

    #[test]
    fn bucketable_values() {
        assert_that!(AttributeValue::from("abc").as_bucketable()).contains_value("abc".to_string());
        assert_that!(AttributeValue::Number(33.0).as_bucketable()).contains_value("33".to_string());
        assert_that!(AttributeValue::Number(33.5).as_bucketable()).is_none();
        assert_that!(AttributeValue::Bool(true).as_bucketable()).is_none();
    }
}
