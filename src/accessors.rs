use std::fmt::{self, Write as _};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::{evaluation_context, EvaluationContext};
use crate::engine::Engine;
use crate::error::MarshalStage;
use crate::eval::EvalError;
use crate::util::{f64_to_i64_safe, fold_integral_floats};
use crate::{AttributeValue, Error};

/// The outcome of a typed accessor.
///
/// Accessors never fail outright. Whenever [Resolved::error] is set, [Resolved::value] is the
/// default the caller supplied.
#[derive(Debug)]
#[must_use]
pub struct Resolved<T> {
    pub value: T,
    pub error: Option<Error>,
}

impl<T> Resolved<T> {
    pub fn ok(value: T) -> Self {
        Resolved { value, error: None }
    }

    pub fn fallback(default: T, error: Error) -> Self {
        Resolved {
            value: default,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Discards the value when there is an error.
    pub fn into_result(self) -> Result<T, Error> {
        match self.error {
            None => Ok(self.value),
            Some(e) => Err(e),
        }
    }

    pub fn into_parts(self) -> (T, Option<Error>) {
        (self.value, self.error)
    }
}

/// How [TypedFlags::get_time] formats the default and parses the flag's string value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeLayout {
    /// `2025-07-18T22:37:22.176Z`
    Rfc3339,
    /// `Fri, 18 Jul 2025 22:37:22 +0000`
    Rfc2822,
    /// A chrono strftime pattern. Patterns without an offset are read as UTC, date-only
    /// patterns as midnight and time-only patterns as a time on 1970-01-01.
    Custom(String),
}

impl TimeLayout {
    pub fn format(&self, time: &DateTime<Utc>) -> Option<String> {
        match self {
            TimeLayout::Rfc3339 => Some(time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            TimeLayout::Rfc2822 => Some(time.to_rfc2822()),
            TimeLayout::Custom(pattern) => {
                let mut out = String::new();
                // unknown specifiers fail the write
                write!(out, "{}", time.format(pattern)).ok()?;
                Some(out)
            }
        }
    }

    pub fn parse(&self, value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        let parsed = match self {
            TimeLayout::Rfc3339 => DateTime::parse_from_rfc3339(value),
            TimeLayout::Rfc2822 => DateTime::parse_from_rfc2822(value),
            TimeLayout::Custom(pattern) => return parse_custom(value, pattern),
        };
        parsed.map(|time| time.with_timezone(&Utc))
    }
}

/// Parses with a strftime pattern that may lack an offset, a time or a date. Missing offsets
/// read as UTC, missing times as midnight, and missing dates as 1970-01-01.
fn parse_custom(value: &str, pattern: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let err = match DateTime::parse_from_str(value, pattern) {
        Ok(time) => return Ok(time.with_timezone(&Utc)),
        Err(e) => e,
    };

    let naive = NaiveDateTime::parse_from_str(value, pattern)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, pattern)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            let time = NaiveTime::parse_from_str(value, pattern).ok()?;
            NaiveDate::from_ymd_opt(1970, 1, 1).map(|epoch| epoch.and_time(time))
        });

    match naive {
        Some(naive) => Ok(Utc.from_utc_datetime(&naive)),
        None => Err(err),
    }
}

impl fmt::Display for TimeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeLayout::Rfc3339 => f.write_str("RFC3339"),
            TimeLayout::Rfc2822 => f.write_str("RFC2822"),
            TimeLayout::Custom(pattern) => f.write_str(pattern),
        }
    }
}

/// A type [TypedFlags::is_enabled_by_id_list] can look up in a flag's list.
///
/// Lists come back from the engine with every number as a float, so integer keys match list
/// numbers after truncation toward zero.
pub trait ListKey: PartialEq + Sized {
    /// Views one list element as `Self`, or `None` when it cannot be one.
    fn from_item(item: &Value) -> Option<Self>;
}

macro_rules! impl_int_list_key {
    ($($t:ty),*) => {
        $(
            impl ListKey for $t {
                fn from_item(item: &Value) -> Option<Self> {
                    let n = match item {
                        Value::Number(n) => n,
                        _ => return None,
                    };
                    if let Some(u) = n.as_u64() {
                        return <$t>::try_from(u).ok();
                    }
                    let i = n.as_i64().or_else(|| n.as_f64().and_then(f64_to_i64_safe))?;
                    <$t>::try_from(i).ok()
                }
            }
        )*
    };
}

impl_int_list_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ListKey for String {
    fn from_item(item: &Value) -> Option<Self> {
        item.as_str().map(str::to_owned)
    }
}

fn forward<T>(result: Result<T, EvalError>, default: T) -> Resolved<T> {
    match result {
        Ok(value) => Resolved::ok(value),
        Err(e) => Resolved::fallback(default, Error::Evaluation(e)),
    }
}

fn plain_context(user_id: &str) -> EvaluationContext {
    evaluation_context(user_id, None)
}

/// Typed accessors over any [Engine].
///
/// Every accessor builds an evaluation context for `user_id` (empty means anonymous), asks the
/// engine for the flag, and converts the answer to the requested type. See [crate::global] for
/// the same accessors bound to the process-wide client.
pub trait TypedFlags: Engine {
    fn is_enabled(&self, flag: &str, user_id: &str, default: bool) -> Resolved<bool> {
        forward(
            self.bool_variation(flag, &plain_context(user_id), default),
            default,
        )
    }

    /// Like [TypedFlags::is_enabled], with `id` attached to the context under `attribute`.
    fn is_enabled_by_id(
        &self,
        flag: &str,
        user_id: &str,
        id: &str,
        attribute: &str,
        default: bool,
    ) -> Resolved<bool> {
        let context = evaluation_context(user_id, Some((attribute, AttributeValue::from(id))));
        forward(self.bool_variation(flag, &context, default), default)
    }

    fn get_int(&self, flag: &str, user_id: &str, default: i64) -> Resolved<i64> {
        forward(
            self.int_variation(flag, &plain_context(user_id), default),
            default,
        )
    }

    fn get_float(&self, flag: &str, user_id: &str, default: f64) -> Resolved<f64> {
        forward(
            self.float_variation(flag, &plain_context(user_id), default),
            default,
        )
    }

    fn get_string(&self, flag: &str, user_id: &str, default: impl Into<String>) -> Resolved<String> {
        let default = default.into();
        forward(
            self.string_variation(flag, &plain_context(user_id), default.clone()),
            default,
        )
    }

    /// Reads a string flag and parses it with `layout`. The default is formatted with the same
    /// layout so a disabled flag round-trips to it.
    fn get_time(
        &self,
        flag: &str,
        user_id: &str,
        layout: &TimeLayout,
        default: DateTime<Utc>,
    ) -> Resolved<DateTime<Utc>> {
        let formatted = match layout.format(&default) {
            Some(formatted) => formatted,
            None => {
                return Resolved::fallback(
                    default,
                    Error::TimeFormat {
                        flag: flag.to_owned(),
                        layout: layout.to_string(),
                    },
                )
            }
        };

        let value = match self.string_variation(flag, &plain_context(user_id), formatted) {
            Ok(value) => value,
            Err(e) => return Resolved::fallback(default, Error::flag(flag, e)),
        };

        match layout.parse(&value) {
            Ok(time) => Resolved::ok(time),
            Err(source) => Resolved::fallback(
                default,
                Error::TimeParse {
                    value,
                    layout: layout.to_string(),
                    source,
                },
            ),
        }
    }

    /// Reads an object flag into `T`.
    ///
    /// The engine hands out every number as a float; integral floats are folded back to
    /// integers before decoding, so integer fields accept values like `40.0`. Integral floats
    /// beyond 2^53 in magnitude stay floats, so integer fields fail to decode them with
    /// [MarshalStage::DecodeResult].
    fn get_json_struct<T>(&self, flag: &str, user_id: &str, default: T) -> Resolved<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let default_map = match serde_json::to_value(&default) {
            Err(e) => {
                return Resolved::fallback(
                    default,
                    Error::marshal(flag, MarshalStage::EncodeDefault, e),
                )
            }
            Ok(encoded) => match serde_json::from_value::<Map<String, Value>>(encoded) {
                Ok(map) => map,
                Err(e) => {
                    return Resolved::fallback(
                        default,
                        Error::marshal(flag, MarshalStage::DefaultToMap, e),
                    )
                }
            },
        };

        let map = match self.json_variation(flag, &plain_context(user_id), default_map) {
            Ok(map) => map,
            Err(e) => return Resolved::fallback(default, Error::flag(flag, e)),
        };

        match serde_json::from_value(fold_integral_floats(Value::Object(map))) {
            Ok(value) => Resolved::ok(value),
            Err(e) => Resolved::fallback(default, Error::marshal(flag, MarshalStage::DecodeResult, e)),
        }
    }

    /// Reads an object flag as-is. Numbers come back as floats.
    fn get_json_map(
        &self,
        flag: &str,
        user_id: &str,
        default: Map<String, Value>,
    ) -> Resolved<Map<String, Value>> {
        match self.json_variation(flag, &plain_context(user_id), default.clone()) {
            Ok(map) => Resolved::ok(map),
            Err(e) => Resolved::fallback(default, Error::flag(flag, e)),
        }
    }

    /// Whether the flag's list contains `lookup`.
    ///
    /// Elements that cannot be viewed as `K` never match. An empty list is `false`; `default`
    /// is only returned alongside an error.
    fn is_enabled_by_id_list<K>(&self, flag: &str, user_id: &str, lookup: K, default: bool) -> Resolved<bool>
    where
        K: ListKey,
    {
        let items = match self.json_array_variation(flag, &plain_context(user_id), Vec::new()) {
            Ok(items) => items,
            Err(e) => return Resolved::fallback(default, Error::flag(flag, e)),
        };

        Resolved::ok(
            items
                .iter()
                .any(|item| K::from_item(item).map_or(false, |key| key == lookup)),
        )
    }
}

impl<E: Engine + ?Sized> TypedFlags for E {}
