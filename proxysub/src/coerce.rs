//! Tolerant readers for loosely typed producer output.
//!
//! Subscription producers disagree on whether a port is `443` or `"443"` and
//! whether a flag is `true`, `"true"` or `1`. Everything that reads a JSON
//! value or a `key=value` token goes through these helpers.

use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Reads a string, number or boolean as text. Blank strings count as absent.
/// Surrounding whitespace is kept, since it may be part of a credential.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A port in `1..=65535`.
pub fn coerce_port(value: &Value) -> Option<u16> {
    coerce_int(value)
        .and_then(|i| u16::try_from(i).ok())
        .filter(|&p| p != 0)
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => Some(parse_flag(s)),
        _ => None,
    }
}

/// `true` and `1`, case-insensitive. Anything else is false.
pub fn parse_flag(s: &str) -> bool {
    let s = s.trim();
    s == "1" || s.eq_ignore_ascii_case("true")
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Looks up the first of `keys` holding a non-blank value.
///
/// `keys[0]` is the primary name, the rest are aliases in decreasing
/// priority. A primary with a value always wins over its aliases, whatever
/// that value is.
pub fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !is_blank(v))
}

pub fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_of(obj, keys).and_then(coerce_string)
}

/// Like [`first_string`], trimmed. For structural fields such as server
/// addresses and type names.
pub fn first_trimmed(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_string(obj, keys).map(|s| s.trim().to_string())
}

pub fn first_bool(obj: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    first_of(obj, keys).and_then(coerce_bool)
}

/// A value that some producers send as a string and others as its natural
/// JSON type. Always serialized as a string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lenient<T>(pub T);

impl<T> Serialize for Lenient<T>
where
    T: ToString,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.to_string().serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Lenient<T>
where
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Lenient<T>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StrOrValue<'a, T> {
            Str(Cow<'a, str>),
            Value(T),
        }

        Ok(Lenient(match StrOrValue::<T>::deserialize(deserializer)? {
            StrOrValue::Value(val) => val,
            StrOrValue::Str(s) => s.trim().parse().map_err(serde::de::Error::custom)?,
        }))
    }
}

impl<T> From<T> for Lenient<T> {
    fn from(val: T) -> Self {
        Lenient(val)
    }
}
