//! Decoding of view function results.
//!
//! A view call returns a JSON array with one element per declared return value.
//! Move `u64`/`u128` values come back as strings, smaller integers as numbers,
//! `Option<T>` as `{"vec": []}` or `{"vec": [x]}`, and structs as objects.

use crate::address::Address;
use crate::error::{Error, ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// The positional return values of a view call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Returns(Vec<Value>);

impl Returns {
    pub fn new(values: Vec<Value>) -> Returns {
        Returns(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&Value, Error> {
        self.0.get(index).ok_or_else(|| {
            ErrorKind::Decode(format!(
                "expected a value at position {index}, got {} values",
                self.0.len()
            ))
            .into()
        })
    }

    pub fn u64(&self, index: usize) -> Result<u64, Error> {
        u64_from_value(self.value(index)?)
    }

    pub fn bool(&self, index: usize) -> Result<bool, Error> {
        match self.value(index)? {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", index, other)),
        }
    }

    pub fn string(&self, index: usize) -> Result<String, Error> {
        match self.value(index)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", index, other)),
        }
    }

    pub fn address(&self, index: usize) -> Result<Address, Error> {
        Address::try_from_chain(&self.string(index)?)
    }

    /// A Move `Option<T>` at this position
    pub fn option<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, Error> {
        match move_option(self.value(index)?)? {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    /// A vector (of anything deserializable) at this position
    pub fn vec<T: DeserializeOwned>(&self, index: usize) -> Result<Vec<T>, Error> {
        match self.value(index)? {
            v @ Value::Array(_) => Ok(serde_json::from_value(v.clone())?),
            other => Err(mismatch("vector", index, other)),
        }
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Returns {
    fn from(values: Vec<Value>) -> Returns {
        Returns(values)
    }
}

fn mismatch(expected: &str, index: usize, got: &Value) -> Error {
    ErrorKind::Decode(format!("expected {expected} at position {index}, got {got}")).into()
}

/// Read an integer that may be encoded as a JSON number or a decimal string
pub fn u64_from_value(value: &Value) -> Result<u64, Error> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ErrorKind::Decode(format!("{n} is not a u64")).into()),
        Value::String(s) => Ok(s.parse::<u64>()?),
        other => Err(ErrorKind::Decode(format!("expected integer, got {other}")).into()),
    }
}

/// Unwrap a Move `Option`, which is serialized as an object holding a 0 or 1
/// element `vec`. A bare null is also accepted as none.
pub fn move_option(value: &Value) -> Result<Option<&Value>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => match map.get("vec") {
            Some(Value::Array(v)) => Ok(v.first()),
            _ => Err(ErrorKind::Decode(format!("expected Move option, got {value}")).into()),
        },
        other => Err(ErrorKind::Decode(format!("expected Move option, got {other}")).into()),
    }
}

/// A vector in the first position. Some views wrap it in a Move option, or
/// return nothing at all when there is nothing to report.
pub fn first_vec<T: DeserializeOwned>(values: &[Value]) -> Result<Vec<T>, Error> {
    let first = match values.first() {
        None => return Ok(vec![]),
        Some(v @ Value::Object(_)) => match move_option(v)? {
            Some(inner) => inner,
            None => return Ok(vec![]),
        },
        Some(v) => v,
    };
    match first {
        Value::Array(_) => Ok(serde_json::from_value(first.clone())?),
        Value::Null => Ok(vec![]),
        other => Err(ErrorKind::Decode(format!("expected vector, got {other}")).into()),
    }
}

/// Serde helper for integer fields in structs returned by view functions
pub fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    u64_from_value(&value).map_err(serde::de::Error::custom)
}

/// Serde helper for optional strings, mapping an empty string or a Move
/// `Option::none` to `None`
pub fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let inner = match &value {
        Value::Object(_) => move_option(&value).map_err(serde::de::Error::custom)?,
        other => Some(other),
    };
    match inner {
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
        _ => Ok(None),
    }
}

/// Serde helper for record ids, which may arrive as strings or numbers
pub fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional() {
        let r = Returns::new(vec![json!("alice"), json!("42"), json!(7), json!(true)]);
        assert_eq!(r.string(0).unwrap(), "alice");
        assert_eq!(r.u64(1).unwrap(), 42);
        assert_eq!(r.u64(2).unwrap(), 7);
        assert!(r.bool(3).unwrap());
        assert!(matches!(r.u64(4).unwrap_err().kind, ErrorKind::Decode(_)));
        assert!(matches!(r.bool(0).unwrap_err().kind, ErrorKind::Decode(_)));
    }

    #[test]
    fn test_move_option() {
        let r = Returns::new(vec![json!({"vec": []}), json!({"vec": ["x"]})]);
        assert_eq!(r.option::<String>(0).unwrap(), None);
        assert_eq!(r.option::<String>(1).unwrap(), Some("x".to_owned()));
    }

    #[test]
    fn test_vec() {
        let r = Returns::new(vec![json!(["0x1", "0x2"])]);
        let v: Vec<Address> = r.vec(0).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1], Address::try_from_chain("0x2").unwrap());
    }

    #[derive(Deserialize)]
    struct Thing {
        #[serde(deserialize_with = "de_u64")]
        n: u64,
        #[serde(default, deserialize_with = "de_opt_string")]
        s: Option<String>,
    }

    #[test]
    fn test_serde_helpers() {
        let t: Thing = serde_json::from_value(json!({"n": "18446744073709551615", "s": ""})).unwrap();
        assert_eq!(t.n, u64::MAX);
        assert_eq!(t.s, None);
        let t: Thing = serde_json::from_value(json!({"n": 3, "s": {"vec": ["bob"]}})).unwrap();
        assert_eq!(t.n, 3);
        assert_eq!(t.s, Some("bob".to_owned()));
        let t: Thing = serde_json::from_value(json!({"n": 3})).unwrap();
        assert_eq!(t.s, None);
    }
}
