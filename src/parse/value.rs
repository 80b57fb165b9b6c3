// src/parse/value.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Optional minus, ASCII digits, optional fraction.
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("numeric pattern should compile"));

/// A typed cell, or a nested mapping built from dotted headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Object(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(rec) => Some(rec),
            _ => None,
        }
    }

    /// Numeric coercion. Strings go through `f64` parsing; a failure is `NaN`,
    /// objects are always `NaN`, and null has no numeric value at all.
    ///
    /// Accepted string forms are decimal and exponent notation plus `inf`,
    /// `infinity` and `nan` in any case. Hex such as `0x10` is `NaN`.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
            Value::Object(_) => Some(f64::NAN),
        }
    }

    /// Scalar text form; null and nested objects render as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null | Value::Object(_) => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

/// Converts one raw field into a [`Value`].
///
/// The field is trimmed first; blank text is null, text matching the numeric
/// pattern becomes an integer (no dot) or a float (with dot), and anything
/// else is kept as the trimmed string.
pub fn parse_value(raw: &str) -> Value {
    let t = raw.trim();
    if t.is_empty() {
        return Value::Null;
    }

    if NUMERIC.is_match(t) {
        if !t.contains('.') {
            // out of i64 range still reads as a number
            return match t.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => t.parse::<f64>().map_or_else(|_| Value::Str(t.to_string()), Value::Float),
            };
        }
        if let Ok(f) = t.parse::<f64>() {
            return Value::Float(f);
        }
    }

    Value::Str(t.to_string())
}

/// A generic row: string keys to values, nested through dotted headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Follow a dotted path through nested objects.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut cur = self.fields.get(first)?;
        for part in parts {
            cur = cur.as_object()?.fields.get(part)?;
        }
        Some(cur)
    }

    /// Write `value` at a dotted path, creating intermediate objects.
    ///
    /// An intermediate segment that currently holds a scalar (or null) is
    /// replaced by a fresh empty object, dropping the scalar. Writing a scalar
    /// onto a key that holds an object likewise replaces the whole object.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let mut parts: Vec<&str> = path.split('.').collect();
        // split always yields at least one segment
        let last = parts.pop().unwrap_or_default();

        let mut cur = self;
        for part in parts {
            let slot = cur
                .fields
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Record::new()));
            if !matches!(slot, Value::Object(_)) {
                *slot = Value::Object(Record::new());
            }
            cur = match slot {
                Value::Object(rec) => rec,
                _ => unreachable!("slot was just made an object"),
            };
        }
        cur.fields.insert(last.to_string(), value);
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_rules() {
        assert_eq!(parse_value(""), Value::Null);
        assert_eq!(parse_value("   "), Value::Null);
        assert_eq!(parse_value("42"), Value::Int(42));
        assert_eq!(parse_value("3.14"), Value::Float(3.14));
        assert_eq!(parse_value("-5"), Value::Int(-5));
        assert_eq!(parse_value("abc"), Value::Str("abc".into()));
        assert_eq!(parse_value("12abc"), Value::Str("12abc".into()));
    }

    #[test]
    fn test_parse_value_keeps_trimmed_text() {
        assert_eq!(parse_value("  Main St  "), Value::Str("Main St".into()));
        assert_eq!(parse_value(" 7 "), Value::Int(7));
    }

    #[test]
    fn test_parse_value_non_numeric_shapes() {
        // leading dot, trailing dot, plus sign and exponents all fail the pattern
        assert_eq!(parse_value(".5"), Value::Str(".5".into()));
        assert_eq!(parse_value("5."), Value::Str("5.".into()));
        assert_eq!(parse_value("+5"), Value::Str("+5".into()));
        assert_eq!(parse_value("1e3"), Value::Str("1e3".into()));
        assert_eq!(parse_value("١٢"), Value::Str("١٢".into()));
    }

    #[test]
    fn test_parse_value_integer_overflow_is_float() {
        assert_eq!(
            parse_value("99999999999999999999"),
            Value::Float(99999999999999999999.0)
        );
    }

    #[test]
    fn test_set_path_builds_nested_objects() {
        let mut rec = Record::new();
        rec.set_path("name.firstName", Value::Str("Jo".into()));
        rec.set_path("name.lastName", Value::Str("Doe".into()));

        let name = rec.get("name").and_then(Value::as_object).unwrap();
        assert_eq!(name.len(), 2);
        assert_eq!(rec.get_path("name.firstName"), Some(&Value::Str("Jo".into())));
        assert_eq!(rec.get_path("name.lastName"), Some(&Value::Str("Doe".into())));
    }

    #[test]
    fn test_set_path_overwrites_scalar_intermediate() {
        let mut rec = Record::new();
        rec.set_path("a", Value::Int(1));
        rec.set_path("a.b", Value::Int(2));
        assert_eq!(rec.get_path("a.b"), Some(&Value::Int(2)));
        assert_eq!(rec.get("a").and_then(Value::as_object).map(Record::len), Some(1));

        // null intermediates are replaced too
        rec.set_path("n", Value::Null);
        rec.set_path("n.x.y", Value::Str("deep".into()));
        assert_eq!(rec.get_path("n.x.y"), Some(&Value::Str("deep".into())));
    }

    #[test]
    fn test_set_path_scalar_replaces_object() {
        let mut rec = Record::new();
        rec.set_path("a.b", Value::Int(2));
        rec.set_path("a", Value::Str("flat".into()));
        assert_eq!(rec.get("a"), Some(&Value::Str("flat".into())));
        assert_eq!(rec.get_path("a.b"), None);
    }

    #[test]
    fn test_record_serializes_as_plain_json() {
        let mut rec = Record::new();
        rec.set_path("address.city", Value::Str("Pune".into()));
        rec.set_path("address.zip", Value::Int(411001));
        rec.set_path("score", Value::Float(9.5));
        rec.set_path("note", Value::Null);

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "address": { "city": "Pune", "zip": 411001 },
                "note": null,
                "score": 9.5
            })
        );
    }

    #[test]
    fn test_to_number_coercion() {
        assert_eq!(Value::Int(30).to_number(), Some(30.0));
        assert_eq!(Value::Str("1e3".into()).to_number(), Some(1000.0));
        assert!(Value::Str("old".into()).to_number().unwrap().is_nan());
        assert_eq!(Value::Null.to_number(), None);
        assert!(Value::Str("0x10".into()).to_number().unwrap().is_nan());
        assert_eq!(Value::Str("-inf".into()).to_number(), Some(f64::NEG_INFINITY));
    }
}
