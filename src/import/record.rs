// src/import/record.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parse::{Record, Value};

/// Keys lifted out of the generic row; everything else lands in `additional_info`.
const KNOWN_KEYS: [&str; 3] = ["name", "age", "address"];

/// A user row ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: Option<String>,
    /// `NaN` when the source column held something non-numeric.
    pub age: Option<f64>,
    pub address: Option<Value>,
    pub additional_info: Option<Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record has no name")]
    MissingName,
    #[error("record has no age")]
    MissingAge,
    #[error("record age is not a number")]
    InvalidAge,
}

impl UserRecord {
    /// Shape a generic row into a user record. Never fails; see [`UserRecord::validate`].
    pub fn from_generic(row: &Record) -> Self {
        let part = |path: &str| {
            row.get_path(path)
                .map(Value::to_text)
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        let name = format!("{} {}", part("name.firstName"), part("name.lastName"))
            .trim()
            .to_string();

        let age = row.get("age").and_then(Value::to_number);

        let address = row.get("address").filter(|v| !v.is_null()).cloned();

        let mut rest = row.clone();
        for key in KNOWN_KEYS {
            rest.remove(key);
        }

        UserRecord {
            name: (!name.is_empty()).then_some(name),
            age,
            address,
            additional_info: (!rest.is_empty()).then_some(rest),
        }
    }

    /// Mandatory fields: a non-empty name and a numeric age. Zero is a valid age.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingName);
        }
        match self.age {
            None => Err(ValidationError::MissingAge),
            Some(a) if !a.is_finite() => Err(ValidationError::InvalidAge),
            Some(_) => Ok(()),
        }
    }
}
