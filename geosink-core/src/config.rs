//! Untyped configuration blocks with typed accessors.
//!
//! Consumer configuration arrives as a loosely typed mapping, usually one
//! entry of a JSON document. [`ConfigDict`] keeps the raw values and offers
//! accessors that distinguish a missing key from a value of the wrong type,
//! so callers can report either precisely. A JSON `null` counts as missing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by [`ConfigDict`] accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required key was absent.
    #[error("config key {key:?} is required")]
    KeyMissing {
        /// Name of the missing key.
        key: String,
    },
    /// A key held a value of the wrong type.
    #[error("config key {key:?} must be {expected}")]
    KeyType {
        /// Name of the offending key.
        key: String,
        /// Description of the accepted type.
        expected: &'static str,
    },
}

impl ConfigError {
    fn missing(key: &str) -> Self {
        Self::KeyMissing {
            key: key.to_owned(),
        }
    }

    fn wrong_type(key: &str, expected: &'static str) -> Self {
        Self::KeyType {
            key: key.to_owned(),
            expected,
        }
    }
}

/// A single configuration block.
///
/// # Examples
///
/// ```
/// use geosink_core::ConfigDict;
/// use serde_json::json;
///
/// let block = ConfigDict::try_from(json!({ "name": "edits", "port": 6432 })).unwrap();
/// assert_eq!(block.string("name").unwrap(), "edits");
/// assert_eq!(block.u64_or("port", 5432).unwrap(), 6432);
/// assert_eq!(block.u64_or("max_connections", 100).unwrap(), 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDict(Map<String, Value>);

impl ConfigDict {
    /// Create an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, returning the updated block.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value for `key`, treating `null` as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// Whether `key` holds a non-null value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Required string value.
    pub fn string(&self, key: &str) -> Result<&str, ConfigError> {
        self.opt_string(key)?
            .ok_or_else(|| ConfigError::missing(key))
    }

    /// Optional string value.
    pub fn opt_string(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        self.get(key)
            .map(|value| {
                value
                    .as_str()
                    .ok_or_else(|| ConfigError::wrong_type(key, "a string"))
            })
            .transpose()
    }

    /// Optional non-negative integer, falling back to `default` when absent.
    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        self.get(key).map_or(Ok(default), |value| {
            value
                .as_u64()
                .ok_or_else(|| ConfigError::wrong_type(key, "a non-negative integer"))
        })
    }

    /// Required sequence of nested blocks.
    pub fn dict_slice(&self, key: &str) -> Result<Vec<Self>, ConfigError> {
        let value = self.get(key).ok_or_else(|| ConfigError::missing(key))?;
        let items = value
            .as_array()
            .ok_or_else(|| ConfigError::wrong_type(key, "a list of tables"))?;
        items
            .iter()
            .map(|item| {
                item.as_object()
                    .cloned()
                    .map(Self)
                    .ok_or_else(|| ConfigError::wrong_type(key, "a list of tables"))
            })
            .collect()
    }
}

impl From<Map<String, Value>> for ConfigDict {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ConfigDict {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ConfigError::wrong_type("<root>", "a table")),
        }
    }
}
