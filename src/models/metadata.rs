//! Structured metadata payload attached to entities and relations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A structured, JSON-shaped metadata value.
///
/// Storage backends persist this as a JSON column; the variant set here
/// exists so callers never have to hand a truly dynamic `serde_json::Value`
/// across the public API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Metadata {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean value.
    Bool(bool),
    /// A numeric value.
    Number(f64),
    /// A string value.
    String(String),
    /// An ordered map of string keys to metadata values.
    Object(BTreeMap<String, Metadata>),
    /// An ordered list of metadata values.
    Array(Vec<Metadata>),
}

impl Metadata {
    /// Returns `true` if this is [`Metadata::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Serializes this value to a compact JSON string for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails, which should not happen
    /// for any value constructed through the public API.
    pub fn to_json_string(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::OperationFailed {
            operation: "metadata_serialize".to_string(),
            cause: e.to_string(),
        })
    }

    /// Deserializes a JSON string produced by [`Metadata::to_json_string`].
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid JSON.
    pub fn from_json_string(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Ok(Self::Null);
        }
        serde_json::from_str(s).map_err(|e| crate::Error::OperationFailed {
            operation: "metadata_deserialize".to_string(),
            cause: e.to_string(),
        })
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Object(_) | Self::Array(_) => {
                write!(f, "{}", self.to_json_string().unwrap_or_default())
            }
        }
    }
}

impl From<&str> for Metadata {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for Metadata {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut obj = BTreeMap::new();
        obj.insert("source".to_string(), Metadata::String("import".to_string()));
        obj.insert("weight".to_string(), Metadata::Number(0.8));
        let meta = Metadata::Object(obj);

        let json = meta.to_json_string().expect("serializes");
        let back = Metadata::from_json_string(&json).expect("deserializes");
        assert_eq!(meta, back);
    }

    #[test]
    fn empty_string_is_null() {
        assert_eq!(Metadata::from_json_string("").expect("ok"), Metadata::Null);
    }
}
