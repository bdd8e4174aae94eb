//! Response decoding with a raw-text fallback.
//!
//! # Design
//! The backend answers with JSON most of the time, but error pages, proxies
//! and the odd plain-text endpoint do not. Instead of failing, a body that is
//! not a complete JSON document is kept verbatim as `Decoded::Raw`, and callers
//! branch on the variant instead of trusting untyped data.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A response body: either a parsed JSON document or the exact original text.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Json(Value),
    Raw(String),
}

impl Decoded {
    /// Parse `text` as a whole JSON document, falling back to the raw text.
    ///
    /// Never partially parses: trailing garbage after a valid prefix yields
    /// `Raw` with the untouched input.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Decoded::Json(value),
            Err(_) => Decoded::Raw(text),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Decoded::Json(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Decoded::Json(value) => Some(value),
            Decoded::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Decoded::Json(_) => None,
            Decoded::Raw(text) => Some(text),
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Decoded::Json(value) => Some(value),
            Decoded::Raw(_) => None,
        }
    }

    /// String field of a top-level JSON object, if present.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.as_json()?.get(name)?.as_str()
    }

    /// Deserialize the JSON variant into a typed value.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.as_json()?.clone()).ok()
    }

    /// Compact JSON or the raw text, for printing.
    pub fn to_display_string(&self) -> String {
        match self {
            Decoded::Json(value) => value.to_string(),
            Decoded::Raw(text) => text.clone(),
        }
    }
}

impl From<Value> for Decoded {
    fn from(value: Value) -> Self {
        Decoded::Json(value)
    }
}
