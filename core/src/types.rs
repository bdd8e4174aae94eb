//! Domain DTOs for the fraud-analysis API.
//!
//! # Design
//! The analysis endpoints accept arbitrary feature maps, so request payloads
//! stay as JSON objects. Only the health response has a fixed shape worth a
//! typed view; everything else is surfaced as `Decoded`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decode::Decoded;

/// Free-form feature map posted to the analysis endpoints.
pub type FeatureMap = Map<String, Value>;

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub message: String,
}

impl HealthStatus {
    /// Typed view of a health payload. `None` for raw text or other shapes.
    pub fn from_decoded(decoded: &Decoded) -> Option<Self> {
        decoded.to_typed()
    }
}

/// Sample mouse features used by the probe and the backend test widget.
pub fn sample_mouse_features() -> FeatureMap {
    let mut map = FeatureMap::new();
    map.insert("x".to_string(), Value::from(0.1));
    map.insert("y".to_string(), Value::from(0.2));
    map.insert("dx".to_string(), Value::from(1.0));
    map.insert("dy".to_string(), Value::from(0.5));
    map
}
