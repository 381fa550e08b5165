use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One region as reported by the engine, kept untyped.
///
/// The expected shape is `[quad, [text, confidence, word_box_data?]]`, but
/// nothing is validated here: a malformed entry must still reach the
/// assembler so it can be skipped without losing its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecognition(pub Value);

impl RawRecognition {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawRecognition {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
