//! Typed records for the JSON result envelope.
//!
//! Everything here is a plain value: findings are built once by the result
//! assembler and serialized once at the boundary, so the field names below
//! are the wire format.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Integer pixel coordinate, serialized as `[x, y]`.
pub type Point = (i64, i64);

/// Four corners in fixed clockwise order starting at the top-left.
///
/// Edges are not assumed to be axis-aligned: rotated regions keep their
/// quad exactly as detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl BoundingBox {
    /// Corner points in drawing order.
    pub fn corners(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }
}

/// A single word inside a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFinding {
    pub word: String,
    /// Copied from the region: the engine has no word-level confidence.
    pub confidence: f64,
    pub coordinates: BoundingBox,
    pub character_positions: Option<Vec<(String, Point)>>,
}

/// The user-facing record for one detected region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFinding {
    pub text: String,
    pub confidence: f64,
    pub coordinates: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual_words: Option<Vec<WordFinding>>,
    /// Engine word-box metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_word_box_data: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub total_characters: usize,
    pub total_words: usize,
    pub longest_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    FileNotFound,
    InvalidImage,
    PermissionDenied,
    ProcessingError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub image_path: String,
    /// Only ever set for [`ErrorKind::ProcessingError`].
    pub traceback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub processing_time: f64,
    pub image_dimensions: ImageDimensions,
    pub total_text_regions: usize,
    #[serde(default)]
    pub has_visualization: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization_path: Option<String>,
    pub timestamp: f64,
    pub success: bool,
    pub error: Option<ErrorInfo>,
    pub confidence_stats: ConfidenceStats,
    pub text_stats: TextStats,
}

/// Top-level result for one image, success or failure alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub findings: Vec<TextFinding>,
    pub metadata: Metadata,
}

impl Envelope {
    /// An envelope with no findings describing a failure.
    pub fn failure(error: ErrorInfo) -> Self {
        Self {
            findings: Vec::new(),
            metadata: Metadata {
                processing_time: 0.0,
                image_dimensions: ImageDimensions::default(),
                total_text_regions: 0,
                has_visualization: false,
                visualization_path: None,
                timestamp: unix_timestamp(),
                success: false,
                error: Some(error),
                confidence_stats: ConfidenceStats::default(),
                text_stats: TextStats::default(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.metadata.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.metadata.error.as_ref().map(|e| e.message.as_str())
    }
}

/// Wall-clock time as fractional seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
