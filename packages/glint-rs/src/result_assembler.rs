//! Turns raw engine output into findings, statistics and the result envelope.
use std::time::Duration;

use glint_ocr::RawRecognition;
use serde_json::Value;
use thiserror::Error;

use crate::envelope::{
    unix_timestamp, BoundingBox, ConfidenceStats, Envelope, ImageDimensions, Metadata, TextFinding,
    TextStats,
};
use crate::word_geometry::{extract_individual_words, to_pixel, Quad};

/// Why a single raw region could not be turned into a finding.
#[derive(Debug, Error, PartialEq)]
pub enum RegionError {
    #[error("expected [quad, [text, confidence, word_box_data?]]")]
    Shape,
    #[error("recognition tuple has {0} elements, expected 2 or 3")]
    Arity(usize),
    #[error("quad must contain four [x, y] points")]
    Quad,
    #[error("text is not a string")]
    Text,
    #[error("confidence is not a finite number")]
    Confidence,
}

/// Parses one raw region into a finding.
pub fn parse_recognition(raw: &RawRecognition) -> Result<TextFinding, RegionError> {
    let entry = raw.as_value().as_array().ok_or(RegionError::Shape)?;
    if entry.len() < 2 {
        return Err(RegionError::Shape);
    }

    let quad = parse_quad(&entry[0])?;
    let body = entry[1].as_array().ok_or(RegionError::Shape)?;
    let (text, confidence, word_box_data) = match body.as_slice() {
        [text, confidence, word_box_data] => (text, confidence, Some(word_box_data)),
        [text, confidence] => (text, confidence, None),
        other => return Err(RegionError::Arity(other.len())),
    };

    let text = text.as_str().ok_or(RegionError::Text)?.trim().to_string();
    let confidence = coerce_confidence(confidence)?;

    let word_box_data = word_box_data.filter(|data| !data.is_null());
    let individual_words =
        word_box_data.and_then(|data| extract_individual_words(data, &quad, confidence));
    let raw_word_box_data = word_box_data.filter(|data| is_present(data)).cloned();

    Ok(TextFinding {
        text,
        confidence,
        coordinates: BoundingBox {
            top_left: (to_pixel(quad[0].0), to_pixel(quad[0].1)),
            top_right: (to_pixel(quad[1].0), to_pixel(quad[1].1)),
            bottom_right: (to_pixel(quad[2].0), to_pixel(quad[2].1)),
            bottom_left: (to_pixel(quad[3].0), to_pixel(quad[3].1)),
        },
        individual_words,
        raw_word_box_data,
    })
}

/// Parses every raw region, skipping the malformed ones.
///
/// Output order is the engine's emission order.
pub fn parse_results(raw: &[RawRecognition]) -> Vec<TextFinding> {
    let mut findings = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        match parse_recognition(entry) {
            Ok(finding) => {
                tracing::debug!(
                    index,
                    text = %finding.text,
                    confidence = finding.confidence,
                    "parsed region"
                );
                findings.push(finding);
            }
            Err(e) => {
                tracing::warn!(index, error = %e, raw = %entry.as_value(), "skipping malformed region");
            }
        }
    }
    tracing::debug!(parsed = findings.len(), total = raw.len(), "regions parsed");
    findings
}

/// Wraps findings into a successful envelope with aggregate statistics.
pub fn build_envelope(
    findings: Vec<TextFinding>,
    processing_time: Duration,
    image_dimensions: ImageDimensions,
    visualization_path: Option<String>,
) -> Envelope {
    let confidence_stats = confidence_stats(&findings);
    let text_stats = text_stats(&findings);
    Envelope {
        metadata: Metadata {
            processing_time: processing_time.as_secs_f64(),
            image_dimensions,
            total_text_regions: findings.len(),
            has_visualization: visualization_path.is_some(),
            visualization_path,
            timestamp: unix_timestamp(),
            success: true,
            error: None,
            confidence_stats,
            text_stats,
        },
        findings,
    }
}

/// Average, minimum and maximum confidence; all zero when there are no findings.
pub fn confidence_stats(findings: &[TextFinding]) -> ConfidenceStats {
    if findings.is_empty() {
        return ConfidenceStats::default();
    }
    let mut sum = 0.0;
    let mut minimum = f64::INFINITY;
    let mut maximum = f64::NEG_INFINITY;
    for finding in findings {
        sum += finding.confidence;
        minimum = minimum.min(finding.confidence);
        maximum = maximum.max(finding.confidence);
    }
    ConfidenceStats {
        average: sum / findings.len() as f64,
        minimum,
        maximum,
    }
}

/// Character and word totals plus the longest text (first one wins ties).
pub fn text_stats(findings: &[TextFinding]) -> TextStats {
    let mut stats = TextStats::default();
    let mut longest = 0;
    let mut longest_text: Option<&str> = None;
    for finding in findings {
        let chars = finding.text.chars().count();
        stats.total_characters += chars;
        stats.total_words += finding.text.split_whitespace().count();
        if longest_text.is_none() || chars > longest {
            longest = chars;
            longest_text = Some(finding.text.as_str());
        }
    }
    stats.longest_text = longest_text.unwrap_or_default().to_string();
    stats
}

fn parse_quad(value: &Value) -> Result<Quad, RegionError> {
    let points = value.as_array().ok_or(RegionError::Quad)?;
    if points.len() < 4 {
        return Err(RegionError::Quad);
    }
    let mut quad = [(0.0, 0.0); 4];
    for (slot, point) in quad.iter_mut().zip(points) {
        let xy = point.as_array().ok_or(RegionError::Quad)?;
        match (xy.first().and_then(number), xy.get(1).and_then(number)) {
            (Some(x), Some(y)) => *slot = (x, y),
            _ => return Err(RegionError::Quad),
        }
    }
    Ok(quad)
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn coerce_confidence(value: &Value) -> Result<f64, RegionError> {
    number(value)
        .map(|c| c.clamp(0.0, 1.0))
        .ok_or(RegionError::Confidence)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(_) => true,
    }
}
