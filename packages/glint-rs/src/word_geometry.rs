//! Word and character boxes reconstructed from region-level detections.
//!
//! The engine reports one quad per region plus, optionally, word-box
//! metadata of the form
//! `[total_width, [[chars of word 1], ...], [[positions of word 1], ...], [lang tags]?]`
//! where positions are relative offsets inside the recognized text line.
//! Positions are mapped linearly onto the region's horizontal extent and every
//! word gets the full region height. Rotation is discarded by taking the
//! axis-aligned extent of the quad; this is an approximation and is kept
//! exactly as is because consumers depend on it.
use serde_json::Value;

use crate::envelope::{BoundingBox, Point, WordFinding};

/// Region quad as reported by the engine, in corner order.
pub type Quad = [(f64, f64); 4];

/// Axis-aligned extent `(x1, y1, x2, y2)` of a quad.
pub fn region_extent(quad: &Quad) -> (f64, f64, f64, f64) {
    let mut x1 = f64::INFINITY;
    let mut y1 = f64::INFINITY;
    let mut x2 = f64::NEG_INFINITY;
    let mut y2 = f64::NEG_INFINITY;
    for &(x, y) in quad {
        x1 = x1.min(x);
        y1 = y1.min(y);
        x2 = x2.max(x);
        y2 = y2.max(y);
    }
    (x1, y1, x2, y2)
}

/// Converts a float coordinate to a pixel, truncating toward zero.
pub fn to_pixel(value: f64) -> i64 {
    value as i64
}

/// Builds per-word findings for one region.
///
/// Returns `None` when the metadata is absent, malformed, shorter than three
/// elements, or yields no usable word. That means "no breakdown available",
/// never a failure of the region itself.
pub fn extract_individual_words(
    word_box_data: &Value,
    quad: &Quad,
    confidence: f64,
) -> Option<Vec<WordFinding>> {
    let items = word_box_data.as_array()?;
    if items.len() < 3 {
        return None;
    }

    let total_width = items[0].as_f64()?;
    let word_chars = items[1].as_array()?;
    let word_positions = items[2].as_array()?;
    if word_chars.is_empty() || word_positions.is_empty() {
        return None;
    }
    if !(total_width > 0.0) {
        tracing::debug!(total_width, "word box data has no usable width");
        return None;
    }

    let (x1, y1, x2, y2) = region_extent(quad);
    let region_width = x2 - x1;
    let x_at = |position: f64| x1 + (position / total_width) * region_width;
    let center_y = (y1 + y2) / 2.0;

    let mut words = Vec::new();
    for (index, (chars, positions)) in word_chars.iter().zip(word_positions).enumerate() {
        let (Some(chars), Some(positions)) = (characters(chars), numbers(positions)) else {
            tracing::debug!(index, "skipping word with unreadable metadata");
            continue;
        };
        if chars.is_empty() || chars.len() != positions.len() {
            tracing::debug!(
                index,
                chars = chars.len(),
                positions = positions.len(),
                "skipping word with mismatched metadata"
            );
            continue;
        }

        let start = positions.iter().copied().fold(f64::INFINITY, f64::min);
        let end = positions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let start_x = to_pixel(x_at(start));
        let end_x = to_pixel(x_at(end));

        let coordinates = BoundingBox {
            top_left: (start_x, to_pixel(y1)),
            top_right: (end_x, to_pixel(y1)),
            bottom_right: (end_x, to_pixel(y2)),
            bottom_left: (start_x, to_pixel(y2)),
        };

        let word = chars.concat();
        let character_positions: Vec<(String, Point)> = chars
            .into_iter()
            .zip(positions)
            .map(|(ch, position)| (ch, (to_pixel(x_at(position)), to_pixel(center_y))))
            .collect();

        words.push(WordFinding {
            word,
            confidence,
            coordinates,
            character_positions: Some(character_positions),
        });
    }

    if words.is_empty() {
        None
    } else {
        Some(words)
    }
}

/// Characters of one word: either a list of strings or a plain string.
fn characters(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(s.chars().map(String::from).collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn numbers(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}
