//! Box overlays for batch output.
//!
//! Region and word quads are always outlined. Text labels need a TrueType
//! font (`font_path`); without one they are left out.
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::envelope::{BoundingBox, TextFinding};
use crate::error_classifier::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub bbox_color: [u8; 3],
    pub word_color: [u8; 3],
    pub thickness: u32,
    /// Also outline the reconstructed word boxes.
    pub show_words: bool,
    /// TrueType/OpenType font used for labels.
    pub font_path: Option<PathBuf>,
    /// Label height in pixels.
    pub font_scale: u32,
    pub text_color: [u8; 3],
    pub show_text: bool,
    pub show_confidence: bool,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            bbox_color: [0, 255, 0],
            word_color: [0, 0, 255],
            thickness: 2,
            show_words: false,
            font_path: None,
            font_scale: 16,
            text_color: [0, 0, 255],
            show_text: true,
            show_confidence: true,
        }
    }
}

/// Loads the label font named by `config.font_path`.
///
/// Returns `None` when no font is configured or it cannot be read, in which
/// case overlays are drawn without labels.
pub fn load_font(config: &VisualizationConfig) -> Option<FontVec> {
    let path = config.font_path.as_ref()?;
    let loaded = std::fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|data| FontVec::try_from_vec(data).map_err(|e| e.to_string()));
    match loaded {
        Ok(font) => {
            tracing::debug!(path = %path.display(), "loaded label font");
            Some(font)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot load label font, labels disabled");
            None
        }
    }
}

/// Returns an RGB copy of `image` with every finding outlined, and labelled
/// when `font` is given.
pub fn draw_findings(
    image: &DynamicImage,
    findings: &[TextFinding],
    config: &VisualizationConfig,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for finding in findings {
        draw_quad(&mut canvas, &finding.coordinates, Rgb(config.bbox_color), config.thickness);
        if config.show_words {
            for word in finding.individual_words.iter().flatten() {
                draw_quad(&mut canvas, &word.coordinates, Rgb(config.word_color), 1);
            }
        }
        if let Some(font) = font {
            draw_label(&mut canvas, finding, config, font);
        }
    }
    canvas
}

/// Draws the findings and writes the result as PNG to `path`.
pub fn save_visualization(
    image: &DynamicImage,
    findings: &[TextFinding],
    config: &VisualizationConfig,
    font: Option<&FontVec>,
    path: &Path,
) -> Result<(), PipelineError> {
    let canvas = draw_findings(image, findings, config, font);
    canvas.save_with_format(path, ImageFormat::Png)?;
    tracing::debug!(path = %path.display(), regions = findings.len(), "visualization saved");
    Ok(())
}

fn label_for(finding: &TextFinding, config: &VisualizationConfig) -> Option<String> {
    let mut parts = Vec::with_capacity(2);
    if config.show_text {
        parts.push(finding.text.clone());
    }
    if config.show_confidence {
        parts.push(format!("({:.2})", finding.confidence));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

// Label sits on a white plate just above the region's top-left corner.
fn draw_label(canvas: &mut RgbImage, finding: &TextFinding, config: &VisualizationConfig, font: &FontVec) {
    let Some(label) = label_for(finding, config) else {
        return;
    };
    let scale = PxScale::from(config.font_scale.max(1) as f32);
    let (width, height) = text_size(scale, font, &label);
    if width == 0 || height == 0 {
        return;
    }
    let (left, top) = finding.coordinates.top_left;
    let x = left.clamp(0, i32::MAX as i64) as i32;
    let y = (top - height as i64).clamp(0, i32::MAX as i64) as i32;

    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(width, height), Rgb([255, 255, 255]));
    draw_text_mut(canvas, Rgb(config.text_color), x, y, scale, font, &label);
}

// Closed polyline; thickness is approximated by parallel offset segments.
fn draw_quad(canvas: &mut RgbImage, quad: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let corners = quad.corners();
    let thickness = thickness.max(1) as i64;
    let low = -(thickness - 1) / 2;
    let high = low + thickness;
    for i in 0..corners.len() {
        let (x0, y0) = corners[i];
        let (x1, y1) = corners[(i + 1) % corners.len()];
        for offset in low..high {
            let shift = offset as f32;
            draw_line_segment_mut(
                canvas,
                (x0 as f32 + shift, y0 as f32),
                (x1 as f32 + shift, y1 as f32),
                color,
            );
            draw_line_segment_mut(
                canvas,
                (x0 as f32, y0 as f32 + shift),
                (x1 as f32, y1 as f32 + shift),
                color,
            );
        }
    }
}
