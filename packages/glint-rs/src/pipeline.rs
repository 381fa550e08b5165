//! Load, decode, recognize and assemble one image.
//!
//! Both the server and the batch driver go through [`OcrPipeline`]. Every
//! call returns an [`Envelope`]; faults are classified here and never escape.
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ab_glyph::FontVec;
use image::DynamicImage;

use crate::engine_client::EngineClient;
use crate::envelope::{Envelope, ImageDimensions, TextFinding};
use crate::error_classifier::{classify_error, PipelineError};
use crate::result_assembler::{build_envelope, parse_results};
use crate::visualization::{load_font, save_visualization, VisualizationConfig};

pub struct OcrPipeline {
    engine: Arc<EngineClient>,
    visualization: VisualizationConfig,
    font: Option<Arc<FontVec>>,
}

impl OcrPipeline {
    pub fn new(engine: Arc<EngineClient>, visualization: VisualizationConfig) -> Self {
        let font = load_font(&visualization).map(Arc::new);
        Self {
            engine,
            visualization,
            font,
        }
    }

    pub fn engine(&self) -> &Arc<EngineClient> {
        &self.engine
    }

    /// Processes an image file, optionally saving an overlay to `visualization_target`.
    pub async fn process_path(&self, path: &Path, visualization_target: Option<&Path>) -> Envelope {
        let label = path.display().to_string();
        let started = Instant::now();
        let result = async {
            let bytes = read_image_file(path).await?;
            let (image, bytes) = decode_image(bytes).await?;
            let findings = self.recognize(&bytes).await?;
            let dims = dimensions(&image);
            let visualization_path = match visualization_target {
                Some(target) => self.visualize(image, &findings, target).await,
                None => None,
            };
            Ok::<_, PipelineError>(build_envelope(
                findings,
                started.elapsed(),
                dims,
                visualization_path,
            ))
        }
        .await;
        finish(result, &label)
    }

    /// Processes an in-memory encoded image; `label` stands in for the path in errors.
    pub async fn process_bytes(&self, bytes: Vec<u8>, label: &str) -> Envelope {
        let started = Instant::now();
        let result = async {
            let (image, bytes) = decode_image(bytes).await?;
            let findings = self.recognize(&bytes).await?;
            Ok::<_, PipelineError>(build_envelope(
                findings,
                started.elapsed(),
                dimensions(&image),
                None,
            ))
        }
        .await;
        finish(result, label)
    }

    async fn recognize(&self, bytes: &[u8]) -> Result<Vec<TextFinding>, PipelineError> {
        let raw = self.engine.infer(bytes).await?;
        Ok(parse_results(&raw))
    }

    // A failed overlay is logged and reported as "no visualization"; the findings stand.
    async fn visualize(
        &self,
        image: DynamicImage,
        findings: &[TextFinding],
        target: &Path,
    ) -> Option<String> {
        let config = self.visualization.clone();
        let font = self.font.clone();
        let findings = findings.to_vec();
        let path = target.to_path_buf();
        let saved = tokio::task::spawn_blocking(move || {
            save_visualization(&image, &findings, &config, font.as_deref(), &path)
        })
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r.map_err(anyhow::Error::from));
        match saved {
            Ok(()) => Some(target.display().to_string()),
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "failed to save visualization");
                None
            }
        }
    }
}

fn finish(result: Result<Envelope, PipelineError>, label: &str) -> Envelope {
    match result {
        Ok(envelope) => {
            tracing::info!(
                image = %label,
                regions = envelope.metadata.total_text_regions,
                seconds = envelope.metadata.processing_time,
                "processed image"
            );
            envelope
        }
        Err(e) => {
            tracing::warn!(image = %label, error = %e, "image processing failed");
            classify_error(&e, label)
        }
    }
}

async fn read_image_file(path: &Path) -> Result<Vec<u8>, PipelineError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| file_error(e, path))?;
    if metadata.is_dir() {
        return Err(PipelineError::InvalidImage(format!(
            "{} is a directory",
            path.display()
        )));
    }
    tokio::fs::read(path).await.map_err(|e| file_error(e, path))
}

fn file_error(error: io::Error, path: &Path) -> PipelineError {
    match error.kind() {
        io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied(path.to_path_buf()),
        _ => PipelineError::Io(error),
    }
}

/// Decodes off the async threads; hands the bytes back for the engine.
async fn decode_image(bytes: Vec<u8>) -> Result<(DynamicImage, Vec<u8>), PipelineError> {
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes)
            .map(|image| (image, bytes))
            .map_err(|e| PipelineError::InvalidImage(e.to_string()))
    })
    .await
    .map_err(anyhow::Error::from)??;
    Ok(decoded)
}

fn dimensions(image: &DynamicImage) -> ImageDimensions {
    ImageDimensions {
        width: image.width(),
        height: image.height(),
    }
}
