//! Batch driver: many files, one engine.
//!
//! Every input is processed in order with the already-initialized engine.
//! Per-file results go to `<stem>_result.json` (plus `<stem>_result.png`
//! when visualization is on) and a `batch_summary.json` is written at the
//! end. The one-time engine start-up cost is reported separately from the
//! time spent on the batch itself.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::pipeline::OcrPipeline;

/// Extensions picked up when scanning an input directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

pub const SUMMARY_FILE: &str = "batch_summary.json";

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub visualize: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            visualize: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchInfo {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    pub total_processing_time: f64,
    pub model_loading_time: f64,
    pub average_per_image: f64,
}

/// Outcome for one input path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub image_path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_regions_found: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_image: Option<String>,
}

impl ItemResult {
    fn failed(image_path: String, error: impl Into<String>, processing_time: f64) -> Self {
        Self {
            image_path,
            success: false,
            text_regions_found: None,
            error: Some(error.into()),
            processing_time,
            output_json: None,
            output_image: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_info: BatchInfo,
    pub individual_results: Vec<ItemResult>,
}

impl BatchSummary {
    /// Share of the overall cost that went into starting the engine once.
    ///
    /// Only meaningful when more than one image was submitted.
    pub fn efficiency(&self) -> Option<f64> {
        let info = &self.batch_info;
        if info.total_images > 1 && info.total_processing_time > 0.0 {
            Some(info.model_loading_time / info.total_processing_time)
        } else {
            None
        }
    }
}

pub struct BatchProcessor {
    pipeline: Arc<OcrPipeline>,
    options: BatchOptions,
}

impl BatchProcessor {
    pub fn new(pipeline: Arc<OcrPipeline>, options: BatchOptions) -> Self {
        Self { pipeline, options }
    }

    /// Processes `paths` in order and writes all artifacts.
    ///
    /// Individual failures are recorded in the summary; only problems with
    /// the output directory itself abort the batch.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<BatchSummary> {
        let output_dir = &self.options.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

        let mut summary = BatchSummary {
            batch_info: BatchInfo {
                total_images: paths.len(),
                model_loading_time: self.pipeline.engine().initialization_time().as_secs_f64(),
                ..Default::default()
            },
            individual_results: Vec::with_capacity(paths.len()),
        };
        tracing::info!(images = paths.len(), "starting batch");

        let batch_start = Instant::now();
        for (index, path) in paths.iter().enumerate() {
            tracing::info!(
                "processing image {}/{}: {}",
                index + 1,
                paths.len(),
                path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
            let item = self.process_one(path).await;
            if item.success {
                summary.batch_info.processed_images += 1;
            } else {
                summary.batch_info.failed_images += 1;
            }
            summary.individual_results.push(item);
        }

        let total = batch_start.elapsed().as_secs_f64();
        summary.batch_info.total_processing_time = total;
        if summary.batch_info.processed_images > 0 {
            summary.batch_info.average_per_image = total / paths.len() as f64;
        }

        let info = &summary.batch_info;
        tracing::info!(
            total = info.total_images,
            processed = info.processed_images,
            failed = info.failed_images,
            model_loading_time = info.model_loading_time,
            total_processing_time = info.total_processing_time,
            average_per_image = info.average_per_image,
            "batch complete"
        );
        if let Some(efficiency) = summary.efficiency() {
            tracing::info!(
                "engine start-up was {:.1}% of batch time, paid once",
                efficiency * 100.0
            );
        }

        let summary_path = output_dir.join(SUMMARY_FILE);
        write_json(&summary_path, &summary).await?;
        tracing::info!(path = %summary_path.display(), "batch summary saved");

        Ok(summary)
    }

    async fn process_one(&self, path: &Path) -> ItemResult {
        let image_path = path.display().to_string();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::warn!(path = %image_path, "file not found");
            return ItemResult::failed(image_path, "File not found", 0.0);
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let json_path = self.options.output_dir.join(format!("{}_result.json", stem));
        let image_target = self
            .options
            .visualize
            .then(|| self.options.output_dir.join(format!("{}_result.png", stem)));

        let started = Instant::now();
        let envelope = self
            .pipeline
            .process_path(path, image_target.as_deref())
            .await;

        if let Err(e) = write_json(&json_path, &envelope).await {
            tracing::warn!(path = %image_path, error = %e, "failed to save result");
            return ItemResult::failed(image_path, format!("{:#}", e), started.elapsed().as_secs_f64());
        }
        let processing_time = started.elapsed().as_secs_f64();

        if envelope.is_success() {
            tracing::info!(
                "success: {} text regions found in {:.2}s",
                envelope.metadata.total_text_regions,
                processing_time
            );
            ItemResult {
                image_path,
                success: true,
                text_regions_found: Some(envelope.metadata.total_text_regions),
                error: None,
                processing_time,
                output_json: Some(json_path.display().to_string()),
                output_image: envelope.metadata.visualization_path.clone(),
            }
        } else {
            let message = envelope.error_message().unwrap_or("unknown error").to_string();
            tracing::warn!(path = %image_path, "processing failed: {}", message);
            ItemResult::failed(image_path, message, processing_time)
        }
    }
}

/// Image files directly inside `dir`, sorted by path.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read input directory {}", dir.display()))?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort();
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discover_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.tif", "d.jpeg.bak"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let found: Vec<String> = discover_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(found, vec!["a.jpg", "b.PNG", "c.tif"]);
    }

    #[test]
    fn test_efficiency_needs_more_than_one_image() {
        let mut summary = BatchSummary::default();
        summary.batch_info.total_images = 1;
        summary.batch_info.model_loading_time = 2.0;
        summary.batch_info.total_processing_time = 4.0;
        assert_eq!(summary.efficiency(), None);

        summary.batch_info.total_images = 3;
        assert_eq!(summary.efficiency(), Some(0.5));
    }

    #[test]
    fn test_failed_item_wire_format() {
        let item = ItemResult::failed("input/9.png".into(), "File not found", 0.0);
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "image_path": "input/9.png",
                "success": false,
                "error": "File not found",
                "processing_time": 0.0
            })
        );
    }
}
