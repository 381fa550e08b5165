//! # glint-rs
//!
//! Result synthesis and serving layer around a single OCR engine.
//!
//! ## Features
//!
//! - **Word & Character Geometry**: Reconstruct per-word and per-character boxes from region-level detections
//! - **Result Envelopes**: Deterministic JSON results with confidence and text statistics
//! - **Error Taxonomy**: Every failure becomes a well-formed envelope (`FILE_NOT_FOUND`, `INVALID_IMAGE`, `PERMISSION_DENIED`, `PROCESSING_ERROR`)
//! - **WebSocket Server**: One long-lived engine serving any number of requests, one reply per message
//! - **Batch Processing**: Many images through one engine, with per-image results and a batch summary
//! - **Visualization**: Region and word outlines drawn onto the source image
//!
//! ## Quick Start
//!
//! ```ignore
//! use glint_rs::prelude::*;
//! use std::sync::Arc;
//!
//! let config = GlintConfig::default();
//! let engine = EngineClient::initialize(
//!     config.engine.engine_config(),
//!     &config.engine.process_options(),
//! ).await?;
//! let pipeline = Arc::new(OcrPipeline::new(Arc::new(engine), config.visualization));
//!
//! let envelope = pipeline.process_path("scan.png".as_ref(), None).await;
//! for finding in &envelope.findings {
//!     println!("{} ({:.2})", finding.text, finding.confidence);
//! }
//! ```

pub mod batch_processor;
pub mod config;
pub mod engine_client;
pub mod envelope;
pub mod error_classifier;
pub mod pipeline;
pub mod protocol_server;
pub mod result_assembler;
pub mod visualization;
pub mod word_geometry;

// Re-export commonly used types at the root level
pub use batch_processor::{discover_images, BatchInfo, BatchOptions, BatchProcessor, BatchSummary, ItemResult, SUMMARY_FILE};
pub use config::{load_config, load_or_default, save_config, GlintConfig};
pub use engine_client::EngineClient;
pub use envelope::{
    BoundingBox, ConfidenceStats, Envelope, ErrorInfo, ErrorKind, ImageDimensions, Metadata, TextFinding, TextStats,
    WordFinding,
};
pub use error_classifier::{classify_error, PipelineError};
pub use pipeline::OcrPipeline;
pub use protocol_server::{handle_message, run_session, ProtocolError, Reply, WEBSOCKET_SOURCE};
pub use result_assembler::{build_envelope, parse_results};
pub use visualization::VisualizationConfig;
pub use word_geometry::extract_individual_words;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```ignore
/// use glint_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::protocol_server;
    pub use crate::{
        build_envelope, classify_error, discover_images, extract_individual_words, load_config, load_or_default,
        parse_results, save_config, BatchInfo, BatchOptions, BatchProcessor, BatchSummary, BoundingBox, EngineClient,
        Envelope, ErrorKind, GlintConfig, OcrPipeline, PipelineError, TextFinding, VisualizationConfig, WordFinding,
        SUMMARY_FILE,
    };
    pub use glint_ocr::{EngineConfig, OcrEngine, OcrError, OcrLanguage, RawRecognition};
}
