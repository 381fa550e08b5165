//! The single boundary where pipeline faults become error envelopes.
use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use glint_ocr::OcrError;
use thiserror::Error;

use crate::envelope::{Envelope, ErrorInfo, ErrorKind};

/// Everything that can go wrong while turning one image into findings.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("{0}")]
    InvalidImage(String),
    #[error(transparent)]
    Engine(#[from] OcrError),
    #[error("failed to write visualization: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::FileNotFound(_) => ErrorKind::FileNotFound,
            PipelineError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            PipelineError::InvalidImage(_) => ErrorKind::InvalidImage,
            PipelineError::Engine(OcrError::InvalidInput(_)) => ErrorKind::InvalidImage,
            PipelineError::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ErrorKind::FileNotFound,
                io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::ProcessingError,
            },
            _ => ErrorKind::ProcessingError,
        }
    }

    fn detail(&self) -> String {
        match self {
            PipelineError::Engine(OcrError::InvalidInput(detail)) => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Converts a fault into a complete error envelope for `image_path`.
pub fn classify_error(error: &PipelineError, image_path: &str) -> Envelope {
    let kind = error.kind();
    let message = match kind {
        ErrorKind::FileNotFound => format!("Image file not found: {}", image_path),
        ErrorKind::InvalidImage => format!("Invalid image file {}: {}", image_path, error.detail()),
        ErrorKind::PermissionDenied => format!("Permission denied accessing file: {}", image_path),
        ErrorKind::ProcessingError => {
            format!("OCR processing failed for {}: {}", image_path, error.detail())
        }
    };
    let traceback = match kind {
        ErrorKind::ProcessingError => Some(error_chain(error)),
        _ => None,
    };

    tracing::debug!(?kind, %image_path, error = %error, "classified pipeline error");
    Envelope::failure(ErrorInfo {
        kind,
        message,
        image_path: image_path.to_string(),
        traceback,
    })
}

fn error_chain(error: &dyn StdError) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str("\ncaused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
