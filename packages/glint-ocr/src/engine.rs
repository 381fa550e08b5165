use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::RawRecognition;

/// Languages understood by the recognition helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrLanguage {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ch")]
    Chinese,
    #[serde(rename = "japan")]
    Japanese,
    #[serde(rename = "korean")]
    Korean,
    #[serde(rename = "multi")]
    Multilingual,
}

impl OcrLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            OcrLanguage::English => "en",
            OcrLanguage::Chinese => "ch",
            OcrLanguage::Japanese => "japan",
            OcrLanguage::Korean => "korean",
            OcrLanguage::Multilingual => "multi",
        }
    }
}

/// Settings fixed for the whole lifetime of an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub language: OcrLanguage,
    /// Ask the engine for per-character positions so words can be boxed.
    pub word_breakdown: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: OcrLanguage::English,
            word_breakdown: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("engine failed to start: {0}")]
    Startup(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("engine error: {0}")]
    EngineError(String),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A detection + recognition backend.
///
/// Implementations are not assumed to be reentrant, hence `&mut self`:
/// callers sharing one engine must serialize access themselves.
#[async_trait]
pub trait OcrEngine: Send {
    /// Runs detection and recognition over one encoded image and returns the
    /// regions in the order the engine emitted them.
    async fn recognize(&mut self, image: &[u8]) -> Result<Vec<RawRecognition>, OcrError>;

    /// Releases external resources held by the engine.
    async fn shutdown(&mut self) -> Result<(), OcrError> {
        Ok(())
    }
}
