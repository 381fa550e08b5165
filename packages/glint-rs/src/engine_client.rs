//! Holder for the one long-lived recognition engine.
use std::future::Future;
use std::time::{Duration, Instant};

use glint_ocr::{EngineConfig, OcrEngine, OcrError, ProcessEngine, ProcessEngineOptions, RawRecognition};
use tokio::sync::Mutex;

/// Owns the engine and serializes access to it.
///
/// Create it once at startup and share it behind an `Arc`; every caller goes
/// through [`EngineClient::infer`], so at most one inference runs at a time.
pub struct EngineClient {
    engine: Mutex<Box<dyn OcrEngine>>,
    config: EngineConfig,
    initialization_time: Duration,
}

impl EngineClient {
    /// Starts the external helper described by `options`.
    pub async fn initialize(
        config: EngineConfig,
        options: &ProcessEngineOptions,
    ) -> Result<Self, OcrError> {
        let options = options.clone();
        Self::initialize_with(config, move |config| async move {
            let engine = ProcessEngine::spawn(&options, &config).await?;
            Ok::<_, OcrError>(Box::new(engine) as Box<dyn OcrEngine>)
        })
        .await
    }

    /// Builds the engine through `launch`, timing how long it takes.
    pub async fn initialize_with<F, Fut>(config: EngineConfig, launch: F) -> Result<Self, OcrError>
    where
        F: FnOnce(EngineConfig) -> Fut,
        Fut: Future<Output = Result<Box<dyn OcrEngine>, OcrError>>,
    {
        tracing::info!(
            language = config.language.code(),
            word_breakdown = config.word_breakdown,
            "initializing OCR engine"
        );
        let started = Instant::now();
        let engine = launch(config.clone()).await?;
        let initialization_time = started.elapsed();
        tracing::info!(
            seconds = initialization_time.as_secs_f64(),
            "OCR engine initialized in {:.2}s",
            initialization_time.as_secs_f64()
        );

        Ok(Self {
            engine: Mutex::new(engine),
            config,
            initialization_time,
        })
    }

    /// Runs detection and recognition on one encoded image.
    ///
    /// Callers queue on the engine slot. A failed call leaves the engine usable.
    pub async fn infer(&self, image: &[u8]) -> Result<Vec<RawRecognition>, OcrError> {
        let mut engine = self.engine.lock().await;
        engine.recognize(image).await
    }

    pub fn initialization_time(&self) -> Duration {
        self.initialization_time
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lets the engine release its external resources.
    pub async fn shutdown(&self) -> Result<(), OcrError> {
        let mut engine = self.engine.lock().await;
        engine.shutdown().await?;
        tracing::info!("OCR engine shut down");
        Ok(())
    }
}
