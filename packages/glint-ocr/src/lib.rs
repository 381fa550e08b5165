pub mod engine;
pub mod process;
pub mod recognition;

pub use engine::{EngineConfig, OcrEngine, OcrError, OcrLanguage};
pub use process::{ProcessEngine, ProcessEngineOptions};
pub use recognition::RawRecognition;
