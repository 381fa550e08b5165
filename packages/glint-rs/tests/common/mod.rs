//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use glint_rs::prelude::*;
use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::{json, Value};

/// Engine that answers every image with the same canned regions.
pub struct ScriptedEngine {
    pub reply: Vec<Value>,
}

#[async_trait]
impl OcrEngine for ScriptedEngine {
    async fn recognize(&mut self, _image: &[u8]) -> Result<Vec<RawRecognition>, OcrError> {
        Ok(self.reply.iter().cloned().map(RawRecognition::new).collect())
    }
}

/// A "HELLO" region with word-box metadata plus one malformed entry.
pub fn hello_reply() -> Vec<Value> {
    vec![
        json!([
            [[10, 10], [60, 10], [60, 30], [10, 30]],
            ["HELLO", 0.95, [50, [["H", "E", "L", "L", "O"]], [[0, 10, 20, 30, 40]], ["en"]]]
        ]),
        json!([[[0, 0], [1, 0], [1, 1], [0, 1]], ["no confidence"]]),
    ]
}

pub async fn pipeline_with(reply: Vec<Value>) -> Arc<OcrPipeline> {
    let engine = EngineClient::initialize_with(EngineConfig::default(), move |_| async move {
        Ok(Box::new(ScriptedEngine { reply }) as Box<dyn OcrEngine>)
    })
    .await
    .unwrap();
    Arc::new(OcrPipeline::new(Arc::new(engine), VisualizationConfig::default()))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb([250, 250, 250]));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}
