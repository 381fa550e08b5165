//! Engine backed by an external helper process.
//!
//! The helper hosts the actual detection/recognition models and talks to us
//! over stdin/stdout, one JSON document per line:
//!
//! 1. we send `{"lang": "en", "return_word_box": true}`
//! 2. the helper loads its models and answers `{"ready": true}`
//!    (or `{"error": "..."}`)
//! 3. for every image we send `{"id": 1, "image": "<base64>"}` and read back
//!    `{"id": 1, "result": [...]}` where `result` is the array of raw
//!    recognitions or `null` for "no text", or `{"id": 1, "error": "..."}`.
//!
//! Lines that are not JSON objects, or that carry another request's id, are
//! logged and skipped, so stray output from the helper cannot shift replies
//! onto the wrong image.

use std::process::Stdio;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::engine::{EngineConfig, OcrEngine, OcrError};
use crate::recognition::RawRecognition;

/// How to launch the helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEngineOptions {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ProcessEngineOptions {
    fn default() -> Self {
        Self {
            program: "glint-paddle-helper".to_string(),
            args: Vec::new(),
        }
    }
}

pub struct ProcessEngine {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl ProcessEngine {
    /// Launches the helper and waits until it reports its models are loaded.
    pub async fn spawn(
        options: &ProcessEngineOptions,
        config: &EngineConfig,
    ) -> Result<Self, OcrError> {
        let mut child = Command::new(&options.program)
            .args(&options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::Startup(format!("failed to launch {}: {}", options.program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Startup("helper stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OcrError::Startup("helper stdout unavailable".into()))?;

        let mut engine = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
        };

        let handshake = json!({
            "lang": config.language.code(),
            "return_word_box": config.word_breakdown,
        });
        engine
            .send_line(&handshake)
            .await
            .map_err(|e| OcrError::Startup(e.to_string()))?;
        let reply = engine
            .read_reply(None)
            .await
            .map_err(|e| OcrError::Startup(e.to_string()))?;
        parse_ready(&reply)?;

        tracing::debug!(program = %options.program, "recognition helper ready");
        Ok(engine)
    }

    async fn send_line(&mut self, value: &Value) -> Result<(), OcrError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| OcrError::EngineError("engine has been shut down".into()))?;
        let mut line =
            serde_json::to_string(value).map_err(|e| OcrError::Protocol(e.to_string()))?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Reads until a JSON object arrives whose `id` matches `expected`.
    ///
    /// With `expected` unset (the handshake) any object is accepted.
    async fn read_reply(&mut self, expected: Option<u64>) -> Result<Value, OcrError> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| OcrError::Protocol("helper closed its output".into()))?;
            let reply = match serde_json::from_str::<Value>(&line) {
                Ok(reply @ Value::Object(_)) => reply,
                Ok(_) | Err(_) => {
                    tracing::debug!(line = %line, "skipping non-reply line from helper");
                    continue;
                }
            };
            match expected {
                Some(id) if reply.get("id").and_then(Value::as_u64) != Some(id) => {
                    tracing::warn!(expected = id, reply = %reply, "skipping reply for another request");
                }
                _ => return Ok(reply),
            }
        }
    }
}

#[async_trait]
impl OcrEngine for ProcessEngine {
    async fn recognize(&mut self, image: &[u8]) -> Result<Vec<RawRecognition>, OcrError> {
        if image.is_empty() {
            return Err(OcrError::InvalidInput("empty image".into()));
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.next_id += 1;
        let id = self.next_id;
        self.send_line(&json!({ "id": id, "image": encoded })).await?;
        let reply = self.read_reply(Some(id)).await?;
        parse_recognitions(reply)
    }

    async fn shutdown(&mut self) -> Result<(), OcrError> {
        // Closing stdin is the helper's signal to exit.
        drop(self.stdin.take());
        let status = self.child.wait().await?;
        if !status.success() {
            tracing::warn!(%status, "recognition helper exited with failure");
        }
        Ok(())
    }
}

fn reply_error(reply: &Value) -> Option<String> {
    reply.get("error").map(|e| match e.as_str() {
        Some(msg) => msg.to_string(),
        None => e.to_string(),
    })
}

fn parse_ready(reply: &Value) -> Result<(), OcrError> {
    if let Some(msg) = reply_error(reply) {
        return Err(OcrError::Startup(msg));
    }
    match reply.get("ready").and_then(Value::as_bool) {
        Some(true) => Ok(()),
        _ => Err(OcrError::Startup(format!("unexpected handshake reply: {}", reply))),
    }
}

fn parse_recognitions(mut reply: Value) -> Result<Vec<RawRecognition>, OcrError> {
    if let Some(msg) = reply_error(&reply) {
        return Err(OcrError::EngineError(msg));
    }
    match reply.get_mut("result").map(Value::take) {
        Some(Value::Array(entries)) => Ok(entries.into_iter().map(RawRecognition).collect()),
        Some(Value::Null) => Ok(Vec::new()),
        Some(other) => Err(OcrError::Protocol(format!("unexpected result: {}", other))),
        None => Err(OcrError::Protocol(format!("reply without result: {}", reply))),
    }
}
