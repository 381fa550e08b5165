//! WebSocket front end: one JSON request in, one JSON envelope out.
//!
//! Clients send `{"image": "<base64>"}` (a `data:<mime>;base64,` prefix is
//! accepted) and get back a result envelope on the same connection, which
//! stays open for further requests. Requests on one connection are handled
//! strictly in order; connections run concurrently but share the single
//! engine slot.
use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::envelope::Envelope;
use crate::error_classifier::{classify_error, PipelineError};
use crate::pipeline::OcrPipeline;

/// Label used in place of a file path for images received over the socket.
pub const WEBSOCKET_SOURCE: &str = "websocket_image";

const INVALID_JSON: &str = "Invalid JSON format";
const MISSING_IMAGE: &str = "Missing 'image' field in request";

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Reply for requests too malformed to describe an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    pub success: bool,
    pub error: String,
}

impl ProtocolError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Envelope(Box<Envelope>),
    Protocol(ProtocolError),
}

pub fn router(pipeline: Arc<OcrPipeline>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(pipeline)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, pipeline: Arc<OcrPipeline>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("OCR server listening on ws://{}", addr);
    tracing::info!("send JSON with an 'image' field containing a base64-encoded image");

    axum::serve(
        listener,
        router(pipeline).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn health(State(pipeline): State<Arc<OcrPipeline>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loading_time": pipeline.engine().initialization_time().as_secs_f64(),
    }))
}

#[tracing::instrument(skip(ws, pipeline))]
async fn ws_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(pipeline): State<Arc<OcrPipeline>>,
) -> Response {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, pipeline, peer))
}

async fn handle_socket(socket: WebSocket, pipeline: Arc<OcrPipeline>, peer: String) {
    let (sender, receiver) = socket.split();
    run_session(receiver, sender, &pipeline, &peer).await;
}

/// Drives one connection: every text frame gets exactly one reply, in order.
///
/// A failing request only affects its own reply; the session ends when the
/// client closes, the transport errors, or a reply cannot be sent.
pub async fn run_session<S, K>(mut incoming: S, mut outgoing: K, pipeline: &OcrPipeline, peer: &str)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    tracing::info!(%peer, "client connected");

    while let Some(frame) = incoming.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "connection error");
                break;
            }
        };

        let reply = handle_message(pipeline, &text).await;
        log_reply(peer, &reply);

        let body = match serde_json::to_string(&reply) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(%peer, error = %e, "failed to encode reply");
                match serde_json::to_string(&ProtocolError::new(format!("Server error: {}", e))) {
                    Ok(body) => body,
                    Err(_) => continue,
                }
            }
        };
        if let Err(e) = outgoing.send(Message::Text(body)).await {
            tracing::warn!(%peer, error = %e, "failed to send reply");
            break;
        }
    }

    tracing::info!(%peer, "client disconnected");
}

/// Decodes one request and runs it through the pipeline.
pub async fn handle_message(pipeline: &OcrPipeline, text: &str) -> Reply {
    let request: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return Reply::Protocol(ProtocolError::new(INVALID_JSON)),
    };
    let Some(image) = request.as_object().and_then(|fields| fields.get("image")) else {
        return Reply::Protocol(ProtocolError::new(MISSING_IMAGE));
    };

    match decode_image_payload(image) {
        Ok(bytes) => Reply::Envelope(Box::new(
            pipeline.process_bytes(bytes, WEBSOCKET_SOURCE).await,
        )),
        Err(e) => Reply::Envelope(Box::new(classify_error(&e, WEBSOCKET_SOURCE))),
    }
}

/// Extracts image bytes from the `image` field: plain base64 or a base64 data URI.
pub fn decode_image_payload(value: &Value) -> Result<Vec<u8>, PipelineError> {
    let payload = value.as_str().ok_or_else(|| {
        PipelineError::InvalidImage("'image' must be a base64-encoded string".to_string())
    })?;
    let payload = if payload.starts_with("data:") {
        payload
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| PipelineError::InvalidImage("malformed data URI".to_string()))?
    } else {
        payload
    };
    // MIME-style encoders wrap lines; whitespace is never part of the alphabet.
    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(cleaned)
        .map_err(|e| PipelineError::InvalidImage(format!("Failed to decode base64 image: {}", e)))
}

fn log_reply(peer: &str, reply: &Reply) {
    match reply {
        Reply::Envelope(envelope) if envelope.is_success() => tracing::info!(
            %peer,
            regions = envelope.metadata.total_text_regions,
            "sent result: {} text regions in {:.2}s",
            envelope.metadata.total_text_regions,
            envelope.metadata.processing_time
        ),
        Reply::Envelope(envelope) => tracing::warn!(
            %peer,
            "processing failed: {}",
            envelope.error_message().unwrap_or("unknown error")
        ),
        Reply::Protocol(error) => tracing::warn!(%peer, error = %error.error, "rejected request"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_base64() {
        assert_eq!(decode_image_payload(&json!("aGVsbG8=")).unwrap(), b"hello");
        // padding is optional
        assert_eq!(decode_image_payload(&json!("aGVsbG8")).unwrap(), b"hello");
    }

    #[test]
    fn test_decode_data_uri() {
        let bytes = decode_image_payload(&json!("data:image/png;base64,aGVsbG8=")).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_line_wrapped_base64() {
        let bytes = decode_image_payload(&json!("aGVsbG8gd29y\nbGQ=\n")).unwrap();
        assert_eq!(bytes, b"hello world");

        let bytes = decode_image_payload(&json!("data:image/png;base64,aGVs\r\nbG8=")).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        for value in [json!(42), json!("%%%not base64%%%"), json!("data:image/png;base64")] {
            assert!(matches!(
                decode_image_payload(&value),
                Err(PipelineError::InvalidImage(_))
            ));
        }
    }

    #[test]
    fn test_protocol_error_wire_format() {
        let reply = Reply::Protocol(ProtocolError::new(INVALID_JSON));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"success": false, "error": "Invalid JSON format"})
        );
    }
}
