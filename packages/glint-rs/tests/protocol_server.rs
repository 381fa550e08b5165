//! Integration tests for the WebSocket session loop and HTTP routes

mod common;

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use futures::channel::mpsc;
use futures::StreamExt;
use glint_rs::protocol_server::router;
use glint_rs::run_session;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{hello_reply, pipeline_with, png_bytes};

fn text(value: &str) -> Result<Message, axum::Error> {
    Ok(Message::Text(value.to_string()))
}

async fn exchange(frames: Vec<Result<Message, axum::Error>>) -> Vec<Value> {
    let pipeline = pipeline_with(hello_reply()).await;
    let (tx, rx) = mpsc::unbounded();
    run_session(futures::stream::iter(frames), tx, &pipeline, "test-peer").await;
    rx.map(|message| match message {
        Message::Text(body) => serde_json::from_str(&body).unwrap(),
        other => panic!("unexpected frame: {:?}", other),
    })
    .collect()
    .await
}

#[tokio::test]
async fn test_bad_message_does_not_end_session() {
    let image = base64::engine::general_purpose::STANDARD.encode(png_bytes(80, 40));
    let replies = exchange(vec![
        text(&json!({ "image": image }).to_string()),
        text(r#"{"image": "%%% definitely not base64 %%%"}"#),
        text(&json!({ "image": format!("data:image/png;base64,{}", image) }).to_string()),
    ])
    .await;

    assert_eq!(replies.len(), 3);

    let first = &replies[0];
    assert_eq!(first["metadata"]["success"], json!(true));
    assert_eq!(first["metadata"]["total_text_regions"], json!(1));
    assert_eq!(first["metadata"]["image_dimensions"], json!({"width": 80, "height": 40}));
    assert_eq!(first["findings"][0]["text"], json!("HELLO"));
    assert_eq!(first["findings"][0]["individual_words"][0]["word"], json!("HELLO"));
    assert_eq!(first["metadata"]["text_stats"]["longest_text"], json!("HELLO"));

    let second = &replies[1];
    assert_eq!(second["metadata"]["success"], json!(false));
    assert_eq!(second["findings"], json!([]));
    assert_eq!(second["metadata"]["error"]["type"], json!("INVALID_IMAGE"));
    assert_eq!(second["metadata"]["error"]["image_path"], json!("websocket_image"));
    assert_eq!(second["metadata"]["error"]["traceback"], json!(null));

    assert_eq!(replies[2]["metadata"]["success"], json!(true));
}

#[tokio::test]
async fn test_protocol_errors() {
    let replies = exchange(vec![
        text("this is not json"),
        text(r#"{"picture": "abc"}"#),
        text("[1, 2, 3]"),
    ])
    .await;

    assert_eq!(
        replies,
        vec![
            json!({"success": false, "error": "Invalid JSON format"}),
            json!({"success": false, "error": "Missing 'image' field in request"}),
            json!({"success": false, "error": "Missing 'image' field in request"}),
        ]
    );
}

#[tokio::test]
async fn test_undecodable_image_bytes() {
    let payload = base64::engine::general_purpose::STANDARD.encode(b"plain text, not pixels");
    let replies = exchange(vec![text(&json!({ "image": payload }).to_string())]).await;
    let error = &replies[0]["metadata"]["error"];
    assert_eq!(error["type"], json!("INVALID_IMAGE"));
    assert!(error["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid image file websocket_image:"));
}

#[tokio::test]
async fn test_control_frames_and_close() {
    let image = base64::engine::general_purpose::STANDARD.encode(png_bytes(8, 8));
    let request = json!({ "image": image }).to_string();
    let replies = exchange(vec![
        Ok(Message::Ping(vec![1, 2, 3])),
        Ok(Message::Binary(request.clone().into_bytes())),
        Ok(Message::Close(None)),
        text(&request),
    ])
    .await;

    // ping ignored, binary treated as text, nothing after close
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["metadata"]["success"], json!(true));
}

#[tokio::test]
async fn test_health_route() {
    let app = router(pipeline_with(Vec::new()).await);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], json!("healthy"));
    assert_eq!(health["version"], json!(env!("CARGO_PKG_VERSION")));
    assert!(health["model_loading_time"].as_f64().unwrap() >= 0.0);
}
