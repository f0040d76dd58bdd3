//! The `serve` router over a real socket.

mod common;

use common::{approving_backend, pipeline, two_task_chain};
use hypnobot::cli::commands::serve::router;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn_api(answer: &str) -> String {
    let backend = approving_backend(&[("support_agent", answer)]);
    let app = router(Arc::new(pipeline(two_task_chain(), &backend)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_health() {
    let base = spawn_api("unused").await;

    let body: Value = reqwest::get(format!("{base}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_chat_returns_chat_result() {
    let base = spawn_api("Response: \"Breathe slowly and count down from ten.\"\nSafety Level: 1").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&json!({ "user_input": "How do I relax?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["final_response"], "Breathe slowly and count down from ten.");
    assert_eq!(body["safety_level"], 1);
    assert!(body["metadata"]["request_id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(body["processed_at"].is_string());
}

#[tokio::test]
async fn test_blank_input_is_rejected() {
    let base = spawn_api("unused").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&json!({ "user_input": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_missing_field_is_a_client_error() {
    let base = spawn_api("unused").await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
