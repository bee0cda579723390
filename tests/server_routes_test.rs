mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{EchoGenerator, FailingGenerator};
use local_llm_server::utils::monitor::SystemMonitor;
use local_llm_server::{create_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_query(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_root_returns_status_message() {
    let app = create_router(AppState::new(Arc::new(EchoGenerator::new(""))));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!({"message": "LLM Server is running"}));
}

#[tokio::test]
async fn test_query_returns_generated_text_with_prompt_prefix() {
    let generator = Arc::new(EchoGenerator::new(" and then the sun rose."));
    let app = create_router(AppState::new(generator.clone()));

    let response = app
        .oneshot(post_query(r#"{"prompt": "Once upon a time"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["text"], "Once upon a time and then the sun rose.");

    let seen = generator.seen_prompts.lock().unwrap();
    assert_eq!(seen.as_slice(), ["Once upon a time".to_string()]);
}

#[tokio::test]
async fn test_query_ignores_extra_fields() {
    let app = create_router(AppState::new(Arc::new(EchoGenerator::new("!"))));

    let response = app
        .oneshot(post_query(r#"{"prompt": "hi", "max_new_tokens": 999}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["text"], "hi!");
}

#[tokio::test]
async fn test_query_missing_prompt_is_unprocessable() {
    let app = create_router(AppState::new(Arc::new(EchoGenerator::new(""))));

    let response = app.oneshot(post_query(r#"{"text": "hi"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("prompt"));
}

#[tokio::test]
async fn test_query_wrong_prompt_type_is_unprocessable() {
    let app = create_router(AppState::new(Arc::new(EchoGenerator::new(""))));

    let response = app.oneshot(post_query(r#"{"prompt": 12}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_query_malformed_json_is_bad_request() {
    let app = create_router(AppState::new(Arc::new(EchoGenerator::new(""))));

    let response = app.oneshot(post_query(r#"{"prompt": "#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_query_generation_failure_is_internal_error() {
    let app = create_router(AppState::new(Arc::new(FailingGenerator::new())));

    let response = app.oneshot(post_query(r#"{"prompt": "hi"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Generation failed: out of memory");
}

#[tokio::test]
async fn test_get_query_is_not_allowed() {
    let app = create_router(AppState::new(Arc::new(EchoGenerator::new(""))));

    let response = app
        .oneshot(Request::builder().uri("/query").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_query_with_monitoring_enabled() {
    let state = AppState::new(Arc::new(EchoGenerator::new(" ok")))
        .with_monitor(SystemMonitor::new(true));
    let app = create_router(state);

    let response = app.oneshot(post_query(r#"{"prompt": "hi"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["text"], "hi ok");
}
