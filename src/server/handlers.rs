use super::AppState;
use crate::domain::model::{ErrorResponse, QueryRequest, QueryResponse, StatusResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use std::time::Instant;

pub async fn root_handler() -> Json<StatusResponse> {
    Json(StatusResponse::default())
}

pub async fn query_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    tracing::info!("📨 /query received ({} chars)", request.prompt.chars().count());
    let started = Instant::now();

    match state.generator.generate(request.prompt).await {
        Ok(text) => {
            tracing::info!("✅ /query completed in {:?}", started.elapsed());
            if state.monitor.is_enabled() {
                // sysinfo 的刷新是阻塞呼叫
                let monitor = Arc::clone(&state.monitor);
                tokio::task::spawn_blocking(move || monitor.log_stats("After generation"));
            }
            Json(QueryResponse { text }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// 格式錯誤的 body 也回 {"detail": ...}
fn rejection_response(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    tracing::warn!("⚠️ Rejected /query body ({}): {}", status, rejection.body_text());
    (
        status,
        Json(ErrorResponse {
            detail: rejection.body_text(),
        }),
    )
        .into_response()
}
