use crate::encoder::StreamEncoder;
use crate::llm::LlmError;
use crate::message::ChatTurnRequest;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const FAILURE_BODY: &str = "Error processing your request";

#[derive(Clone)]
pub struct AppState {
    pub encoder: StreamEncoder,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid request body: {0}")]
    BadRequest(#[from] serde_json::Error),
    #[error("completion failed: {0}")]
    Provider(#[from] LlmError),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        error!("Error in chat API: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            FAILURE_BODY,
        )
            .into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    info!("Tutor server listening on {}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// `POST /api/chat`. The body is parsed by hand so a malformed request gets
/// the same 500 as a provider failure.
async fn handle_chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ChatError> {
    let turn: ChatTurnRequest = serde_json::from_slice(&body)?;
    info!(
        messages = turn.messages.len(),
        style = %turn.student_data.learning_style,
        "Chat turn received"
    );

    let stream = state.encoder.encode(&turn.messages, &turn.student_data).await?;
    let body = Body::from_stream(stream.map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk))));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}
