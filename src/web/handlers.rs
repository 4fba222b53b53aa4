//! # Axum Handlers
//!
//! ## Response Pattern
//!
//! | Handler | Method | Returns | Use |
//! |---------|--------|---------|-----|
//! | `index` | GET | full HTML | demo chat page (Maud) |
//! | `status` | GET | JSON | readiness polling |
//! | `chat` | POST | SSE stream | one conversational turn |
//!
//! ## Tenant Guard
//!
//! `POST /chat` requires an `x-school-id` header identifying the
//! caller's school. A missing or blank header is rejected before any
//! work starts, with a structured JSON body and 401 — the stream is
//! never opened for an unauthorized request.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::Html;
use axum::Json;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::events::ChatEvent;
use super::state::AppState;
use super::templates;
use crate::domain::ChatTurn;
use crate::error::ChatError;

/// Header carrying the caller's school id on every chat request.
pub const SCHOOL_ID_HEADER: &str = "x-school-id";

/// Buffer between the pipeline task and the SSE writer.
const STREAM_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    pub narrative_enabled: bool,
}

/// GET `/` — demo chat page.
pub async fn index() -> Html<String> {
    Html(templates::index().into_string())
}

/// GET `/status` — readiness and feature flags, for polling.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ready: true,
        narrative_enabled: state.config.narrative_enabled,
    })
}

/// POST `/chat` — runs one conversational turn, streamed as SSE.
///
/// The pipeline runs in its own task; this handler only bridges its
/// event channel onto the HTTP response. When the channel closes (the
/// task finished, on any branch) a final `Done` event is appended.
///
/// ## Keep-Alive
///
/// A keep-alive comment every 15s holds the connection open through
/// proxies while the narrative stage is still generating.
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>>, (StatusCode, Json<ErrorBody>)>
{
    let school_id = headers
        .get(SCHOOL_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            let err = ChatError::Unauthorized(format!("missing or empty {SCHOOL_ID_HEADER} header"));
            tracing::warn!(error = %err, "chat request rejected");
            (StatusCode::UNAUTHORIZED, Json(ErrorBody { error: err.to_string() }))
        })?
        .to_string();

    if request.messages.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error: "messages must not be empty".into() }),
        ));
    }

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let pipeline = state.pipeline.clone();
    let history: Vec<ChatTurn> = request.messages;
    tokio::spawn(async move {
        pipeline.handle(school_id, history, tx).await;
    });

    let stream = ReceiverStream::new(rx)
        .map(ChatEvent::from)
        .chain(futures_util::stream::once(async { ChatEvent::Done }))
        .filter_map(|event| async move {
            let data = serde_json::to_string(&event).ok()?;
            Some(Ok(SseEvent::default().data(data)))
        });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
