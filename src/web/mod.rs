//! # Web Module — The HTTP Surface
//!
//! The whole layer is **Axum** + **Maud** + **SSE**.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Browser (fetch + SSE parsing)                           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Axum Router (this module)                               │
//! │  ├── GET  /        → demo chat page (Maud)              │
//! │  ├── GET  /status  → JSON: readiness + feature flags    │
//! │  └── POST /chat    → SSE stream, one turn per request   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Pipeline (one task per request)                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submodules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`state`] | Shared state (`AppState`) |
//! | [`events`] | SSE event enum for the chat stream |
//! | [`handlers`] | Axum handlers per route |
//! | [`templates`] | Maud templates (server-side HTML) |

pub mod events;
pub mod handlers;
pub mod state;
pub mod templates;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use state::AppState;

/// Builds the Axum router.
///
/// CORS is permissive so the chat endpoint can be embedded in the main
/// school-management frontend during development. `AppState` is shared
/// with every handler through Axum's `State` extractor.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::status))
        .route("/chat", post(handlers::chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
