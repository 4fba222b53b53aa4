//! # Karnameh Chat — Conversational Student Reports
//!
//! **Main entry point** of the karnameh chat service: a Persian-language
//! assistant that lets a school principal ask about a student in natural
//! language and get back a deterministic activity report, streamed over
//! SSE, with an optional model-written narrative after it.
//!
//! ## Startup Flow
//!
//! ```text
//! main()
//!   ├── Configure tracing/logging
//!   ├── Load configuration from environment
//!   ├── Load school fixture from disk (or start empty)
//!   ├── Build OpenAI-compatible client (cloud or local)
//!   ├── Assemble Pipeline + AppState + Router
//!   └── Serve (one short-lived task per chat request)
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # cloud mode (default) — needs OPENAI_API_KEY
//! OPENAI_API_KEY=sk-... cargo run
//!
//! # local mode against an Ollama-style endpoint
//! KARNAMEH_LLM_MODE=local cargo run
//!
//! # verbose logs
//! RUST_LOG=debug cargo run
//! ```
//!
//! The server listens on `http://localhost:3000` by default
//! (`KARNAMEH_BIND` overrides it).

/// `config` module — immutable environment-derived configuration.
mod config;

/// `directory` module — school roster and activity data access.
mod directory;

/// `domain` module — shared domain types (turns, candidates, reports).
mod domain;

/// `error` module — the request error taxonomy.
mod error;

/// `llm` module — OpenAI-compatible client: extraction and streaming.
mod llm;

/// `nlu` module — normalization, intent gate, entity extraction.
mod nlu;

/// `pipeline` module — the per-request state machine.
mod pipeline;

/// `report` module — aggregation, Jalali dates, deterministic rendering.
mod report;

/// `resolve` module — candidate and subject resolution rules.
mod resolve;

/// `web` module — axum server, handlers, templates, SSE.
mod web;

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::directory::JsonDirectory;
use crate::llm::OpenAiClient;
use crate::pipeline::Pipeline;
use crate::web::state::AppState;

/// Initializes every component and runs the server until shutdown.
///
/// # Errors
///
/// Returns an error if:
/// - the listen address cannot be bound
/// - the axum server fails while running
#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity, defaulting to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("📋 Karnameh Chat — Starting...");

    let config = Arc::new(Config::from_env());
    tracing::info!(
        llm_base_url = %config.llm.base_url,
        extract_model = %config.llm.extract_model,
        chat_model = %config.llm.chat_model,
        narrative_enabled = config.narrative_enabled,
        "configuration loaded"
    );
    if config.llm.api_key.is_none() && config.llm.base_url.contains("api.openai.com") {
        tracing::warn!("OPENAI_API_KEY is not set; model-assisted stages will degrade");
    }

    // Missing or corrupt fixture is not fatal: the server still starts and
    // answers general chat, student lookups just come back empty.
    let directory = match JsonDirectory::load(&config.school_data_path) {
        Ok(dir) => {
            tracing::info!(
                path = %config.school_data_path,
                schools = dir.school_count(),
                students = dir.student_count(),
                "school data loaded"
            );
            Arc::new(dir)
        }
        Err(e) => {
            tracing::warn!(
                path = %config.school_data_path,
                error = %e,
                "failed to load school data, starting with an empty directory"
            );
            Arc::new(JsonDirectory::empty())
        }
    };

    let model = Arc::new(OpenAiClient::new(config.llm.clone()));
    let pipeline = Arc::new(Pipeline::new(config.clone(), directory, model));

    let state = AppState::new(pipeline, config.clone());
    let app = web::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
