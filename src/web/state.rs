//! # Shared Web State
//!
//! [`AppState`] is injected into every handler through Axum's
//! `State<AppState>` extractor. Everything inside is an `Arc`, so the
//! clone Axum performs per request is two pointer bumps.

use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Handler-shared state: the request pipeline and the immutable
/// configuration it was built from.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, config: Arc<Config>) -> Self {
        Self { pipeline, config }
    }
}
