//! # Error Taxonomy
//!
//! One enum for everything that can fail inside the pipeline. The variants
//! map directly onto the handling policy:
//!
//! | Variant | Policy |
//! |---------|--------|
//! | [`Unauthorized`](ChatError::Unauthorized) | structured 401 before the pipeline starts |
//! | [`Config`](ChatError::Config) | fatal for the request, never retried |
//! | [`Llm`](ChatError::Llm) | generation stage recovers locally; extraction stage falls back |
//! | [`Store`](ChatError::Store) | fail-fast, surfaced as a generic error |
//! | [`Internal`](ChatError::Internal) | caught at the top level, logged with the correlation id |
//!
//! Resolution ambiguity (zero/many candidates, unresolved subject) is NOT an
//! error — those are designed terminal branches of the pipeline and carry
//! normal streamed text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// No session, wrong role, or missing tenant key.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Missing credentials, missing tenant linkage, or a student record
    /// without its activity-store join key.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport or protocol failure talking to the language model.
    #[error("language model error: {0}")]
    Llm(String),

    /// Failure reading the student directory or activity store.
    #[error("directory error: {0}")]
    Store(String),

    /// Anything unexpected. Never exposes internals to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}
