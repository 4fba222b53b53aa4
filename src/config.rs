//! # Configuration — One Immutable Struct, Read Once
//!
//! All environment-derived settings are collected into [`Config`] at process
//! start and passed explicitly into the pipeline. Nothing in the request
//! path reads the environment ad hoc — this keeps the timeout and
//! feature-flag behavior unit-testable.
//!
//! ## Environment Surface
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `KARNAMEH_ADDR` | `0.0.0.0:3000` | server bind address |
//! | `KARNAMEH_SCHOOL_DATA` | `data/school.json` | directory fixture path |
//! | `KARNAMEH_LLM_MODE` | `cloud` | `cloud` or `local` inference |
//! | `OPENAI_API_KEY` | — | credential for cloud mode |
//! | `KARNAMEH_CLOUD_MODEL` | `gpt-4o-mini` | model id in cloud mode |
//! | `KARNAMEH_LOCAL_MODEL` | `qwen2.5:7b` | model id in local mode |
//! | `KARNAMEH_LOCAL_BASE_URL` | `http://localhost:11434/v1` | local endpoint |
//! | `KARNAMEH_NARRATIVE_TIMEOUT_MS` | `12000` | narrative stage budget |
//! | `KARNAMEH_GENERAL_TIMEOUT_MS` | `45000` | general-chat budget |
//! | `KARNAMEH_DISABLE_NARRATIVE` | unset | `1`/`true` → deterministic-only |

use std::time::Duration;

/// Effective language-model settings after mode resolution.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// OpenAI-compatible `/chat/completions` base, without trailing slash.
    pub base_url: String,
    /// Bearer credential; `None` is legal for local endpoints.
    pub api_key: Option<String>,
    /// Model used for the structured extraction call.
    pub extract_model: String,
    /// Model used for streamed narrative / general chat.
    pub chat_model: String,
}

/// Immutable process-wide configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub school_data_path: String,
    pub llm: LlmConfig,
    /// Budget for the narrative stage of a student report — deliberately
    /// shorter than the general-chat budget.
    pub narrative_timeout: Duration,
    /// Budget for unrestricted general chat.
    pub general_timeout: Duration,
    /// `false` → the stream closes right after the deterministic content.
    pub narrative_enabled: bool,
}

impl Config {
    /// Builds the configuration from the environment, applying defaults.
    pub fn from_env() -> Self {
        let mode = env_or("KARNAMEH_LLM_MODE", "cloud");
        let llm = if mode.eq_ignore_ascii_case("local") {
            let model = env_or("KARNAMEH_LOCAL_MODEL", "qwen2.5:7b");
            LlmConfig {
                base_url: env_or("KARNAMEH_LOCAL_BASE_URL", "http://localhost:11434/v1"),
                api_key: None,
                extract_model: model.clone(),
                chat_model: model,
            }
        } else {
            let model = env_or("KARNAMEH_CLOUD_MODEL", "gpt-4o-mini");
            LlmConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: std::env::var("OPENAI_API_KEY").ok(),
                extract_model: model.clone(),
                chat_model: model,
            }
        };

        Self {
            bind_addr: env_or("KARNAMEH_ADDR", "0.0.0.0:3000"),
            school_data_path: env_or("KARNAMEH_SCHOOL_DATA", "data/school.json"),
            llm,
            narrative_timeout: Duration::from_millis(env_ms("KARNAMEH_NARRATIVE_TIMEOUT_MS", 12_000)),
            general_timeout: Duration::from_millis(env_ms("KARNAMEH_GENERAL_TIMEOUT_MS", 45_000)),
            narrative_enabled: !env_flag("KARNAMEH_DISABLE_NARRATIVE"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_ms(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes")
    )
}

/// Ready-made configuration for pipeline tests: tiny timeouts, narrative on.
#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".into(),
        school_data_path: "data/school.json".into(),
        llm: LlmConfig {
            base_url: "http://localhost:9".into(),
            api_key: None,
            extract_model: "test".into(),
            chat_model: "test".into(),
        },
        narrative_timeout: Duration::from_millis(50),
        general_timeout: Duration::from_millis(50),
        narrative_enabled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // from_env with a clean env yields the documented defaults
        let cfg = Config::from_env();
        assert_eq!(cfg.narrative_timeout, Duration::from_millis(12_000));
        assert_eq!(cfg.general_timeout, Duration::from_millis(45_000));
        assert!(cfg.narrative_enabled);
    }

    #[test]
    fn narrative_budget_is_shorter_than_general() {
        let cfg = test_config();
        assert!(cfg.narrative_timeout <= cfg.general_timeout);
    }
}
