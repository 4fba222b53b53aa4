//! # Language Model Client
//!
//! One OpenAI-compatible `/chat/completions` client covering the two model
//! calls the pipeline makes:
//!
//! 1. **Structured extraction** — a non-streaming call with a single tool
//!    definition and `tool_choice` forced to that tool, so the model must
//!    answer with `{student_name, subject_name}` and never with free text.
//! 2. **Streamed generation** — `stream: true`; SSE `data:` lines are
//!    parsed off the byte stream and each content delta is forwarded over
//!    an `mpsc` channel. Dropping the receiver cancels the transfer: the
//!    next send fails and the reader task ends.
//!
//! The same client serves cloud and local endpoints; only base URL, model
//! id, and credential differ (see [`crate::config::LlmConfig`]).
//!
//! There is no retry anywhere in this module — a failed call surfaces once
//! and the pipeline takes its degraded branch.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::LlmConfig;
use crate::domain::{ChatTurn, Role};
use crate::error::ChatError;

/// Structured extraction result. Empty string means "not specified".
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ModelExtraction {
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub subject_name: String,
}

/// Contract the pipeline programs against; [`OpenAiClient`] is the real
/// implementation, tests substitute mocks.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One structured extraction call for the latest user message.
    async fn extract_query(&self, message: &str) -> Result<ModelExtraction, ChatError>;

    /// Starts a streamed generation; deltas arrive on the returned channel
    /// until completion, failure, or the receiver is dropped.
    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatTurn],
    ) -> Result<mpsc::Receiver<Result<String, ChatError>>, ChatError>;
}

/// System instruction for the extraction tool call. Forbids inventing names
/// not present in the input; empty subject means "no subject specified".
const EXTRACT_SYSTEM: &str = "\
تو یک استخراج‌کننده دقیق هستی. از پیام مدیر مدرسه فقط نام دانش‌آموز و نام درس را استخراج کن. \
هرگز نامی که در متن پیام نیامده اختراع نکن. \
اگر نام درس ذکر نشده بود، subject_name را رشته خالی بگذار. \
اگر نام دانش‌آموزی ذکر نشده بود، student_name را رشته خالی بگذار.";

pub struct OpenAiClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(self.completions_url()).json(body);
        if let Some(key) = &self.config.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        req
    }

    fn extraction_tool() -> serde_json::Value {
        json!({
            "type": "function",
            "function": {
                "name": "extract_student_query",
                "description": "استخراج نام دانش‌آموز و نام درس از پیام",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "student_name": {
                            "type": "string",
                            "description": "نام دانش‌آموز دقیقا همان‌طور که در پیام آمده؛ رشته خالی اگر ذکر نشده"
                        },
                        "subject_name": {
                            "type": "string",
                            "description": "نام درس؛ رشته خالی اگر ذکر نشده"
                        }
                    },
                    "required": ["student_name", "subject_name"]
                }
            }
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn extract_query(&self, message: &str) -> Result<ModelExtraction, ChatError> {
        let body = json!({
            "model": self.config.extract_model,
            "messages": [
                {"role": "system", "content": EXTRACT_SYSTEM},
                {"role": "user", "content": message},
            ],
            "tools": [Self::extraction_tool()],
            "tool_choice": {
                "type": "function",
                "function": {"name": "extract_student_query"}
            },
            "temperature": 0.0,
        });

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| ChatError::Llm(format!("extraction request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Llm(format!("extraction response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(ChatError::Llm(format!("extraction call returned {status}: {text}")));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ChatError::Llm(format!("extraction response unparsable: {e}")))?;

        let arguments = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.tool_calls)
            .and_then(|mut calls| if calls.is_empty() { None } else { Some(calls.remove(0)) })
            .map(|call| call.function.arguments)
            .ok_or_else(|| ChatError::Llm("extraction returned no tool call".into()))?;

        serde_json::from_str(&arguments)
            .map_err(|e| ChatError::Llm(format!("extraction arguments unparsable: {e}")))
    }

    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatTurn],
    ) -> Result<mpsc::Receiver<Result<String, ChatError>>, ChatError> {
        let mut messages = vec![json!({"role": "system", "content": system})];
        for turn in history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({"role": role, "content": turn.content}));
        }

        let body = json!({
            "model": self.config.chat_model,
            "messages": messages,
            "stream": true,
        });

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| ChatError::Llm(format!("generation request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Llm(format!("generation call returned {status}: {text}")));
        }

        let (tx, rx) = mpsc::channel::<Result<String, ChatError>>(32);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ChatError::Llm(format!("stream transport failed: {e}"))))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE lines; a partial line stays buffered.
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data:") else { continue };
                    let data = data.trim();
                    if data == "[DONE]" {
                        return;
                    }
                    if let Some(delta) = parse_delta(data) {
                        if tx.send(Ok(delta)).await.is_err() {
                            // receiver dropped — the consumer cancelled
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Pulls `choices[0].delta.content` out of one streaming chunk. Non-content
/// chunks (role markers, usage frames) yield `None`.
fn parse_delta(data: &str) -> Option<String> {
    let chunk: serde_json::Value = serde_json::from_str(data).ok()?;
    let content = chunk["choices"][0]["delta"]["content"].as_str()?;
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

// ─── response wire types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    arguments: String,
}
