use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Which pipeline task to run. Anything unrecognized falls back to reply
/// drafting, the pipeline's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Research,
    Summarize,
    Reply,
}

impl TaskKind {
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some("research") => Self::Research,
            Some("summarize") => Self::Summarize,
            _ => Self::Reply,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Summarize => "summarize",
            Self::Reply => "reply",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskPayload {
    pub text: String,
    pub kind: TaskKind,
}

impl TaskPayload {
    pub fn from_input(input: &HashMap<String, String>) -> Self {
        Self {
            text: input.get("text").cloned().unwrap_or_default(),
            kind: TaskKind::from_selector(input.get("task_type").map(String::as_str)),
        }
    }
}

/// Pipeline output, decided once at the adapter boundary: either the
/// pipeline returned structured JSON or we keep the raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskOutcome {
    Structured(serde_json::Value),
    RawText(String),
}

impl TaskOutcome {
    pub fn as_json(&self) -> serde_json::Value {
        match self {
            Self::Structured(value) => value.clone(),
            Self::RawText(text) => serde_json::Value::String(text.clone()),
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ExecutionError(pub String);

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the task to completion. Long-running; callers must not hold any
    /// lock across this and must not block a request handler on it.
    async fn execute(&self, payload: TaskPayload) -> Result<TaskOutcome, ExecutionError>;
}

/// HTTP adapter for the external multi-agent pipeline.
pub struct PipelineClient {
    client: reqwest::Client,
    base_url: String,
}

impl PipelineClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        // no request timeout: pipeline runs are expected to take minutes
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TaskExecutor for PipelineClient {
    async fn execute(&self, payload: TaskPayload) -> Result<TaskOutcome, ExecutionError> {
        log::info!("starting pipeline task ({})", payload.kind.as_str());

        let resp = self
            .client
            .post(format!("{}/run", self.base_url))
            .json(&serde_json::json!({
                "text": payload.text,
                "task": payload.kind.as_str(),
            }))
            .send()
            .await
            .map_err(|e| ExecutionError(format!("pipeline unreachable: {e}")))?
            .error_for_status()
            .map_err(|e| ExecutionError(format!("pipeline returned an error: {e}")))?;

        let body = resp
            .text()
            .await
            .map_err(|e| ExecutionError(format!("unreadable pipeline response: {e}")))?;

        log::info!("pipeline task completed");

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value @ serde_json::Value::Object(_)) | Ok(value @ serde_json::Value::Array(_)) => {
                Ok(TaskOutcome::Structured(value))
            }
            _ => Ok(TaskOutcome::RawText(body)),
        }
    }
}
