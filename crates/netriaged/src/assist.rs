//! Diagnosis assist - optional language-model narrative over findings.
//!
//! Never on the critical path: the session manager bounds every call with a
//! timeout and drops the narrative on any failure.

use crate::config::AssistConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AssistError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Assist returned empty response")]
    EmptyResponse,
}

/// What the assist sees for one ingest.
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeRequest {
    pub user_text: String,
    pub hosts: Vec<String>,
    /// Current finding statements, key order
    pub findings: Vec<String>,
    pub contradiction: Option<String>,
}

impl NarrativeRequest {
    fn prompt(&self) -> String {
        let mut prompt = String::from(
            "You are assisting a network engineer during fault triage. \
             Using only the findings below, write two or three sentences on \
             what they suggest. Do not invent device state.\n\n",
        );
        prompt.push_str(&format!("Operator: {}\n", self.user_text));
        prompt.push_str(&format!("Hosts: {}\n", self.hosts.join(", ")));
        prompt.push_str("Findings:\n");
        for f in &self.findings {
            prompt.push_str(&format!("- {}\n", f));
        }
        if let Some(c) = &self.contradiction {
            prompt.push_str(&format!("Note: {}\n", c));
        }
        prompt
    }
}

#[async_trait]
pub trait DiagnosisAssist: Send + Sync {
    async fn narrate(&self, request: &NarrativeRequest) -> Result<String, AssistError>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama `/api/generate` client.
pub struct OllamaAssist {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OllamaAssist {
    pub fn new(config: &AssistConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl DiagnosisAssist for OllamaAssist {
    async fn narrate(&self, request: &NarrativeRequest) -> Result<String, AssistError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt(),
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AssistError::Timeout(self.timeout.as_secs())
                } else {
                    AssistError::Http(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(AssistError::Http(format!(
                "HTTP {} from Ollama",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AssistError::Http(format!("Failed to parse response: {}", e)))?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(AssistError::EmptyResponse);
        }
        Ok(text)
    }
}
