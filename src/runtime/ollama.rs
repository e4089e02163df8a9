//! Blocking HTTP client for an Ollama server.
//!
//! Uses `POST /api/chat` with `stream: true` (newline-delimited JSON chunks)
//! and `GET /api/tags` for the installed model list.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Message, ModelInfo, ModelRuntime};
use crate::{Error, Result};

/// User-Agent sent with every request
const USER_AGENT: &str = concat!("kuzco/", env!("CARGO_PKG_VERSION"));

/// How long to wait for the TCP connection before calling the runtime down
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// One NDJSON line of a streamed chat response.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// An Ollama server reachable over HTTP.
pub struct OllamaClient {
    base_url: String,
    agent: ureq::Agent,
}

impl OllamaClient {
    /// Create a client for `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn unavailable(&self, reason: impl Into<String>) -> Error {
        Error::ModelUnavailable {
            url: self.base_url.clone(),
            reason: reason.into(),
        }
    }

    /// Map a ureq failure onto the error taxonomy.
    fn map_error(&self, err: ureq::Error, model: Option<&str>) -> Error {
        match (err, model) {
            (ureq::Error::Status(404, _), Some(model)) => Error::ModelNotFound(model.to_string()),
            (ureq::Error::Status(code, resp), _) => {
                let body = resp.into_string().unwrap_or_default();
                let detail = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                    .unwrap_or(body);
                Error::Other(format!("Model runtime returned HTTP {}: {}", code, detail))
            }
            (ureq::Error::Transport(t), _) => self.unavailable(t.to_string()),
        }
    }
}

impl ModelRuntime for OllamaClient {
    fn chat(
        &self,
        model: &str,
        messages: &[Message],
        on_token: &mut dyn FnMut(&str),
    ) -> Result<String> {
        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };
        tracing::debug!(model, messages = messages.len(), "sending chat request");

        let response = self
            .agent
            .post(&self.url("/api/chat"))
            .send_json(&request)
            .map_err(|e| self.map_error(e, Some(model)))?;

        let reader = BufReader::new(response.into_reader());
        let mut reply = String::new();
        for line in reader.lines() {
            let line = line.map_err(|e| self.unavailable(format!("stream interrupted: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: ChatChunk = serde_json::from_str(&line)?;
            if let Some(err) = chunk.error {
                if err.contains("not found") {
                    return Err(Error::ModelNotFound(model.to_string()));
                }
                return Err(Error::Other(format!("Model runtime error: {}", err)));
            }
            if let Some(message) = chunk.message {
                if !message.content.is_empty() {
                    on_token(&message.content);
                    reply.push_str(&message.content);
                }
            }
            if chunk.done {
                break;
            }
        }

        tracing::debug!(model, chars = reply.len(), "chat reply complete");
        Ok(reply)
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .agent
            .get(&self.url("/api/tags"))
            .call()
            .map_err(|e| self.map_error(e, None))?;
        let tags: TagsResponse = response
            .into_json()
            .map_err(|e| self.unavailable(format!("unexpected /api/tags response: {}", e)))?;
        Ok(tags.models)
    }
}
