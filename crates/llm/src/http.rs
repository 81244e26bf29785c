//! HTTP Model Client
//!
//! Client for OpenAI-compatible chat-completion endpoints. Handles both
//! single-shot and streamed completions; streamed responses arrive as SSE
//! `data:` lines which are reassembled line-by-line from the byte stream.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use super::client::{parse_http_error, ModelClient};
use super::types::{Completion, CompletionRequest, Message, ModelConfig, ModelError, ModelResult, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible HTTP endpoint.
pub struct HttpModelClient {
    config: ModelConfig,
    client: reqwest::Client,
    chat_url: Url,
    models_url: Url,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl HttpModelClient {
    pub fn new(config: ModelConfig) -> ModelResult<Self> {
        let mut base = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| ModelError::InvalidRequest {
            message: format!("Invalid base URL: {}", e),
        })?;
        let chat_url = base
            .join("chat/completions")
            .map_err(|e| ModelError::InvalidRequest {
                message: format!("Invalid base URL: {}", e),
            })?;
        let models_url = base.join("models").map_err(|e| ModelError::InvalidRequest {
            message: format!("Invalid base URL: {}", e),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ModelError::Other {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            config,
            client,
            chat_url,
            models_url,
        })
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatCompletionBody<'a> {
        ChatCompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.options.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.options.max_tokens.unwrap_or(self.config.max_tokens),
            stream,
        }
    }

    async fn post_chat(&self, body: &ChatCompletionBody<'_>) -> ModelResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(self.chat_url.clone())
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout {
                    message: e.to_string(),
                }
            } else {
                ModelError::NetworkError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = response.text().await.map_err(|e| ModelError::NetworkError {
                message: e.to_string(),
            })?;
            return Err(parse_http_error(status, &body_text, "http"));
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> ModelResult<Completion> {
        let body = self.build_body(&request, false);
        let response = self.post_chat(&body).await?;

        let body_text = response.text().await.map_err(|e| ModelError::NetworkError {
            message: e.to_string(),
        })?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body_text).map_err(|e| ModelError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ModelError::ParseError {
                message: "Response contained no choices".to_string(),
            })?;

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            usage: parsed.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<String>,
    ) -> ModelResult<Completion> {
        let body = self.build_body(&request, true);
        let response = self.post_chat(&body).await?;

        let mut accumulated = String::new();
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ModelError::NetworkError {
                message: e.to_string(),
            })?;

            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete lines
            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].to_string();
                buffer = buffer[line_end + 1..].to_string();

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Some(payload) = line.strip_prefix("data: ") else {
                    continue;
                };
                if payload == "[DONE]" {
                    continue;
                }

                match serde_json::from_str::<ChatCompletionChunk>(payload) {
                    Ok(chunk) => {
                        if let Some(content) =
                            chunk.choices.first().and_then(|c| c.delta.content.as_ref())
                        {
                            accumulated.push_str(content);
                            let _ = tx.send(content.clone()).await;
                        }
                    }
                    Err(e) => {
                        debug!("Skipping undecodable stream chunk: {}", e);
                    }
                }
            }
        }

        Ok(Completion {
            content: accumulated,
            model: self.config.model.clone(),
            usage: None,
        })
    }

    async fn health_check(&self) -> ModelResult<bool> {
        let mut builder = self.client.get(self.models_url.clone());
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        match builder.send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!("Health check failed to reach endpoint: {}", e);
                Ok(false)
            }
        }
    }
}
