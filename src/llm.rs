//! # LLM Module
//!
//! This module talks to an OpenAI-compatible chat-completions API (x.ai by
//! default). `LLMProvider` is the seam the rest of the crate depends on, and
//! `RemoteLLMClient` is its HTTP implementation.

use crate::chat::{ChatMessage, Role};
use crate::config::LLMConfig;
use crate::error::{Result, ShellChatError};
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// A request to an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    /// The model to use for the request.
    pub model: String,
    /// The messages to send to the model.
    pub messages: Vec<ChatMessage>,
    /// The temperature to use for the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// The maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// A response from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    /// The choices in the response.
    pub choices: Vec<Choice>,
    /// The usage statistics, when the server reports them.
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A choice in an LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

/// The usage statistics for an LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A chunk of a streamed response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    pub choices: Vec<StreamChoice>,
}

/// A choice in a streamed response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

/// The delta of a streamed choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

/// A trait for LLM providers.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Sends the conversation and returns the model's reply.
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<ChatMessage>;

    /// Like `chat`, but hands content to `on_chunk` as it arrives.
    ///
    /// Providers without streaming deliver the whole reply as one chunk.
    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ChatMessage> {
        let reply = self.chat(messages).await?;
        on_chunk(&reply.content);
        Ok(reply)
    }
}

/// A client for a remote chat-completions endpoint.
pub struct RemoteLLMClient {
    config: LLMConfig,
    client: Client,
}

impl RemoteLLMClient {
    /// Creates a new `RemoteLLMClient`.
    pub fn new(config: LLMConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn build_request(&self, messages: Vec<ChatMessage>, stream: bool) -> LLMRequest {
        LLMRequest {
            model: self.config.model_name.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            stream: if stream { Some(true) } else { None },
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send(&self, request: &LLMRequest) -> Result<reqwest::Response> {
        let url = self.endpoint();
        tracing::debug!(
            "POST {} (model {}, {} messages)",
            url,
            request.model,
            request.messages.len()
        );

        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        // Local OpenAI-compatible servers usually run without auth.
        if !is_local_endpoint(&self.config.base_url) {
            request_builder =
                request_builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = request_builder.json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ShellChatError::LLMError(format!(
                "LLM API request failed with status {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Sends a request and returns the raw response.
    pub async fn generate(&self, request: LLMRequest) -> Result<LLMResponse> {
        let response = self.send(&request).await?;
        let llm_response: LLMResponse = response.json().await?;
        if let Some(usage) = &llm_response.usage {
            tracing::debug!(
                "Token usage: {} prompt + {} completion = {}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }
        Ok(llm_response)
    }
}

#[async_trait]
impl LLMProvider for RemoteLLMClient {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<ChatMessage> {
        let request = self.build_request(messages, false);
        let response = self.generate(request).await?;
        first_message(response)
    }

    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ChatMessage> {
        let request = self.build_request(messages, true);
        let response = self.send(&request).await?;

        let mut stream = response.bytes_stream();
        let mut reply = StreamAccumulator::default();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            // Decode whole lines only; a read can end inside a multibyte character.
            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                if let Some(content) = reply.push_line(&String::from_utf8_lossy(&line)) {
                    on_chunk(&content);
                }
            }
        }

        if !buffer.is_empty() {
            if let Some(content) = reply.push_line(&String::from_utf8_lossy(&buffer)) {
                on_chunk(&content);
            }
        }

        Ok(reply.into_message())
    }
}

/// Assembles a streamed reply from server-sent-events lines.
#[derive(Debug, Default)]
struct StreamAccumulator {
    role: Option<String>,
    content: String,
}

impl StreamAccumulator {
    /// Applies one line and returns the content delta it carried, if any.
    fn push_line(&mut self, line: &str) -> Option<String> {
        let stream_chunk = parse_stream_line(line.trim())?;
        let choice = stream_chunk.choices.into_iter().next()?;
        if let Some(role) = choice.delta.role {
            self.role = Some(role);
        }
        let content = choice.delta.content.filter(|c| !c.is_empty())?;
        self.content.push_str(&content);
        Some(content)
    }

    fn into_message(self) -> ChatMessage {
        ChatMessage {
            role: Role::from(self.role.as_deref().unwrap_or("assistant")),
            content: self.content,
        }
    }
}

/// Extracts the first choice's message from a response.
fn first_message(response: LLMResponse) -> Result<ChatMessage> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ShellChatError::LLMError("No response from LLM".to_string()))
}

/// Parses one server-sent-events line. Returns `None` for blank lines, the
/// `[DONE]` sentinel and anything that is not a chunk.
fn parse_stream_line(line: &str) -> Option<StreamChunk> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::debug!("Failed to parse stream chunk: {} - Data: {}", e, data);
            None
        }
    }
}

fn is_local_endpoint(base_url: &str) -> bool {
    base_url.contains("localhost") || base_url.contains("127.0.0.1")
}
