//! Anthropic Messages API client.
//!
//! Supports plain text, vision (base64 image blocks), forced tool use and
//! streamed responses. Every request goes through [`retry_async`] so rate
//! limits back off under the shared policy.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::retry::{retry_async, RetryConfig};
use crate::types::{MessageRequest, MessageResponse, ResponseBlock};

const SERVICE: &str = "anthropic";

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Text and vision language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one request and return the complete response.
    async fn create_message(&self, request: &MessageRequest) -> ClientResult<MessageResponse>;
}

/// HTTP client for the Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    client: Client,
    retry: RetryConfig,
    timeout: Duration,
}

impl AnthropicClient {
    /// Create a client with the default endpoint, timeout and retry policy.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
            retry: RetryConfig::new("anthropic_message"),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a client from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> ClientResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ClientError::MissingCredential("ANTHROPIC_API_KEY".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry.named("anthropic_message");
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn send_once(&self, request: &MessageRequest) -> ClientResult<MessageResponse> {
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::request(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(SERVICE, status, error_text));
        }

        if request.stream {
            let mut acc = StreamAccumulator::default();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| ClientError::request(SERVICE, e))?;
                acc.push(&chunk)?;
            }
            acc.finish()
        } else {
            response
                .json::<MessageResponse>()
                .await
                .map_err(|e| ClientError::invalid_response(SERVICE, e.to_string()))
        }
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn create_message(&self, request: &MessageRequest) -> ClientResult<MessageResponse> {
        debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            stream = request.stream,
            "Sending message request"
        );

        let response = retry_async(&self.retry, || self.send_once(request)).await?;

        info!(
            model = %request.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
            "Message completed"
        );
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: StreamMessage,
    },
    ContentBlockDelta {
        delta: Delta,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<StreamUsage>,
    },
    Error {
        error: StreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Assembles a streamed response from server-sent event chunks.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; only complete
/// `data:` lines are parsed.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: Vec<u8>,
    text: String,
    response: MessageResponse,
}

impl StreamAccumulator {
    /// Feed one chunk of the event stream.
    pub fn push(&mut self, chunk: &[u8]) -> ClientResult<()> {
        self.buffer.extend_from_slice(chunk);
        while let Some(idx) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=idx).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_line(line.trim_end_matches(['\r', '\n']))?;
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> ClientResult<()> {
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() {
            return Ok(());
        }

        match serde_json::from_str::<StreamEvent>(data)? {
            StreamEvent::MessageStart { message } => {
                if let Some(tokens) = message.usage.and_then(|u| u.input_tokens) {
                    self.response.usage.input_tokens = tokens;
                }
            }
            StreamEvent::ContentBlockDelta {
                delta: Delta::TextDelta { text },
            } => self.text.push_str(&text),
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.response.stop_reason = delta.stop_reason;
                }
                if let Some(tokens) = usage.and_then(|u| u.output_tokens) {
                    self.response.usage.output_tokens = tokens;
                }
            }
            StreamEvent::Error { error } => {
                let message = format!("{}: {}", error.kind, error.message);
                // Overload and rate-limit errors can arrive mid-stream
                return Err(if error.kind == "rate_limit_error" {
                    ClientError::from_status(SERVICE, 429, message)
                } else {
                    ClientError::invalid_response(SERVICE, message)
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Flush any trailing line and return the assembled response.
    pub fn finish(mut self) -> ClientResult<MessageResponse> {
        let rest = std::mem::take(&mut self.buffer);
        self.handle_line(String::from_utf8_lossy(&rest).trim_end())?;
        self.response.content = vec![ResponseBlock::Text { text: self.text }];
        Ok(self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSE: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"id\":\"m\",\"usage\":{\"input_tokens\":12}}}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"# The \"}}\n\n\
event: ping\n\
data: {\"type\":\"ping\"}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Essay\"}}\n\n\
event: message_delta\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":3}}\n\n\
event: message_stop\n\
data: {\"type\":\"message_stop\"}\n\n";

    #[test]
    fn test_accumulator_joins_text_deltas() {
        let mut acc = StreamAccumulator::default();
        acc.push(SSE.as_bytes()).unwrap();
        let resp = acc.finish().unwrap();

        assert_eq!(resp.text(), "# The Essay");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(resp.usage.input_tokens, 12);
        assert_eq!(resp.usage.output_tokens, 3);
    }

    #[test]
    fn test_accumulator_handles_split_chunks() {
        let mut acc = StreamAccumulator::default();
        for piece in SSE.replace("Essay", "Essäy").as_bytes().chunks(7) {
            acc.push(piece).unwrap();
        }
        assert_eq!(acc.finish().unwrap().text(), "# The Essäy");
    }

    #[test]
    fn test_accumulator_surfaces_stream_errors() {
        let mut acc = StreamAccumulator::default();
        let err = acc
            .push(b"data: {\"type\":\"error\",\"error\":{\"type\":\"rate_limit_error\",\"message\":\"slow\"}}\n")
            .unwrap_err();
        assert!(err.is_rate_limited());

        let mut acc = StreamAccumulator::default();
        let err = acc
            .push(b"data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"busy\"}}\n")
            .unwrap_err();
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_from_env_requires_key() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        assert!(matches!(
            AnthropicClient::from_env(),
            Err(ClientError::MissingCredential(_))
        ));
    }
}
