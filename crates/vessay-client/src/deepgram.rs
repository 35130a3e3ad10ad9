//! Deepgram speech-to-text client with diarization.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use vessay_models::Utterance;

use crate::error::{ClientError, ClientResult};
use crate::retry::{retry_async, RetryConfig};

const SERVICE: &str = "deepgram";

pub const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";
pub const DEFAULT_MODEL: &str = "nova-3";

/// Speech-to-text service returning speaker-attributed utterances.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> ClientResult<Vec<Utterance>>;
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    utterances: Option<Vec<Utterance>>,
}

/// HTTP client for `POST /v1/listen`.
#[derive(Debug, Clone)]
pub struct DeepgramClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
    retry: RetryConfig,
    timeout: Duration,
}

impl DeepgramClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
            retry: RetryConfig::new("deepgram_listen"),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry.named("deepgram_listen");
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn listen_once(&self, audio: &[u8], mime_type: &str) -> ClientResult<Vec<Utterance>> {
        let url = format!("{}/v1/listen", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("model", self.model.as_str()),
                ("smart_format", "true"),
                ("utterances", "true"),
                ("diarize", "true"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", mime_type)
            .timeout(self.timeout)
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| ClientError::request(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(SERVICE, status, error_text));
        }

        let body: ListenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response(SERVICE, e.to_string()))?;

        body.results
            .utterances
            .ok_or_else(|| ClientError::invalid_response(SERVICE, "response has no utterances"))
    }
}

#[async_trait]
impl SpeechToText for DeepgramClient {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> ClientResult<Vec<Utterance>> {
        let size_mb = audio.len() as f64 / (1024.0 * 1024.0);
        info!(size_mb, model = %self.model, "Sending audio for transcription");

        let utterances = retry_async(&self.retry, || self.listen_once(&audio, mime_type)).await?;

        let speakers = utterances
            .iter()
            .map(|u| u.speaker)
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        info!(utterances = utterances.len(), speakers, "Transcription complete");
        Ok(utterances)
    }
}
