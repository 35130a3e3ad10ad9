//! Network collaborators for the essay pipeline.
//!
//! All outbound API calls share the rate-limit backoff policy in [`retry`].

pub mod anthropic;
pub mod deepgram;
pub mod error;
pub mod json;
pub mod metrics;
pub mod retry;
pub mod types;

pub use anthropic::{AnthropicClient, LanguageModel, StreamAccumulator};
pub use deepgram::{DeepgramClient, SpeechToText};
pub use error::{ClientError, ClientResult};
pub use json::{parse_json_response, strip_code_fences};
pub use retry::{retry_async, RetryConfig, Retryable, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use types::{ContentBlock, Message, MessageRequest, MessageResponse, ResponseBlock, Role, Tool, Usage};
