//! OpenAI-compatible LLM client (chat completions, SSE streaming).
//!
//! Works against any provider exposing the OpenAI wire format (OpenAI,
//! Groq, DeepSeek, a local server).

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::{GenerationRequest, LlmError, LlmPort, TokenStream};

/// Default base URL for the OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        // LLM requests can be slow; allow two minutes end to end.
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Create a client from `STORYLOOM_LLM_BASE_URL` / `STORYLOOM_LLM_API_KEY`,
    /// falling back to the OpenAI defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("STORYLOOM_LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let api_key = std::env::var("STORYLOOM_LLM_API_KEY").ok();
        Self::new(&base_url, api_key)
    }
}

#[async_trait]
impl LlmPort for OpenAiClient {
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TokenStream, LlmError> {
        let api_request = ChatCompletionRequest {
            model: request.model,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
            temperature: Some(request.temperature),
            stream: true,
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&api_request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("(unreadable body: {e})"));
            return Err(LlmError::RequestFailed(format!("{status}: {error_text}")));
        }

        Ok(sse_token_stream(Box::pin(response.bytes_stream())))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>;

struct SseState {
    inner: ByteStream,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn an SSE body (`data: {...}` lines, `data: [DONE]` terminator) into a
/// stream of content fragments.
fn sse_token_stream(inner: ByteStream) -> TokenStream {
    let state = SseState {
        inner,
        buffer: String::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                None => {
                    state.done = true;
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LlmError::RequestFailed(e.to_string())), state));
                }
                Some(Ok(bytes)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(pos) = state.buffer.find('\n') {
                        let line: String = state.buffer.drain(..=pos).collect();
                        let line = line.trim();
                        let Some(data) = line.strip_prefix("data:") else {
                            continue;
                        };
                        let data = data.trim();
                        if data == "[DONE]" {
                            state.done = true;
                            break;
                        }
                        match serde_json::from_str::<ChatCompletionChunk>(data) {
                            Ok(chunk) => {
                                if let Some(content) = chunk
                                    .choices
                                    .into_iter()
                                    .next()
                                    .and_then(|c| c.delta.content)
                                {
                                    if !content.is_empty() {
                                        state.pending.push_back(content);
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::debug!("Skipping unparseable SSE chunk: {e}");
                            }
                        }
                    }
                }
            }
        }
    }))
}

// =============================================================================
// OpenAI API types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}
