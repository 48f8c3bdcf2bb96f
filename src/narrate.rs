// src/narrate.rs
//
// Narration collaborator: streams a briefing from the Anthropic Messages API
// and hands text chunks to the caller as they arrive. One request per
// invocation, consumed synchronously; transport failures surface as typed
// errors and are never retried here.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;

#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("invalid ANTHROPIC_API_KEY: authentication rejected")]
    AuthRejected,
    #[error("narration rate limit reached; try again shortly")]
    RateLimited,
    #[error("could not reach the narration API: {0}")]
    Connection(String),
    #[error("narration API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("malformed narration stream: {0}")]
    Stream(String),
}

#[async_trait]
pub trait Narrator {
    /// Generate the briefing text. `on_text` is invoked for each streamed
    /// chunk; the full concatenated text is returned for saving.
    async fn narrate(
        &self,
        system: &str,
        content: &str,
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, NarrationError>;
}

pub struct AnthropicNarrator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicNarrator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/* -------------------------
   Stream wire format
--------------------------*/

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    message: Option<MessageStart>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[async_trait]
impl Narrator for AnthropicNarrator {
    async fn narrate(
        &self,
        system: &str,
        content: &str,
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, NarrationError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "stream": true,
            "system": system,
            "messages": [{"role": "user", "content": content}],
        });

        let resp = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| NarrationError::Connection(e.to_string()))?;

        let status = resp.status().as_u16();
        match status {
            200..=299 => {}
            401 => return Err(NarrationError::AuthRejected),
            429 => return Err(NarrationError::RateLimited),
            _ => {
                let body = resp.text().await.unwrap_or_default();
                return Err(NarrationError::Api { status, body });
            }
        }

        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        let mut text = String::new();
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| NarrationError::Connection(e.to_string()))?;
            buf.extend_from_slice(&chunk);

            // Server-sent events arrive line-delimited; only `data:` lines
            // carry payloads.
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let Some(data) = line.trim().strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                let event: StreamEvent = serde_json::from_str(data)
                    .map_err(|e| NarrationError::Stream(e.to_string()))?;
                match event.kind.as_str() {
                    "content_block_delta" => {
                        if let Some(delta) = event.delta {
                            if delta.kind == "text_delta" {
                                if let Some(t) = delta.text {
                                    on_text(&t);
                                    text.push_str(&t);
                                }
                            }
                        }
                    }
                    "message_start" => {
                        if let Some(m) = event.message {
                            input_tokens = m.usage.input_tokens.unwrap_or(0);
                        }
                    }
                    "message_delta" => {
                        if let Some(u) = event.usage {
                            output_tokens = u.output_tokens.unwrap_or(output_tokens);
                        }
                    }
                    "error" => {
                        return Err(NarrationError::Stream(data.to_string()));
                    }
                    _ => {}
                }
            }
        }

        tracing::info!(
            "Narration complete. Input tokens: {input_tokens}, output tokens: {output_tokens}"
        );
        Ok(text)
    }
}

/// Canned narrator for tests: returns a fixed briefing without any network.
pub struct MockNarrator {
    response: String,
}

impl MockNarrator {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn narrate(
        &self,
        _system: &str,
        _content: &str,
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, NarrationError> {
        on_text(&self.response);
        Ok(self.response.clone())
    }
}
