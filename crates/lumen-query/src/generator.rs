//! Answer generators: a streaming OpenAI-compatible chat client and a
//! scripted generator that replays fixed fragments.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use lumen_core::config::OpenAiSettings;
use lumen_core::traits::{FragmentStream, Generator};
use lumen_core::{Error, Result};

/// `/chat/completions` with `stream: true`, decoded from server-sent events.
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(settings: &OpenAiSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingCredential("OpenAI API key is not set".to_string()))?
            .to_string();
        // Bounds connecting and each read, not the whole streamed body.
        let limit = Duration::from_secs(settings.request_timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(limit)
            .read_timeout(limit)
            .build()
            .map_err(|e| Error::Generation(format!("HTTP client error: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.chat_model.clone(),
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl Generator for OpenAiChat {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream> {
        debug!("Streaming completion from {}", self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "stream": true,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("{status}: {body}")));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| Error::Generation(e.to_string())))
            .boxed();
        Ok(sse_fragments(body))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Fragment(String),
    Done,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    content: Option<String>,
}

/// Incremental `data:` line decoder. Bytes are buffered until a full line
/// arrives so multi-byte characters split across reads survive.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim_end_matches(['\r', '\n']))? {
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn parse_line(line: &str) -> Result<Option<SseEvent>> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| Error::Generation(format!("malformed event: {e}")))?;
    if let Some(error) = value.get("error") {
        return Err(Error::Generation(error.to_string()));
    }
    let chunk: ChatChunk =
        serde_json::from_value(value).map_err(|e| Error::Generation(format!("malformed event: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty())
        .map(SseEvent::Fragment))
}

struct SseState {
    body: BoxStream<'static, Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Fragments of an SSE body, ending at `[DONE]` or end of body.
pub fn sse_fragments(body: BoxStream<'static, Result<Vec<u8>>>) -> FragmentStream {
    let state = SseState { body, decoder: SseDecoder::default(), pending: VecDeque::new(), finished: false };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.pending.pop_front() {
                return Some((Ok(fragment), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => match st.decoder.push(&bytes) {
                    Ok(events) => {
                        for event in events {
                            match event {
                                SseEvent::Fragment(f) if !st.finished => st.pending.push_back(f),
                                SseEvent::Fragment(_) => {}
                                SseEvent::Done => st.finished = true,
                            }
                        }
                    }
                    Err(e) => {
                        st.finished = true;
                        st.pending.clear();
                        return Some((Err(e), st));
                    }
                },
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => st.finished = true,
            }
        }
    })
    .boxed()
}

/// Replays a fixed list of fragments, optionally failing after them.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    fail_with: Option<String>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fragments: fragments.into_iter().map(Into::into).collect(), fail_with: None }
    }

    #[must_use]
    pub fn failing_after(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn stream(&self, _prompt: &str) -> Result<FragmentStream> {
        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.fail_with {
            items.push(Err(Error::Generation(message.clone())));
        }
        Ok(stream::iter(items).boxed())
    }
}
