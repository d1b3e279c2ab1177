//! OpenAI-compatible Chat Completions backend.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use super::{ChunkStream, ModelProvider, ModelRequest};
use crate::error::SwitchyardError;
use crate::types::*;

/// Any server speaking the OpenAI Chat Completions protocol.
pub struct OpenAiCompatibleProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Option<reqwest::Client>,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: None,
        }
    }

    /// Use a dedicated client instead of the shared one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    fn client(&self) -> Result<&reqwest::Client, SwitchyardError> {
        match &self.client {
            Some(client) => Ok(client),
            None => shared_client(),
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response, SwitchyardError> {
        let url = format!("{}/{path}", self.base_url);
        let resp = self
            .client()?
            .post(&url)
            .headers(bearer_headers(self.api_key.as_deref()))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &headers, &body_text));
        }
        Ok(resp)
    }
}

fn build_request_body(model: &str, request: &ModelRequest, stream: bool) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = request.messages.iter().map(message_to_wire).collect();

    let mut body = serde_json::Map::new();
    body.insert("model".into(), model.into());
    body.insert("messages".into(), messages.into());
    body.insert("stream".into(), stream.into());
    if stream {
        body.insert("stream_options".into(), serde_json::json!({ "include_usage": true }));
    }

    let settings = &request.settings;
    if let Some(max) = settings.max_tokens {
        body.insert("max_tokens".into(), max.into());
    }
    if let Some(temp) = settings.temperature {
        body.insert("temperature".into(), temp.into());
    }
    if let Some(top_p) = settings.top_p {
        body.insert("top_p".into(), top_p.into());
    }
    if let Some(stops) = &settings.stop_sequences {
        body.insert("stop".into(), serde_json::json!(stops));
    }
    if let Some(pp) = settings.presence_penalty {
        body.insert("presence_penalty".into(), pp.into());
    }
    if let Some(fp) = settings.frequency_penalty {
        body.insert("frequency_penalty".into(), fp.into());
    }
    if let Some(seed) = settings.seed {
        body.insert("seed".into(), seed.into());
    }
    if let Some(effort) = settings.reasoning_effort {
        body.insert("reasoning_effort".into(), effort.to_string().into());
    }
    if let Some(user) = &settings.user {
        body.insert("user".into(), user.clone().into());
    }
    match &settings.response_format {
        Some(ResponseFormat::JsonObject) => {
            body.insert("response_format".into(), serde_json::json!({ "type": "json_object" }));
        }
        Some(ResponseFormat::JsonSchema { schema, name }) => {
            body.insert(
                "response_format".into(),
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": { "name": name, "schema": schema, "strict": true },
                }),
            );
        }
        Some(ResponseFormat::Text) | None => {}
    }

    if !request.tools.is_empty() {
        let tools: Vec<serde_json::Value> = request
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body.insert("tools".into(), tools.into());
        let choice = match &request.tool_choice {
            ToolChoice::Auto => serde_json::json!("auto"),
            ToolChoice::None => serde_json::json!("none"),
            ToolChoice::Required => serde_json::json!("required"),
            ToolChoice::Function { name } => {
                serde_json::json!({ "type": "function", "function": { "name": name } })
            }
        };
        body.insert("tool_choice".into(), choice);
    }

    serde_json::Value::Object(body)
}

fn message_to_wire(msg: &ModelMessage) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if msg.role == Role::Tool {
        // One tool message per result; trailing text (budget countdown) rides along.
        if let Some(result) = msg.tool_results().first() {
            let mut content = match &result.result {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let note = msg.text();
            if !note.is_empty() {
                content.push('\n');
                content.push_str(&note);
            }
            return serde_json::json!({
                "role": "tool",
                "tool_call_id": result.tool_call_id,
                "content": content,
            });
        }
    }

    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let calls: Vec<serde_json::Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments.to_string() },
                })
            })
            .collect();
        let text = msg.text();
        return serde_json::json!({
            "role": role,
            "content": if text.is_empty() { serde_json::Value::Null } else { text.into() },
            "tool_calls": calls,
        });
    }

    if let [ContentPart::Text { text }] = msg.content.as_slice() {
        return serde_json::json!({ "role": role, "content": text });
    }

    let parts: Vec<serde_json::Value> = msg
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
            ContentPart::Image(img) => img
                .as_url()
                .map(|url| serde_json::json!({ "type": "image_url", "image_url": { "url": url } })),
            ContentPart::ToolCall(_) | ContentPart::ToolResult(_) => None,
        })
        .collect();
    serde_json::json!({ "role": role, "content": parts })
}

fn usage_from_wire(u: WireUsage) -> Usage {
    Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
        reasoning_tokens: u
            .completion_tokens_details
            .and_then(|d| d.reasoning_tokens),
    }
}

/// Turns indexed `delta.tool_calls` fragments into lifecycle events.
#[derive(Default)]
struct ToolCallTracker {
    ids_by_index: HashMap<u32, String>,
    open: Vec<String>,
}

impl ToolCallTracker {
    fn push(&mut self, delta: WireToolCallDelta, out: &mut Vec<ModelChunk>) {
        let id = match self.ids_by_index.get(&delta.index) {
            Some(id) => id.clone(),
            None => {
                let id = delta
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("call_{}", delta.index));
                let name = delta
                    .function
                    .as_ref()
                    .and_then(|f| f.name.clone())
                    .unwrap_or_default();
                self.ids_by_index.insert(delta.index, id.clone());
                self.open.push(id.clone());
                out.push(ModelChunk::ToolCall(ToolCallEvent::Start {
                    id: id.clone(),
                    name,
                }));
                id
            }
        };
        if let Some(args) = delta.function.and_then(|f| f.arguments) {
            if !args.is_empty() {
                out.push(ModelChunk::ToolCall(ToolCallEvent::ArgumentsDelta { id, delta: args }));
            }
        }
    }

    fn close_all(&mut self, out: &mut Vec<ModelChunk>) {
        for id in self.open.drain(..) {
            out.push(ModelChunk::ToolCall(ToolCallEvent::End { id }));
        }
    }
}

fn map_stream_chunk(chunk: WireStreamChunk, tracker: &mut ToolCallTracker) -> Vec<ModelChunk> {
    let mut out = Vec::new();
    let mut finish = None;
    for choice in chunk.choices.into_iter().take(1) {
        if let Some(reasoning) = choice.delta.reasoning_content.filter(|r| !r.is_empty()) {
            out.push(ModelChunk::Reasoning(ReasoningDelta::text(reasoning)));
        }
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            out.push(ModelChunk::Content { text });
        }
        for delta in choice.delta.tool_calls.unwrap_or_default() {
            tracker.push(delta, &mut out);
        }
        finish = choice.finish_reason;
    }
    if finish.is_some() {
        tracker.close_all(&mut out);
    }
    let usage = chunk.usage.map(usage_from_wire);
    if finish.is_some() || usage.is_some() {
        out.push(ModelChunk::Finish {
            reason: finish.as_deref().and_then(FinishReason::from_wire),
            usage,
        });
    }
    out
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, model: &str, request: &ModelRequest) -> Result<ModelResponse, SwitchyardError> {
        debug!(provider = %self.name, model, "chat completion");
        let body = build_request_body(model, request, false);
        let data: WireChatResponse = self.post("chat/completions", &body).await?.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SwitchyardError::backend(200, "response contained no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::String(tc.function.arguments)),
            })
            .collect();

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            reasoning: choice
                .message
                .reasoning_content
                .filter(|r| !r.is_empty())
                .map(|text| ReasoningAggregate {
                    text,
                    metadata: Default::default(),
                }),
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::from_wire),
            usage: data.usage.map(usage_from_wire).unwrap_or_default(),
        })
    }

    async fn stream(&self, model: &str, request: &ModelRequest) -> Result<ChunkStream, SwitchyardError> {
        debug!(provider = %self.name, model, "chat completion stream");
        let body = build_request_body(model, request, true);
        let byte_stream = self.post("chat/completions", &body).await?.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::default();
            let mut tracker = ToolCallTracker::default();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(SwitchyardError::Network(e));
                        return;
                    }
                };
                lines.extend(&chunk);

                while let Some(line) = lines.next_line() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = parse_sse_data(line) else {
                        continue;
                    };
                    match serde_json::from_str::<WireStreamChunk>(data) {
                        Ok(parsed) => {
                            for mapped in map_stream_chunk(parsed, &mut tracker) {
                                yield Ok(mapped);
                            }
                        }
                        Err(e) => {
                            yield Err(SwitchyardError::Stream(format!("malformed stream chunk: {e}")));
                            return;
                        }
                    }
                }
            }

            let mut tail = Vec::new();
            tracker.close_all(&mut tail);
            for mapped in tail {
                yield Ok(mapped);
            }
        };

        Ok(Box::pin(stream))
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, SwitchyardError> {
        debug!(provider = %self.name, model, count = inputs.len(), "embeddings");
        let body = serde_json::json!({ "model": model, "input": inputs });
        let mut data: WireEmbeddingResponse = self.post("embeddings", &body).await?.json().await?;
        data.data.sort_by_key(|d| d.index);
        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Byte buffer split into lines before decoding, so a UTF-8 sequence cut by
/// a chunk boundary is reassembled.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }
}

#[derive(Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
    completion_tokens_details: Option<WireCompletionDetails>,
}

#[derive(Deserialize)]
struct WireCompletionDetails {
    reasoning_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireStreamChoice {
    delta: WireStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireStreamDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<WireToolCallDelta>>,
}

#[derive(Deserialize)]
struct WireToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<WireFunctionDelta>,
}

#[derive(Deserialize)]
struct WireFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbedding>,
}

#[derive(Deserialize)]
struct WireEmbedding {
    index: usize,
    embedding: Vec<f32>,
}
