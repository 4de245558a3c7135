//! chat/completions 请求与响应结构

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

impl<'a> ChatRequest<'a> {
    pub fn user(model: &'a str, prompt: &'a str, stream: bool) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream,
        }
    }
}

/// 非流式响应
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// 流式响应中的一个 `data:` 分片
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// 服务商在 200 响应体或错误响应体中返回的错误
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

/// 一次响应可能的形态
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CompletionResponse {
    Error(ApiErrorBody),
    Completion(ChatCompletion),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChunkResponse {
    Error(ApiErrorBody),
    Chunk(ChatCompletionChunk),
}

impl ChatCompletionChunk {
    /// 第一个 choice 的增量文本（空串视为无内容）
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}
