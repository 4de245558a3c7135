//! 远程 AI 客户端
//!
//! 对接 OpenAI 兼容的 chat/completions 接口（默认 OpenRouter）。
//! 仓库与存储层只把它当作"提示词 → 文本（流）"的函数使用，见 [`ChatBackend`]。
//!
//! ## 错误
//! 所有失败都是 [`AiError`]，并可通过 [`AiError::user_message`] 转为展示给用户的文本；
//! 结构化的错误详情（错误码与建议操作）见 [`AiError::details`]。

pub mod parsing;
pub mod prompts;
pub mod types;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, ClientBuilder, Proxy};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error_details::{http_status_to_error_code, ErrorCode, ErrorDetails};
use crate::models::{AnalysisCard, Question};
use crate::stores::AiSettings;
use crate::utils::sse_buffer::{SseLine, SseLineBuffer};
use crate::utils::text::{mask_secret, safe_truncate};
use types::{ChatRequest, ChunkResponse, CompletionResponse};

// ============================================================================
// 错误
// ============================================================================

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("API Key 未配置")]
    MissingApiKey,
    #[error("AI 配置无效: {0}")]
    InvalidConfig(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("网络错误: {0}")]
    Network(String),
    #[error("请求超时")]
    Timeout,
    #[error("响应格式异常: {0}")]
    UnexpectedShape(String),
    #[error("服务商返回错误: {0}")]
    Api(String),
}

impl AiError {
    /// 展示给用户的文本
    pub fn user_message(&self) -> String {
        match self {
            AiError::MissingApiKey => "❌ 错误：未配置 API Key，请在设置中添加。".to_string(),
            AiError::InvalidConfig(msg) => format!("❌ 配置错误：{}", msg),
            AiError::Http { status, body } => match status {
                401 => "❌ 认证失败 (401)：API Key 无效或过期。".to_string(),
                403 => "❌ 拒绝访问 (403)：该地区被禁止或账号异常。".to_string(),
                429 => "❌ 请求过多 (429)：达到速率限制，请稍后重试。".to_string(),
                500 | 502 | 503 => format!("❌ 服务器错误 ({})：AI 服务商暂时不可用。", status),
                _ => {
                    let body = if body.trim().is_empty() {
                        "无详细信息".to_string()
                    } else {
                        safe_truncate(body, 200)
                    };
                    format!("❌ 请求失败 ({})：{}", status, body)
                }
            },
            AiError::Network(_) => "❌ 网络错误：找不到服务器，请检查网络或代理设置。".to_string(),
            AiError::Timeout => "❌ 连接超时：AI 响应太慢，请检查网络。".to_string(),
            AiError::UnexpectedShape(msg) | AiError::Api(msg) => format!("❌ 未知错误：{}", msg),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AiError::MissingApiKey => ErrorCode::ApiKeyMissing,
            AiError::InvalidConfig(_) => ErrorCode::ConfigInvalid,
            AiError::Http { status, .. } => http_status_to_error_code(*status),
            AiError::Network(_) => ErrorCode::NetworkUnreachable,
            AiError::Timeout => ErrorCode::NetworkTimeout,
            AiError::UnexpectedShape(_) => ErrorCode::ParseError,
            AiError::Api(_) => ErrorCode::ServiceError,
        }
    }

    pub fn details(&self) -> ErrorDetails {
        ErrorDetails::new(self.code(), self.to_string(), self.user_message())
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout
        } else if e.is_decode() {
            AiError::UnexpectedShape(e.to_string())
        } else {
            AiError::Network(e.to_string())
        }
    }
}

// ============================================================================
// 后端抽象
// ============================================================================

/// 按到达顺序产出的文本片段；丢弃即取消
pub type TextStream = Pin<Box<dyn futures_util::Stream<Item = Result<String, AiError>> + Send>>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 非流式请求，返回完整文本
    async fn complete(&self, prompt: &str) -> Result<String, AiError>;
    /// 流式请求
    async fn stream(&self, prompt: &str) -> Result<TextStream, AiError>;
}

/// AI 客户端无法创建时的占位后端，每次调用都返回创建时的错误
pub struct UnavailableBackend(pub AiError);

#[async_trait]
impl ChatBackend for UnavailableBackend {
    async fn complete(&self, _prompt: &str) -> Result<String, AiError> {
        Err(self.0.clone())
    }

    async fn stream(&self, _prompt: &str) -> Result<TextStream, AiError> {
        Err(self.0.clone())
    }
}

// ============================================================================
// HTTP 实现
// ============================================================================

#[derive(Debug)]
pub struct AiClient {
    http: Client,
    settings: AiSettings,
    key_cursor: AtomicUsize,
}

impl AiClient {
    pub fn new(settings: AiSettings) -> Result<Self, AiError> {
        url::Url::parse(&settings.base_url)
            .map_err(|e| AiError::InvalidConfig(format!("接口地址无效 {}: {}", settings.base_url, e)))?;

        let mut builder = ClientBuilder::new()
            .connect_timeout(settings.connect_timeout)
            .use_rustls_tls();
        if let Some(proxy) = &settings.proxy {
            let proxy = Proxy::all(proxy.url())
                .map_err(|e| AiError::InvalidConfig(format!("代理设置无效: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| AiError::InvalidConfig(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!(
            "[AiClient] 初始化: model={}, url={}, keys={}, proxy={}",
            settings.model,
            settings.base_url,
            settings.api_keys.len(),
            settings.proxy.is_some()
        );
        Ok(Self {
            http,
            settings,
            key_cursor: AtomicUsize::new(0),
        })
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    /// 轮换取下一个 Key
    fn next_key(&self) -> Result<&str, AiError> {
        let keys = &self.settings.api_keys;
        if keys.is_empty() {
            return Err(AiError::MissingApiKey);
        }
        let index = self.key_cursor.fetch_add(1, Ordering::Relaxed) % keys.len();
        Ok(keys[index].as_str())
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, AiError> {
        let key = self.next_key()?;
        debug!(
            "[AiClient] POST stream={} model={} key={} prompt_chars={}",
            stream,
            self.settings.model,
            mask_secret(key),
            prompt.chars().count()
        );

        let request = self
            .http
            .post(&self.settings.base_url)
            .bearer_auth(key)
            .header("HTTP-Referer", &self.settings.referer)
            .header("X-Title", &self.settings.app_title)
            .json(&ChatRequest::user(&self.settings.model, prompt, stream));

        let response = tokio::time::timeout(self.settings.read_timeout, request.send())
            .await
            .map_err(|_| AiError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "[AiClient] API error {}: {}",
                status,
                safe_truncate(&body, 500)
            );
            return Err(AiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// 解析非流式响应体
pub fn decode_completion(body: &str) -> Result<String, AiError> {
    let response: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        AiError::UnexpectedShape(format!("{}: {}", e, safe_truncate(body, 200)))
    })?;
    match response {
        CompletionResponse::Error(err) => Err(AiError::Api(err.error.message)),
        CompletionResponse::Completion(completion) => completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::UnexpectedShape("响应中没有 choices[0].message.content".into())),
    }
}

/// 解析一行 `data:` 负载；`Ok(None)` 表示该分片没有文本
pub fn decode_chunk(payload: &str) -> Result<Option<String>, AiError> {
    let chunk: ChunkResponse = serde_json::from_str(payload).map_err(|e| {
        AiError::UnexpectedShape(format!("{}: {}", e, safe_truncate(payload, 200)))
    })?;
    match chunk {
        ChunkResponse::Error(err) => Err(AiError::Api(err.error.message)),
        ChunkResponse::Chunk(chunk) => Ok(chunk.delta_text().map(str::to_string)),
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    lines: SseLineBuffer,
    pending: VecDeque<Result<String, AiError>>,
    finished: bool,
    read_timeout: Duration,
}

impl SseState {
    fn consume(&mut self, lines: Vec<String>) {
        for line in lines {
            if self.finished {
                return;
            }
            match SseLineBuffer::classify(&line) {
                SseLine::Data(payload) => match decode_chunk(payload) {
                    Ok(Some(text)) => self.pending.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(e) => {
                        self.pending.push_back(Err(e));
                        self.finished = true;
                    }
                },
                SseLine::Done => self.finished = true,
                SseLine::Ignored => {}
            }
        }
    }
}

/// 把响应体转换为文本流
fn sse_text_stream(response: reqwest::Response, read_timeout: Duration) -> TextStream {
    let state = SseState {
        body: response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed(),
        lines: SseLineBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
        read_timeout,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match tokio::time::timeout(st.read_timeout, st.body.next()).await {
                Err(_) => {
                    st.finished = true;
                    return Some((Err(AiError::Timeout), st));
                }
                Ok(Some(Ok(bytes))) => {
                    let lines = st.lines.process_bytes(&bytes);
                    st.consume(lines);
                }
                Ok(Some(Err(e))) => {
                    st.finished = true;
                    return Some((Err(AiError::from(e)), st));
                }
                Ok(None) => {
                    if let Some(rest) = st.lines.flush() {
                        st.consume(vec![rest]);
                    }
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl ChatBackend for AiClient {
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let response = self.send(prompt, false).await?;
        let body = tokio::time::timeout(self.settings.read_timeout, response.text())
            .await
            .map_err(|_| AiError::Timeout)??;
        decode_completion(&body)
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, AiError> {
        let response = self.send(prompt, true).await?;
        Ok(sse_text_stream(response, self.settings.read_timeout))
    }
}

// ============================================================================
// 业务方法
// ============================================================================

/// 单题解析（流式）
pub async fn explain_question(
    backend: &dyn ChatBackend,
    question: &Question,
) -> Result<TextStream, AiError> {
    backend.stream(&prompts::explain_prompt(question)).await
}

/// 错题弱点分析；没有错题时返回提示卡片，请求失败时返回错误
pub async fn analyze_weakness(
    backend: &dyn ChatBackend,
    mistakes: &[Question],
) -> Result<Vec<AnalysisCard>, AiError> {
    if mistakes.is_empty() {
        return Ok(vec![AnalysisCard::new("暂无错题", "快去刷题吧！")]);
    }
    let content = backend.complete(&prompts::weakness_prompt(mistakes)).await?;
    let cards = parsing::parse_analysis_cards(&content);
    info!("[AiClient] 弱点分析完成，生成 {} 张卡片", cards.len());
    Ok(cards)
}

/// 按关键词生成题目
pub async fn generate_questions(
    backend: &dyn ChatBackend,
    keyword: &str,
    count: usize,
) -> Result<Vec<Question>, AiError> {
    let content = backend
        .complete(&prompts::generation_prompt(keyword, count))
        .await?;
    let questions = parsing::parse_generated_questions(
        &content,
        keyword,
        chrono::Utc::now().timestamp_millis(),
    )?;
    info!(
        "[AiClient] 关键词 {} 生成 {} 道题（请求 {} 道）",
        keyword,
        questions.len(),
        count
    );
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_decode_completion_shapes() {
        let ok = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"桂枝汤"}}]}"#;
        assert_eq!(decode_completion(ok).unwrap(), "桂枝汤");

        let err = r#"{"error":{"message":"Insufficient credits","code":402}}"#;
        assert_eq!(
            decode_completion(err).unwrap_err(),
            AiError::Api("Insufficient credits".into())
        );

        assert_matches!(
            decode_completion(r#"{"choices":[]}"#),
            Err(AiError::UnexpectedShape(_))
        );
        assert_matches!(decode_completion("<html>"), Err(AiError::UnexpectedShape(_)));
    }

    #[test]
    fn test_decode_chunk() {
        assert_eq!(
            decode_chunk(r#"{"choices":[{"delta":{"content":"太阳"}}]}"#).unwrap(),
            Some("太阳".to_string())
        );
        assert_eq!(decode_chunk(r#"{"choices":[{"delta":{}}]}"#).unwrap(), None);
        assert_eq!(decode_chunk(r#"{"choices":[],"usage":{}}"#).unwrap(), None);
        assert_matches!(decode_chunk("[1,2"), Err(AiError::UnexpectedShape(_)));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            AiError::MissingApiKey.user_message(),
            "❌ 错误：未配置 API Key，请在设置中添加。"
        );
        let http = |status| AiError::Http {
            status,
            body: "quota".into(),
        };
        assert_eq!(http(401).user_message(), "❌ 认证失败 (401)：API Key 无效或过期。");
        assert!(http(502).user_message().starts_with("❌ 服务器错误 (502)"));
        assert_eq!(http(404).user_message(), "❌ 请求失败 (404)：quota");
        assert_eq!(http(429).code(), ErrorCode::HttpTooManyRequests);
        assert_eq!(AiError::Timeout.details().code, ErrorCode::NetworkTimeout);
    }

    #[test]
    fn test_missing_key_fails_before_request() {
        let settings = AiSettings::from_defaults(&crate::config::AiDefaults::default());
        let client = AiClient::new(settings).unwrap();
        assert_eq!(client.next_key().unwrap_err(), AiError::MissingApiKey);
    }

    #[test]
    fn test_keys_rotate() {
        let mut settings = AiSettings::from_defaults(&crate::config::AiDefaults::default());
        settings.api_keys = vec!["k1".into(), "k2".into()];
        let client = AiClient::new(settings).unwrap();
        let picked: Vec<String> = (0..3).map(|_| client.next_key().unwrap().to_string()).collect();
        assert_eq!(picked, vec!["k1", "k2", "k1"]);
    }

    #[test]
    fn test_invalid_base_url() {
        let mut settings = AiSettings::from_defaults(&crate::config::AiDefaults::default());
        settings.base_url = "not a url".into();
        assert_matches!(AiClient::new(settings), Err(AiError::InvalidConfig(_)));
    }
}
