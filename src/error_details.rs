//! AI 请求错误的分类与建议操作
//!
//! [`crate::ai_client::AiError::details`] 把每个远程错误映射为 [`ErrorDetails`]，
//! 供命令行或界面展示。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 配置
    ApiKeyMissing,
    ConfigInvalid,

    // 网络
    NetworkUnreachable,
    NetworkTimeout,

    // HTTP
    HttpBadRequest,
    HttpUnauthorized,
    HttpForbidden,
    HttpNotFound,
    HttpTooManyRequests,
    HttpClientError,
    HttpServerError,

    // 响应内容
    ParseError,
    ServiceError,

    Unknown,
}

impl ErrorCode {
    /// 稍后重试是否可能成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkUnreachable
                | ErrorCode::NetworkTimeout
                | ErrorCode::HttpTooManyRequests
                | ErrorCode::HttpServerError
        )
    }
}

/// 用户操作建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSuggestion {
    pub action_type: String, // "settings", "retry", "check_network"
    pub label: String,
}

impl ActionSuggestion {
    pub fn settings() -> Self {
        Self {
            action_type: "settings".into(),
            label: "打开 AI 设置".into(),
        }
    }

    pub fn retry() -> Self {
        Self {
            action_type: "retry".into(),
            label: "稍后重试".into(),
        }
    }

    pub fn check_network() -> Self {
        Self {
            action_type: "check_network".into(),
            label: "检查网络或代理设置".into(),
        }
    }
}

/// 标准化错误详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    /// 原始错误（日志用）
    pub message: String,
    /// 展示给用户的文本
    pub user_message: String,
    pub suggestions: Vec<ActionSuggestion>,
}

impl ErrorDetails {
    pub fn new(code: ErrorCode, message: impl Into<String>, user_message: impl Into<String>) -> Self {
        let mut details = Self {
            code,
            message: message.into(),
            user_message: user_message.into(),
            suggestions: Vec::new(),
        };
        match code {
            ErrorCode::ApiKeyMissing
            | ErrorCode::ConfigInvalid
            | ErrorCode::HttpUnauthorized
            | ErrorCode::HttpForbidden => details.suggestions.push(ActionSuggestion::settings()),
            ErrorCode::NetworkUnreachable | ErrorCode::NetworkTimeout => {
                details.suggestions.push(ActionSuggestion::check_network());
                details.suggestions.push(ActionSuggestion::retry());
            }
            c if c.is_retryable() => details.suggestions.push(ActionSuggestion::retry()),
            _ => {}
        }
        details
    }
}

/// 从HTTP状态码转换为错误代码
pub fn http_status_to_error_code(status: u16) -> ErrorCode {
    match status {
        400 => ErrorCode::HttpBadRequest,
        401 => ErrorCode::HttpUnauthorized,
        403 => ErrorCode::HttpForbidden,
        404 => ErrorCode::HttpNotFound,
        429 => ErrorCode::HttpTooManyRequests,
        400..=499 => ErrorCode::HttpClientError,
        500..=599 => ErrorCode::HttpServerError,
        _ => ErrorCode::Unknown,
    }
}
