//! 应用配置
//!
//! 加载顺序：内置默认值 → `config/quiz.toml`（可选）→ `QUIZ__*` 环境变量（含 `.env`）。
//! AI 相关配置在运行时还会被 `quiz_ai_config` 命名空间中用户保存的设置覆盖，
//! 见 [`crate::stores::ai_config::AiConfigStore::settings`]。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// 题库文件默认路径
pub const DEFAULT_QUESTION_BANK: &str = "assets/questions_full.json";
/// 不出现在"按题型"列表中的分类标记（配伍题）
pub const DEFAULT_EXCLUDED_CATEGORY_MARKER: &str = "B型";
pub const DEFAULT_AI_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "x-ai/grok-4.1-fast";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 数据目录（SQLite 文件所在位置）
    pub data_dir: PathBuf,
    pub database_file: String,
    pub question_bank_path: PathBuf,
    pub excluded_category_marker: String,
    pub ai: AiDefaults,
}

/// AI 接口的默认参数（用户未在设置中覆盖时生效）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiDefaults {
    /// 完整的 chat/completions 地址
    pub base_url: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// 请求头 `X-Title`
    pub app_title: String,
    /// 请求头 `HTTP-Referer`
    pub referer: String,
}

impl Default for AiDefaults {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            model: DEFAULT_AI_MODEL.to_string(),
            connect_timeout_secs: 15,
            read_timeout_secs: 60,
            app_title: "ShangHanLun Quiz".to_string(),
            referer: "https://github.com/medical-quiz".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("medical-quiz");
        Self {
            data_dir,
            database_file: "quiz.db".to_string(),
            question_bank_path: PathBuf::from(DEFAULT_QUESTION_BANK),
            excluded_category_marker: DEFAULT_EXCLUDED_CATEGORY_MARKER.to_string(),
            ai: AiDefaults::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        // 环境变量覆盖文件配置
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/quiz").required(false))
            .add_source(
                config::Environment::with_prefix("QUIZ")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let loaded = match builder.build() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("[Config] 配置源解析失败，使用默认配置: {}", e);
                return Ok(Self::default());
            }
        };

        match loaded.try_deserialize::<serde_json::Value>() {
            Ok(value) => Ok(serde_json::from_value::<AppConfig>(value).unwrap_or_else(|e| {
                warn!("[Config] 配置字段无效，使用默认配置: {}", e);
                Self::default()
            })),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let value = serde_json::json!({
            "database_file": "test.db",
            "ai": { "model": "deepseek/deepseek-chat" }
        });
        let cfg: AppConfig = serde_json::from_value(value).unwrap();
        assert_eq!(cfg.database_file, "test.db");
        assert_eq!(cfg.ai.model, "deepseek/deepseek-chat");
        assert_eq!(cfg.ai.base_url, DEFAULT_AI_BASE_URL);
        assert_eq!(cfg.ai.connect_timeout_secs, 15);
        assert_eq!(cfg.excluded_category_marker, "B型");
        assert!(cfg.database_path().ends_with("test.db"));
    }
}
