//! AI 接口设置
//!
//! 用户在设置中填写的值保存在 `quiz_ai_config` 命名空间，未填写时使用
//! [`AiDefaults`] 中的默认值。API Key 支持多行，每行一个，请求时轮换使用。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::{AiDefaults, DEFAULT_AI_BASE_URL, DEFAULT_AI_MODEL};
use crate::database::{Database, KvNamespace};
use crate::utils::text::mask_secret;

pub const AI_CONFIG_NAMESPACE: &str = "quiz_ai_config";

const KEY_API_KEYS: &str = "api_keys";
const KEY_MODEL: &str = "model";
const KEY_BASE_URL: &str = "base_url";
const KEY_ENABLE_PROXY: &str = "enable_proxy";
const KEY_PROXY_HOST: &str = "proxy_host";
const KEY_PROXY_PORT: &str = "proxy_port";

pub const DEFAULT_PROXY_HOST: &str = "127.0.0.1";
pub const DEFAULT_PROXY_PORT: u16 = 7890;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
}

impl ProxySettings {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// 发起请求所需的完整设置
#[derive(Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub api_keys: Vec<String>,
    pub model: String,
    pub base_url: String,
    pub proxy: Option<ProxySettings>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub app_title: String,
    pub referer: String,
}

impl std::fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked: Vec<String> = self.api_keys.iter().map(|k| mask_secret(k)).collect();
        f.debug_struct("AiSettings")
            .field("api_keys", &masked)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("proxy", &self.proxy)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl AiSettings {
    /// 由默认值构造（不含 Key）
    pub fn from_defaults(defaults: &AiDefaults) -> Self {
        Self {
            api_keys: Vec::new(),
            model: defaults.model.clone(),
            base_url: defaults.base_url.clone(),
            proxy: None,
            connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
            read_timeout: Duration::from_secs(defaults.read_timeout_secs),
            app_title: defaults.app_title.clone(),
            referer: defaults.referer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AiConfigStore {
    ns: KvNamespace,
}

impl AiConfigStore {
    pub fn open(db: Arc<Database>) -> Self {
        Self {
            ns: KvNamespace::new(db, AI_CONFIG_NAMESPACE),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.ns.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("[AiConfig] 读取 {} 失败: {}", key, e);
                None
            }
        }
    }

    fn read_non_empty(&self, key: &str) -> Option<String> {
        self.read(key).filter(|v| !v.trim().is_empty())
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.ns.put(key, value) {
            warn!("[AiConfig] 保存 {} 失败: {}", key, e);
        }
    }

    /// 原始多行文本
    pub fn api_keys(&self) -> String {
        self.read(KEY_API_KEYS).unwrap_or_default()
    }

    pub fn set_api_keys(&self, keys: &str) {
        self.write(KEY_API_KEYS, keys);
    }

    /// 去掉空行后的 Key 列表
    pub fn key_list(&self) -> Vec<String> {
        self.api_keys()
            .lines()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn model(&self) -> String {
        self.read_non_empty(KEY_MODEL)
            .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string())
    }

    pub fn set_model(&self, model: &str) {
        self.write(KEY_MODEL, model);
    }

    pub fn base_url(&self) -> String {
        self.read_non_empty(KEY_BASE_URL)
            .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string())
    }

    pub fn set_base_url(&self, url: &str) {
        self.write(KEY_BASE_URL, url);
    }

    pub fn enable_proxy(&self) -> bool {
        self.read(KEY_ENABLE_PROXY).as_deref() == Some("true")
    }

    pub fn set_enable_proxy(&self, enabled: bool) {
        self.write(KEY_ENABLE_PROXY, if enabled { "true" } else { "false" });
    }

    pub fn proxy_host(&self) -> String {
        self.read_non_empty(KEY_PROXY_HOST)
            .unwrap_or_else(|| DEFAULT_PROXY_HOST.to_string())
    }

    pub fn set_proxy_host(&self, host: &str) {
        self.write(KEY_PROXY_HOST, host.trim());
    }

    /// 无法解析的端口按默认端口处理
    pub fn proxy_port(&self) -> u16 {
        self.read_non_empty(KEY_PROXY_PORT)
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PROXY_PORT)
    }

    pub fn set_proxy_port(&self, port: u16) {
        self.write(KEY_PROXY_PORT, &port.to_string());
    }

    pub fn is_configured(&self) -> bool {
        !self.key_list().is_empty()
    }

    /// 合并用户设置与默认值
    pub fn settings(&self, defaults: &AiDefaults) -> AiSettings {
        let mut settings = AiSettings::from_defaults(defaults);
        settings.api_keys = self.key_list();
        if let Some(model) = self.read_non_empty(KEY_MODEL) {
            settings.model = model.trim().to_string();
        }
        if let Some(url) = self.read_non_empty(KEY_BASE_URL) {
            settings.base_url = url.trim().to_string();
        }
        if self.enable_proxy() {
            settings.proxy = Some(ProxySettings {
                host: self.proxy_host(),
                port: self.proxy_port(),
            });
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AiConfigStore {
        AiConfigStore::open(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_defaults_when_unset() {
        let store = store();
        assert_eq!(store.model(), DEFAULT_AI_MODEL);
        assert_eq!(store.base_url(), DEFAULT_AI_BASE_URL);
        assert_eq!(store.proxy_host(), "127.0.0.1");
        assert_eq!(store.proxy_port(), 7890);
        assert!(!store.enable_proxy());
        assert!(!store.is_configured());
    }

    #[test]
    fn test_multi_line_keys() {
        let store = store();
        store.set_api_keys("sk-one\n\n  sk-two  \n");
        assert_eq!(store.key_list(), vec!["sk-one", "sk-two"]);
        assert!(store.is_configured());
    }

    #[test]
    fn test_settings_merges_overrides() {
        let store = store();
        let defaults = AiDefaults::default();
        store.set_api_keys("sk-one");
        store.set_model("deepseek/deepseek-chat");
        store.set_enable_proxy(true);
        store.set_proxy_port(1080);

        let settings = store.settings(&defaults);
        assert_eq!(settings.model, "deepseek/deepseek-chat");
        assert_eq!(settings.base_url, defaults.base_url);
        assert_eq!(settings.connect_timeout, Duration::from_secs(15));
        assert_eq!(
            settings.proxy.as_ref().map(ProxySettings::url).as_deref(),
            Some("http://127.0.0.1:1080")
        );
        assert!(!format!("{:?}", settings).contains("sk-one"));
    }
}
