//! 持久化存储
//!
//! 每个 store 对应 `kv_entries` 表中的一个命名空间，只能在已打开的 [`Database`] 上构造。
//! 读操作永不返回错误（损坏或缺失的数据视为空），写操作失败只记录日志。
//!
//! [`Database`]: crate::database::Database

pub mod ai_config;
pub mod analysis_cache;
pub mod custom_questions;
pub mod mistakes;
pub mod progress;

pub use ai_config::{AiConfigStore, AiSettings, ProxySettings};
pub use analysis_cache::AnalysisCacheStore;
pub use custom_questions::CustomQuestionStore;
pub use mistakes::MistakeStore;
pub use progress::ProgressStore;

/// 布尔集合中"存在"的取值
pub(crate) const FLAG_TRUE: &str = "true";
