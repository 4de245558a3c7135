// Medical Quiz library entry
// 题库索引、错题/进度追踪与 AI 解析的核心逻辑，供 bin 目标与测试使用。

pub mod ai_client;
pub mod config;
pub mod database;
pub mod error_details;
pub mod grading;
pub mod models;
pub mod question_repository;
pub mod quiz_service;
pub mod stores;
pub mod utils;

use anyhow::Context;
use std::sync::Arc;

use crate::ai_client::{AiClient, ChatBackend};
use crate::config::AppConfig;
use crate::database::Database;
use crate::question_repository::{BankSource, QuestionRepository};
use crate::quiz_service::QuizService;
use crate::stores::{
    AiConfigStore, AnalysisCacheStore, CustomQuestionStore, MistakeStore, ProgressStore,
};

/// 按配置打开数据库、构造各个 store 并启动服务
///
/// 必须在 tokio 运行时中调用。AI 客户端创建失败（如代理配置无效）不影响题库功能，
/// 此时 AI 相关操作会返回对应的错误提示。
pub fn bootstrap(config: &AppConfig) -> anyhow::Result<QuizService> {
    let db = Arc::new(
        Database::new(&config.database_path())
            .with_context(|| format!("初始化数据库失败: {:?}", config.database_path()))?,
    );

    let ai_settings = AiConfigStore::open(db.clone()).settings(&config.ai);
    let backend: Arc<dyn ChatBackend> = match AiClient::new(ai_settings) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!("[Bootstrap] AI 客户端不可用: {}", e);
            Arc::new(ai_client::UnavailableBackend(e))
        }
    };

    let repo = QuestionRepository::new(
        BankSource::File(config.question_bank_path.clone()),
        config.excluded_category_marker.clone(),
        CustomQuestionStore::open(db.clone()),
        MistakeStore::open(db.clone()),
        ProgressStore::open(db.clone()),
    );
    Ok(QuizService::spawn(repo, AnalysisCacheStore::open(db), backend))
}
