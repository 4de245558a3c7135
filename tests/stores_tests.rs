//! 持久化存储集成测试：重新打开数据库后数据仍在

use medical_quiz_lib::config::AiDefaults;
use medical_quiz_lib::database::Database;
use medical_quiz_lib::models::{AnalysisCard, Question, QuestionType};
use medical_quiz_lib::stores::{
    AiConfigStore, AnalysisCacheStore, CustomQuestionStore, MistakeStore, ProgressStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct TestDb {
    _dir: TempDir,
    path: PathBuf,
}

impl TestDb {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("data").join("quiz.db");
        Self { _dir: dir, path }
    }

    fn open(&self) -> Arc<Database> {
        Arc::new(Database::new(&self.path).expect("Failed to open database"))
    }
}

fn essay(id: &str, chapter: &str) -> Question {
    Question {
        id: id.to_string(),
        number: 0,
        chapter: chapter.to_string(),
        category: "论述题".to_string(),
        kind: QuestionType::Essay,
        content: "试述桂枝汤的配伍意义".to_string(),
        options: Vec::new(),
        answer: "略".to_string(),
        analysis: "暂无".to_string(),
    }
}

#[test]
fn test_mistakes_keep_recording_order_after_reopen() {
    let db = TestDb::new();
    {
        let mistakes = MistakeStore::open(db.open());
        mistakes.mark("q3");
        mistakes.mark("q1");
        mistakes.mark("q2");
        mistakes.unmark("q1");
        mistakes.mark("q1");
    }

    let mistakes = MistakeStore::open(db.open());
    assert_eq!(mistakes.mistake_ids(), vec!["q3", "q2", "q1"]);
    assert_eq!(mistakes.count(), 3);
    // 重新打开后计数器从 0 开始
    assert_eq!(mistakes.change_counter(), 0);
}

#[test]
fn test_progress_survives_reopen() {
    let db = TestDb::new();
    {
        let progress = ProgressStore::open(db.open());
        progress.mark("a");
        progress.mark("b");
        progress.mark("a");
    }

    let progress = ProgressStore::open(db.open());
    assert_eq!(progress.completed_count(), 2);
    assert!(progress.contains("a"));
    assert_eq!(progress.remove_many(&["a".to_string(), "zzz".to_string()]), 1);
    assert_eq!(progress.completed_count(), 1);
}

#[test]
fn test_custom_questions_reload_and_delete_by_chapter() {
    let db = TestDb::new();
    {
        let mut store = CustomQuestionStore::open(db.open());
        assert_eq!(
            store.save(&[essay("c1", "联网搜索: 小柴胡汤"), essay("c2", "联网搜索: 麻黄汤")]),
            2
        );
    }

    let mut store = CustomQuestionStore::open(db.open());
    assert_eq!(store.get_all().len(), 2);
    assert_eq!(store.delete_by_chapter("联网搜索: 小柴胡汤"), 1);

    let store = CustomQuestionStore::open(db.open());
    let ids: Vec<&str> = store.get_all().iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["c2"]);
}

#[test]
fn test_analysis_cache_is_replaced_wholesale() {
    let db = TestDb::new();
    let handle = db.open();
    let cache = AnalysisCacheStore::open(handle.clone());
    assert!(!cache.has_data());

    cache.save(&[
        AnalysisCard::new("桂枝汤证", "- **易错点**：与麻黄汤证混淆"),
        AnalysisCard::new("小柴胡汤证", "- **辨证眼目**：往来寒热"),
    ]);
    cache.save(&[AnalysisCard::new("白虎汤证", "- 四大症")]);

    let reopened = AnalysisCacheStore::open(db.open());
    assert!(reopened.has_data());
    assert_eq!(reopened.get(), vec![AnalysisCard::new("白虎汤证", "- 四大症")]);
}

#[test]
fn test_ai_config_builds_settings() {
    let db = TestDb::new();
    let defaults = AiDefaults::default();
    {
        let config = AiConfigStore::open(db.open());
        assert!(!config.is_configured());
        config.set_api_keys("sk-one\n  sk-two\n\nsk-three\n");
        config.set_model("deepseek/deepseek-chat");
        config.set_enable_proxy(true);
        config.set_proxy_port(1080);
    }

    let config = AiConfigStore::open(db.open());
    assert!(config.is_configured());
    let settings = config.settings(&defaults);
    assert_eq!(settings.api_keys, vec!["sk-one", "sk-two", "sk-three"]);
    assert_eq!(settings.model, "deepseek/deepseek-chat");
    assert_eq!(settings.base_url, defaults.base_url);
    assert_eq!(
        settings.proxy.map(|p| p.url()),
        Some("http://127.0.0.1:1080".to_string())
    );

    // Debug 输出不包含完整 Key
    let debug = format!("{:?}", config.settings(&defaults));
    assert!(!debug.contains("sk-three"));
}
