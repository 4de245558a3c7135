//! AI 生成题目的本地存储
//!
//! 整个列表以一个 JSON 值保存在 `saved_questions` 键下，打开时读入内存缓存。

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::{Database, KvNamespace};
use crate::models::Question;

pub const CUSTOM_QUESTION_NAMESPACE: &str = "custom_questions_db";
const KEY_QUESTIONS: &str = "saved_questions";

pub struct CustomQuestionStore {
    ns: KvNamespace,
    cache: Vec<Question>,
}

impl CustomQuestionStore {
    pub fn open(db: Arc<Database>) -> Self {
        let ns = KvNamespace::new(db, CUSTOM_QUESTION_NAMESPACE);
        let cache = match ns.get(KEY_QUESTIONS) {
            Ok(Some(json)) => serde_json::from_str::<Vec<Question>>(&json).unwrap_or_else(|e| {
                warn!("[CustomQuestionStore] 已保存的题目无法解析，按空处理: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("[CustomQuestionStore] 读取已保存题目失败: {}", e);
                Vec::new()
            }
        };
        Self { ns, cache }
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.cache) {
            Ok(json) => json,
            Err(e) => {
                warn!("[CustomQuestionStore] 序列化失败: {}", e);
                return;
            }
        };
        if let Err(e) = self.ns.put(KEY_QUESTIONS, &json) {
            warn!("[CustomQuestionStore] 写入失败: {}", e);
        }
    }

    /// 追加保存，已存在的 id 会被跳过；返回实际新增的数量
    pub fn save(&mut self, questions: &[Question]) -> usize {
        let mut known: HashSet<String> = self.cache.iter().map(|q| q.id.clone()).collect();
        let to_add: Vec<Question> = questions
            .iter()
            .filter(|q| known.insert(q.id.clone()))
            .cloned()
            .collect();

        if to_add.is_empty() {
            return 0;
        }
        let added = to_add.len();
        self.cache.extend(to_add);
        self.persist();
        info!("[CustomQuestionStore] 新增 {} 道题，共 {} 道", added, self.cache.len());
        added
    }

    pub fn get_all(&self) -> &[Question] {
        &self.cache
    }

    /// 删除指定章节的全部题目，返回删除数量
    pub fn delete_by_chapter(&mut self, chapter: &str) -> usize {
        let before = self.cache.len();
        self.cache.retain(|q| q.chapter != chapter);
        let removed = before - self.cache.len();
        self.persist();
        removed
    }
}
