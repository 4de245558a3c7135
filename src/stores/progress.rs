use std::sync::Arc;
use tracing::warn;

use super::FLAG_TRUE;
use crate::database::{Database, KvNamespace};

pub const PROGRESS_NAMESPACE: &str = "quiz_progress_v3";

/// 已作答题目集合（无论对错）
#[derive(Clone)]
pub struct ProgressStore {
    ns: KvNamespace,
}

impl ProgressStore {
    pub fn open(db: Arc<Database>) -> Self {
        Self {
            ns: KvNamespace::new(db, PROGRESS_NAMESPACE),
        }
    }

    pub fn mark(&self, id: &str) {
        if let Err(e) = self.ns.put(id, FLAG_TRUE) {
            warn!("[ProgressStore] 写入进度失败 id={}: {}", id, e);
        }
    }

    pub fn unmark(&self, id: &str) {
        if let Err(e) = self.ns.remove(id) {
            warn!("[ProgressStore] 删除进度失败 id={}: {}", id, e);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ns.contains(id).unwrap_or_else(|e| {
            warn!("[ProgressStore] 读取进度失败 id={}: {}", id, e);
            false
        })
    }

    /// 批量删除，返回实际删除的数量
    pub fn remove_many(&self, ids: &[String]) -> usize {
        self.ns.remove_many(ids).unwrap_or_else(|e| {
            warn!("[ProgressStore] 批量删除进度失败: {}", e);
            0
        })
    }

    pub fn completed_count(&self) -> usize {
        self.ns.count().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_remove_many() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = ProgressStore::open(db);

        store.mark("q1");
        store.mark("q2");
        store.mark("q1");
        assert!(store.contains("q1"));
        assert_eq!(store.completed_count(), 2);

        let removed = store.remove_many(&["q1".into(), "q9".into()]);
        assert_eq!(removed, 1);
        assert!(!store.contains("q1"));

        store.unmark("q2");
        assert_eq!(store.completed_count(), 0);
    }
}
