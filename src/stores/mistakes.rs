//! 错题集合
//!
//! 除了集合本身，还维护一个单调递增的变更计数器：只有集合真的发生变化时才递增，
//! 订阅方据此重新计算依赖错题的视图。

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::FLAG_TRUE;
use crate::database::{Database, KvNamespace};

pub const MISTAKE_NAMESPACE: &str = "quiz_mistakes_v3";

pub struct MistakeStore {
    ns: KvNamespace,
    change_tx: watch::Sender<u64>,
}

impl MistakeStore {
    pub fn open(db: Arc<Database>) -> Self {
        let (change_tx, _) = watch::channel(0);
        Self {
            ns: KvNamespace::new(db, MISTAKE_NAMESPACE),
            change_tx,
        }
    }

    fn bump(&self) {
        self.change_tx.send_modify(|counter| *counter += 1);
    }

    /// 当前变更计数
    pub fn change_counter(&self) -> u64 {
        *self.change_tx.borrow()
    }

    /// 订阅变更计数
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.change_tx.subscribe()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ns.contains(id).unwrap_or_else(|e| {
            warn!("[MistakeStore] 读取错题失败 id={}: {}", id, e);
            false
        })
    }

    pub fn mark(&self, id: &str) {
        if self.contains(id) {
            return;
        }
        match self.ns.put(id, FLAG_TRUE) {
            Ok(()) => self.bump(),
            Err(e) => warn!("[MistakeStore] 记录错题失败 id={}: {}", id, e),
        }
    }

    pub fn unmark(&self, id: &str) {
        match self.ns.remove(id) {
            Ok(true) => self.bump(),
            Ok(false) => {}
            Err(e) => warn!("[MistakeStore] 移除错题失败 id={}: {}", id, e),
        }
    }

    /// 切换错题状态，返回切换后的状态
    pub fn toggle(&self, id: &str) -> bool {
        if self.contains(id) {
            self.unmark(id);
        } else {
            self.mark(id);
        }
        self.contains(id)
    }

    /// 批量移除，只有真的删掉了才递增计数
    pub fn remove_many(&self, ids: &[String]) -> usize {
        let removed = self.ns.remove_many(ids).unwrap_or_else(|e| {
            warn!("[MistakeStore] 批量移除错题失败: {}", e);
            0
        });
        if removed > 0 {
            debug!("[MistakeStore] 批量移除 {} 道错题", removed);
            self.bump();
        }
        removed
    }

    /// 错题 id，按记录顺序
    pub fn mistake_ids(&self) -> Vec<String> {
        self.ns.keys().unwrap_or_else(|e| {
            warn!("[MistakeStore] 读取错题列表失败: {}", e);
            Vec::new()
        })
    }

    pub fn count(&self) -> usize {
        self.ns.count().unwrap_or(0)
    }
}
