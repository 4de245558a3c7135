use std::sync::Arc;
use tracing::warn;

use crate::database::{Database, KvNamespace};
use crate::models::AnalysisCard;

pub const ANALYSIS_NAMESPACE: &str = "analysis_storage";
const KEY_CARDS: &str = "weakness_cards";

/// 最近一次弱点分析生成的卡片
#[derive(Clone)]
pub struct AnalysisCacheStore {
    ns: KvNamespace,
}

impl AnalysisCacheStore {
    pub fn open(db: Arc<Database>) -> Self {
        Self {
            ns: KvNamespace::new(db, ANALYSIS_NAMESPACE),
        }
    }

    /// 覆盖保存
    pub fn save(&self, cards: &[AnalysisCard]) {
        let result = serde_json::to_string(cards)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.ns.put(KEY_CARDS, &json));
        if let Err(e) = result {
            warn!("[AnalysisCache] 保存分析卡片失败: {}", e);
        }
    }

    /// 缺失或无法解析时返回空列表
    pub fn get(&self) -> Vec<AnalysisCard> {
        let json = match self.ns.get(KEY_CARDS) {
            Ok(Some(json)) => json,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("[AnalysisCache] 读取分析卡片失败: {}", e);
                return Vec::new();
            }
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("[AnalysisCache] 分析卡片无法解析，按空处理: {}", e);
            Vec::new()
        })
    }

    pub fn has_data(&self) -> bool {
        !self.get().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_get_keeps_order() {
        let store = AnalysisCacheStore::open(Arc::new(Database::open_in_memory().unwrap()));
        assert!(!store.has_data());

        let cards = vec![
            AnalysisCard::new("六经辨证", "太阳病提纲..."),
            AnalysisCard::new("方证鉴别", "桂枝汤与麻黄汤..."),
        ];
        store.save(&cards);
        assert_eq!(store.get(), cards);
        assert!(store.has_data());

        store.save(&[]);
        assert!(!store.has_data());
    }

    #[test]
    fn test_unparseable_value_is_empty() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.kv_put(ANALYSIS_NAMESPACE, KEY_CARDS, "[{\"title\": 1}]")
            .unwrap();
        assert!(AnalysisCacheStore::open(db).get().is_empty());
    }
}
