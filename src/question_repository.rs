//! 题库仓库
//!
//! 负责加载随包题库、合并本地保存的 AI 生成题目，并维护按分类 / 章节 / id 的索引。
//!
//! ## 状态
//! `NotLoaded → Loading → Loaded`，或 `NotLoaded → Loading → Failed(message)`。
//! `Failed` 不致命，可以再次加载，也可以在空题库上继续运行。
//!
//! ## 索引
//! 索引总是由完整的题目列表整体重建，不做增量更新。任何修改列表的操作结束前都会重建。
//! 文件读取、解析与首次索引构建在 [`LoadJob::run`] 中完成，可以放到阻塞线程池执行，
//! 结果以不可变的 [`BankSnapshot`] 交回仓库所有者。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::models::{Question, QuestionWrapper};
use crate::stores::{CustomQuestionStore, MistakeStore, ProgressStore};
use crate::utils::chinese_order::sort_labels;

// ============================================================================
// 加载错误
// ============================================================================

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("未找到题库文件 ({0})。")]
    NotFound(String),
    #[error("读取题库失败: {0}")]
    Io(String),
    #[error("数据解析错误: {0}")]
    Parse(String),
}

// ============================================================================
// 题库来源
// ============================================================================

#[derive(Debug, Clone)]
pub enum BankSource {
    /// 磁盘上的 JSON 文件
    File(PathBuf),
    /// 已在内存中的 JSON 文本
    Inline(String),
}

impl BankSource {
    pub fn read(&self) -> Result<Vec<Question>, LoadError> {
        match self {
            BankSource::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        let name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| path.display().to_string());
                        LoadError::NotFound(name)
                    } else {
                        LoadError::Io(e.to_string())
                    }
                })?;
                parse_bank(&text)
            }
            BankSource::Inline(text) => parse_bank(text),
        }
    }
}

/// 解析题库 JSON：包装对象 `{version, source, total_count, data}` 或裸数组
pub fn parse_bank(text: &str) -> Result<Vec<Question>, LoadError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    let result = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Question>>(trimmed)
    } else {
        serde_json::from_str::<QuestionWrapper>(trimmed).map(|wrapper| {
            if wrapper.total_count != 0 && wrapper.total_count != wrapper.data.len() {
                debug!(
                    "[QuestionRepository] total_count={} 与实际题数 {} 不一致",
                    wrapper.total_count,
                    wrapper.data.len()
                );
            }
            wrapper.data
        })
    };
    result.map_err(|e| LoadError::Parse(e.to_string()))
}

// ============================================================================
// 索引
// ============================================================================

/// 从题目列表派生的索引，值为题目在列表中的位置
#[derive(Debug, Clone, Default)]
pub struct QuestionIndex {
    by_category: HashMap<String, Vec<usize>>,
    by_chapter: HashMap<String, Vec<usize>>,
    by_id: HashMap<String, usize>,
    category_names: Vec<String>,
    chapter_names: Vec<String>,
}

impl QuestionIndex {
    pub fn build(questions: &[Question], excluded_category_marker: &str) -> Self {
        let mut index = QuestionIndex::default();
        for (pos, q) in questions.iter().enumerate() {
            index
                .by_category
                .entry(q.category.clone())
                .or_default()
                .push(pos);
            index
                .by_chapter
                .entry(q.chapter.clone())
                .or_default()
                .push(pos);
            // 重复 id 时后者覆盖前者
            index.by_id.insert(q.id.clone(), pos);
        }

        index.category_names = index
            .by_category
            .keys()
            .filter(|name| {
                excluded_category_marker.is_empty() || !name.contains(excluded_category_marker)
            })
            .cloned()
            .collect();
        sort_labels(&mut index.category_names);

        index.chapter_names = index.by_chapter.keys().cloned().collect();
        sort_labels(&mut index.chapter_names);
        index
    }
}

/// 后台加载的结果：合并后的题目列表与对应索引
#[derive(Debug, Clone)]
pub struct BankSnapshot {
    questions: Vec<Question>,
    static_count: usize,
    index: QuestionIndex,
}

impl BankSnapshot {
    pub fn build(
        static_questions: Vec<Question>,
        custom_questions: Vec<Question>,
        excluded_category_marker: &str,
    ) -> Result<Self, LoadError> {
        let static_count = static_questions.len();
        let mut questions = static_questions;
        questions.extend(custom_questions);
        let index = QuestionIndex::build(&questions, excluded_category_marker);
        Ok(Self {
            questions,
            static_count,
            index,
        })
    }

    pub fn total_count(&self) -> usize {
        self.questions.len()
    }

    pub fn static_count(&self) -> usize {
        self.static_count
    }
}

/// 一次加载所需的全部输入，可在任意线程执行
#[derive(Debug, Clone)]
pub struct LoadJob {
    source: BankSource,
    custom_questions: Vec<Question>,
    excluded_category_marker: String,
}

impl LoadJob {
    pub fn run(self) -> Result<BankSnapshot, LoadError> {
        let static_questions = self.source.read()?;
        BankSnapshot::build(
            static_questions,
            self.custom_questions,
            &self.excluded_category_marker,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message")]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed(String),
}

// ============================================================================
// 仓库
// ============================================================================

pub struct QuestionRepository {
    source: BankSource,
    excluded_category_marker: String,
    state: LoadState,
    questions: Vec<Question>,
    index: QuestionIndex,
    custom: CustomQuestionStore,
    mistakes: MistakeStore,
    progress: ProgressStore,
}

impl QuestionRepository {
    pub fn new(
        source: BankSource,
        excluded_category_marker: impl Into<String>,
        custom: CustomQuestionStore,
        mistakes: MistakeStore,
        progress: ProgressStore,
    ) -> Self {
        Self {
            source,
            excluded_category_marker: excluded_category_marker.into(),
            state: LoadState::NotLoaded,
            questions: Vec::new(),
            index: QuestionIndex::default(),
            custom,
            mistakes,
            progress,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn mistakes(&self) -> &MistakeStore {
        &self.mistakes
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn custom_questions(&self) -> &[Question] {
        self.custom.get_all()
    }

    /// 进入 `Loading` 并返回加载任务；已加载或正在加载时返回 `None`
    pub fn begin_load(&mut self) -> Option<LoadJob> {
        match self.state {
            LoadState::Loaded | LoadState::Loading => return None,
            LoadState::NotLoaded | LoadState::Failed(_) => {}
        }
        self.state = LoadState::Loading;
        Some(LoadJob {
            source: self.source.clone(),
            custom_questions: self.custom.get_all().to_vec(),
            excluded_category_marker: self.excluded_category_marker.clone(),
        })
    }

    /// 应用后台加载结果
    ///
    /// 加载期间若自定义题库有变动，以存储中的当前内容为准重新合并。
    pub fn apply_loaded(&mut self, snapshot: BankSnapshot) {
        let BankSnapshot {
            mut questions,
            static_count,
            index,
        } = snapshot;

        let current_custom = self.custom.get_all();
        let unchanged = questions.len() - static_count == current_custom.len()
            && questions[static_count..]
                .iter()
                .zip(current_custom)
                .all(|(a, b)| a.id == b.id);

        if unchanged {
            self.questions = questions;
            self.index = index;
        } else {
            debug!("[QuestionRepository] 加载期间自定义题库有变动，重新合并");
            questions.truncate(static_count);
            questions.extend(current_custom.iter().cloned());
            self.questions = questions;
            self.rebuild_indexes();
        }

        self.state = LoadState::Loaded;
        info!(
            "[QuestionRepository] 题库加载完成: 共 {} 题（静态 {}，自定义 {}），{} 个章节，{} 个分类",
            self.questions.len(),
            static_count,
            self.questions.len() - static_count,
            self.index.chapter_names.len(),
            self.index.category_names.len()
        );
    }

    pub fn apply_failed(&mut self, error: &LoadError) {
        warn!("[QuestionRepository] 题库加载失败: {}", error);
        self.state = LoadState::Failed(error.to_string());
    }

    /// 在当前线程同步加载
    pub fn load(&mut self) -> &LoadState {
        if let Some(job) = self.begin_load() {
            match job.run() {
                Ok(snapshot) => self.apply_loaded(snapshot),
                Err(e) => self.apply_failed(&e),
            }
        }
        &self.state
    }

    fn rebuild_indexes(&mut self) {
        self.index = QuestionIndex::build(&self.questions, &self.excluded_category_marker);
    }

    fn collect(&self, positions: Option<&Vec<usize>>) -> Vec<Question> {
        positions
            .map(|ps| ps.iter().map(|&p| self.questions[p].clone()).collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    pub fn questions_by_category(&self, category: &str) -> Vec<Question> {
        self.collect(self.index.by_category.get(category))
    }

    pub fn questions_by_chapter(&self, chapter: &str) -> Vec<Question> {
        self.collect(self.index.by_chapter.get(chapter))
    }

    pub fn question_by_id(&self, id: &str) -> Option<Question> {
        self.index
            .by_id
            .get(id)
            .map(|&p| self.questions[p].clone())
    }

    /// 错题列表，按记录顺序；找不到对应题目的 id 直接跳过
    pub fn mistake_questions(&self) -> Vec<Question> {
        self.mistakes
            .mistake_ids()
            .iter()
            .filter_map(|id| self.index.by_id.get(id))
            .map(|&p| self.questions[p].clone())
            .collect()
    }

    pub fn total_count(&self) -> usize {
        self.questions.len()
    }

    pub fn category_names(&self) -> &[String] {
        &self.index.category_names
    }

    pub fn chapter_names(&self) -> &[String] {
        &self.index.chapter_names
    }

    // ------------------------------------------------------------------
    // 修改
    // ------------------------------------------------------------------

    /// 添加 AI 生成的题目
    ///
    /// 持久化时按 id 去重；内存列表直接追加。调用方传入已存在的 id 时，
    /// 内存中会出现重复题目（仅记录警告），重启后以存储为准。
    /// 返回实际写入存储的数量。
    pub fn add_dynamic_questions(&mut self, new_questions: Vec<Question>) -> usize {
        if new_questions.is_empty() {
            return 0;
        }
        let persisted = self.custom.save(&new_questions);

        let duplicated: Vec<&str> = new_questions
            .iter()
            .filter(|q| self.index.by_id.contains_key(&q.id))
            .map(|q| q.id.as_str())
            .collect();
        if !duplicated.is_empty() {
            warn!(
                "[QuestionRepository] 添加的题目 id 已存在，内存中将出现重复: {:?}",
                duplicated
            );
        }

        let appended = new_questions.len();
        self.questions.extend(new_questions);
        self.rebuild_indexes();
        info!(
            "[QuestionRepository] 添加 {} 道题（持久化 {}），当前共 {} 题",
            appended,
            persisted,
            self.questions.len()
        );
        persisted
    }

    /// 删除整个章节，返回删除的题目数
    ///
    /// 先用删除前的 id 集合清理错题与进度，再删除自定义存储中的该章节，
    /// 最后修改内存列表并重建索引。
    pub fn delete_chapter(&mut self, chapter: &str) -> usize {
        let ids: Vec<String> = self
            .questions
            .iter()
            .filter(|q| q.chapter == chapter)
            .map(|q| q.id.clone())
            .collect();
        if ids.is_empty() {
            return 0;
        }

        let mistakes_removed = self.mistakes.remove_many(&ids);
        let progress_removed = self.progress.remove_many(&ids);
        self.custom.delete_by_chapter(chapter);

        // 按章节删除：重复 id 的题目可能属于其他章节
        let before = self.questions.len();
        self.questions.retain(|q| q.chapter != chapter);
        let removed = before - self.questions.len();
        self.rebuild_indexes();

        info!(
            "[QuestionRepository] 删除章节 {}: {} 题，清除错题 {}、进度 {}",
            chapter, removed, mistakes_removed, progress_removed
        );
        removed
    }
}
