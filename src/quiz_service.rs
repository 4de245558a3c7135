//! 刷题服务
//!
//! 一个 tokio 任务（actor）独占 [`QuestionRepository`] 与各个 store，
//! 调用方持有可克隆的 [`QuizService`] 句柄，通过 mpsc 发送命令、oneshot 接收结果。
//!
//! - 题库加载在阻塞线程池中完成，结果（[`BankSnapshot`]）通过内部通道交回 actor 再应用；
//!   加载期间的多个 `load()` 调用共享同一个结果。
//! - AI 请求在调用方所在的任务中执行，不占用 actor；只有结果（新题目、分析卡片）回传给 actor。

use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::ai_client::{self, ChatBackend};
use crate::error_details::{ErrorCode, ErrorDetails};
use crate::grading;
use crate::models::{AnalysisCard, AppError, Question};
use crate::question_repository::{BankSnapshot, LoadError, LoadState, QuestionRepository};
use crate::stores::AnalysisCacheStore;

const COMMAND_BUFFER: usize = 64;

/// 题库与用户数据概况
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizStats {
    pub state: LoadState,
    pub total_questions: usize,
    pub custom_questions: usize,
    pub chapters: usize,
    pub categories: usize,
    pub mistakes: usize,
    pub completed: usize,
}

enum Command {
    Load {
        reply: oneshot::Sender<LoadState>,
    },
    Stats {
        reply: oneshot::Sender<QuizStats>,
    },
    CategoryNames {
        reply: oneshot::Sender<Vec<String>>,
    },
    ChapterNames {
        reply: oneshot::Sender<Vec<String>>,
    },
    QuestionsByCategory {
        name: String,
        reply: oneshot::Sender<Vec<Question>>,
    },
    QuestionsByChapter {
        name: String,
        reply: oneshot::Sender<Vec<Question>>,
    },
    QuestionById {
        id: String,
        reply: oneshot::Sender<Option<Question>>,
    },
    MistakeQuestions {
        reply: oneshot::Sender<Vec<Question>>,
    },
    AddDynamic {
        questions: Vec<Question>,
        reply: oneshot::Sender<usize>,
    },
    DeleteChapter {
        name: String,
        reply: oneshot::Sender<usize>,
    },
    RecordAnswer {
        id: String,
        correct: bool,
        review_mode: bool,
        reply: oneshot::Sender<()>,
    },
    ToggleMistake {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    IsMistake {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    SubscribeMistakes {
        reply: oneshot::Sender<watch::Receiver<u64>>,
    },
    SaveAnalysis {
        cards: Vec<AnalysisCard>,
        reply: oneshot::Sender<()>,
    },
    Analysis {
        reply: oneshot::Sender<Vec<AnalysisCard>>,
    },
}

// ============================================================================
// Actor
// ============================================================================

enum Event {
    Command(Option<Command>),
    LoadFinished(Result<BankSnapshot, LoadError>),
}

struct QuizActor {
    repo: QuestionRepository,
    analysis: AnalysisCacheStore,
    commands: mpsc::Receiver<Command>,
    load_done_tx: mpsc::UnboundedSender<Result<BankSnapshot, LoadError>>,
    load_done_rx: mpsc::UnboundedReceiver<Result<BankSnapshot, LoadError>>,
    load_waiters: Vec<oneshot::Sender<LoadState>>,
}

impl QuizActor {
    async fn run(mut self) {
        debug!("[QuizService] actor 启动");
        loop {
            let event = tokio::select! {
                cmd = self.commands.recv() => Event::Command(cmd),
                Some(result) = self.load_done_rx.recv() => Event::LoadFinished(result),
            };
            match event {
                Event::Command(Some(cmd)) => self.handle(cmd),
                Event::Command(None) => break,
                Event::LoadFinished(result) => self.finish_load(result),
            }
        }
        debug!("[QuizService] 所有句柄已释放，actor 退出");
    }

    fn start_load(&mut self, reply: oneshot::Sender<LoadState>) {
        match self.repo.begin_load() {
            Some(job) => {
                info!("[QuizService] 开始后台加载题库");
                self.load_waiters.push(reply);
                let done = self.load_done_tx.clone();
                tokio::spawn(async move {
                    let result = tokio::task::spawn_blocking(move || job.run())
                        .await
                        .unwrap_or_else(|e| Err(LoadError::Io(format!("加载任务异常: {}", e))));
                    let _ = done.send(result);
                });
            }
            None if *self.repo.state() == LoadState::Loading => self.load_waiters.push(reply),
            None => {
                let _ = reply.send(self.repo.state().clone());
            }
        }
    }

    fn finish_load(&mut self, result: Result<BankSnapshot, LoadError>) {
        match result {
            Ok(snapshot) => self.repo.apply_loaded(snapshot),
            Err(e) => self.repo.apply_failed(&e),
        }
        let state = self.repo.state().clone();
        for waiter in self.load_waiters.drain(..) {
            let _ = waiter.send(state.clone());
        }
    }

    fn stats(&self) -> QuizStats {
        QuizStats {
            state: self.repo.state().clone(),
            total_questions: self.repo.total_count(),
            custom_questions: self.repo.custom_questions().len(),
            chapters: self.repo.chapter_names().len(),
            categories: self.repo.category_names().len(),
            mistakes: self.repo.mistakes().count(),
            completed: self.repo.progress().completed_count(),
        }
    }

    fn record_answer(&self, id: &str, correct: bool, review_mode: bool) {
        self.repo.progress().mark(id);
        if !correct {
            self.repo.mistakes().mark(id);
        } else if review_mode {
            self.repo.mistakes().unmark(id);
        }
    }

    // store 的 SQLite 读写都是单行操作，直接在 actor 任务上执行；
    // 耗时的题库解析走 spawn_blocking。这里不能用 block_in_place，
    // 它在 current_thread 运行时上会 panic。
    fn handle(&mut self, cmd: Command) {
        // 调用方可能已放弃等待，发送失败直接忽略
        match cmd {
            Command::Load { reply } => self.start_load(reply),
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Command::CategoryNames { reply } => {
                let _ = reply.send(self.repo.category_names().to_vec());
            }
            Command::ChapterNames { reply } => {
                let _ = reply.send(self.repo.chapter_names().to_vec());
            }
            Command::QuestionsByCategory { name, reply } => {
                let _ = reply.send(self.repo.questions_by_category(&name));
            }
            Command::QuestionsByChapter { name, reply } => {
                let _ = reply.send(self.repo.questions_by_chapter(&name));
            }
            Command::QuestionById { id, reply } => {
                let _ = reply.send(self.repo.question_by_id(&id));
            }
            Command::MistakeQuestions { reply } => {
                let _ = reply.send(self.repo.mistake_questions());
            }
            Command::AddDynamic { questions, reply } => {
                let _ = reply.send(self.repo.add_dynamic_questions(questions));
            }
            Command::DeleteChapter { name, reply } => {
                let _ = reply.send(self.repo.delete_chapter(&name));
            }
            Command::RecordAnswer {
                id,
                correct,
                review_mode,
                reply,
            } => {
                self.record_answer(&id, correct, review_mode);
                let _ = reply.send(());
            }
            Command::ToggleMistake { id, reply } => {
                let _ = reply.send(self.repo.mistakes().toggle(&id));
            }
            Command::IsMistake { id, reply } => {
                let _ = reply.send(self.repo.mistakes().contains(&id));
            }
            Command::SubscribeMistakes { reply } => {
                let _ = reply.send(self.repo.mistakes().subscribe());
            }
            Command::SaveAnalysis { cards, reply } => {
                self.analysis.save(&cards);
                let _ = reply.send(());
            }
            Command::Analysis { reply } => {
                let _ = reply.send(self.analysis.get());
            }
        }
    }
}

// ============================================================================
// 句柄
// ============================================================================

#[derive(Clone)]
pub struct QuizService {
    commands: mpsc::Sender<Command>,
    backend: Arc<dyn ChatBackend>,
}

impl QuizService {
    /// 启动 actor，必须在 tokio 运行时中调用
    pub fn spawn(
        repo: QuestionRepository,
        analysis: AnalysisCacheStore,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (load_done_tx, load_done_rx) = mpsc::unbounded_channel();
        let actor = QuizActor {
            repo,
            analysis,
            commands: rx,
            load_done_tx,
            load_done_rx,
            load_waiters: Vec::new(),
        };
        tokio::spawn(actor.run());
        Self {
            commands: tx,
            backend,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, AppError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| AppError::unknown("题库服务已停止"))?;
        rx.await.map_err(|_| {
            error!("[QuizService] actor 未回复");
            AppError::unknown("题库服务未响应")
        })
    }

    /// 加载题库；已加载时立即返回
    pub async fn load(&self) -> Result<LoadState, AppError> {
        self.request(|reply| Command::Load { reply }).await
    }

    pub async fn stats(&self) -> Result<QuizStats, AppError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn category_names(&self) -> Result<Vec<String>, AppError> {
        self.request(|reply| Command::CategoryNames { reply }).await
    }

    pub async fn chapter_names(&self) -> Result<Vec<String>, AppError> {
        self.request(|reply| Command::ChapterNames { reply }).await
    }

    pub async fn questions_by_category(&self, name: &str) -> Result<Vec<Question>, AppError> {
        let name = name.to_string();
        self.request(|reply| Command::QuestionsByCategory { name, reply })
            .await
    }

    pub async fn questions_by_chapter(&self, name: &str) -> Result<Vec<Question>, AppError> {
        let name = name.to_string();
        self.request(|reply| Command::QuestionsByChapter { name, reply })
            .await
    }

    pub async fn question(&self, id: &str) -> Result<Option<Question>, AppError> {
        let id = id.to_string();
        self.request(|reply| Command::QuestionById { id, reply }).await
    }

    pub async fn mistake_questions(&self) -> Result<Vec<Question>, AppError> {
        self.request(|reply| Command::MistakeQuestions { reply }).await
    }

    pub async fn add_dynamic_questions(&self, questions: Vec<Question>) -> Result<usize, AppError> {
        self.request(|reply| Command::AddDynamic { questions, reply })
            .await
    }

    pub async fn delete_chapter(&self, name: &str) -> Result<usize, AppError> {
        let name = name.to_string();
        self.request(|reply| Command::DeleteChapter { name, reply })
            .await
    }

    /// 记录作答：总是计入进度；答错记入错题；复习模式下答对移出错题
    pub async fn record_answer(
        &self,
        id: &str,
        correct: bool,
        review_mode: bool,
    ) -> Result<(), AppError> {
        let id = id.to_string();
        self.request(|reply| Command::RecordAnswer {
            id,
            correct,
            review_mode,
            reply,
        })
        .await
    }

    /// 判分并记录；返回 `None` 表示主观题，需要调用方自评后再 [`record_answer`](Self::record_answer)
    pub async fn submit_answer(
        &self,
        id: &str,
        user_answer: &str,
        review_mode: bool,
    ) -> Result<Option<bool>, AppError> {
        let question = self
            .question(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("题目不存在: {}", id)))?;
        let verdict = grading::grade(&question, user_answer);
        if let Some(correct) = verdict {
            self.record_answer(id, correct, review_mode).await?;
        }
        Ok(verdict)
    }

    pub async fn toggle_mistake(&self, id: &str) -> Result<bool, AppError> {
        let id = id.to_string();
        self.request(|reply| Command::ToggleMistake { id, reply }).await
    }

    pub async fn is_mistake(&self, id: &str) -> Result<bool, AppError> {
        let id = id.to_string();
        self.request(|reply| Command::IsMistake { id, reply }).await
    }

    /// 订阅错题变更计数
    pub async fn subscribe_mistakes(&self) -> Result<watch::Receiver<u64>, AppError> {
        self.request(|reply| Command::SubscribeMistakes { reply })
            .await
    }

    pub async fn saved_analysis(&self) -> Result<Vec<AnalysisCard>, AppError> {
        self.request(|reply| Command::Analysis { reply }).await
    }

    async fn save_analysis(&self, cards: Vec<AnalysisCard>) -> Result<(), AppError> {
        self.request(|reply| Command::SaveAnalysis { cards, reply })
            .await
    }

    // ------------------------------------------------------------------
    // AI
    // ------------------------------------------------------------------

    /// 按关键词生成题目并加入题库；失败时返回可展示的错误详情
    pub async fn generate_questions(
        &self,
        keyword: &str,
        count: usize,
    ) -> Result<Vec<Question>, ErrorDetails> {
        let questions = ai_client::generate_questions(self.backend.as_ref(), keyword, count)
            .await
            .map_err(|e| {
                warn!("[QuizService] 生成题目失败: {}", e);
                e.details()
            })?;
        if questions.is_empty() {
            return Ok(questions);
        }
        self.add_dynamic_questions(questions.clone())
            .await
            .map_err(|e| ErrorDetails::new(ErrorCode::Unknown, e.to_string(), e.to_string()))?;
        Ok(questions)
    }

    /// 分析错题并缓存卡片；请求失败时返回一张"分析失败"卡片且不覆盖缓存
    pub async fn analyze_mistakes(&self) -> Result<Vec<AnalysisCard>, AppError> {
        let mistakes = self.mistake_questions().await?;
        match ai_client::analyze_weakness(self.backend.as_ref(), &mistakes).await {
            Ok(cards) => {
                if !mistakes.is_empty() {
                    self.save_analysis(cards.clone()).await?;
                }
                Ok(cards)
            }
            Err(e) => {
                warn!("[QuizService] 弱点分析失败: {}", e);
                Ok(vec![AnalysisCard::new("分析失败", e.user_message())])
            }
        }
    }

    /// 单题解析（流式）；出错时以错误提示文本作为最后一段
    pub async fn explain_question(&self, id: &str) -> Result<BoxStream<'static, String>, AppError> {
        let Some(question) = self.question(id).await? else {
            let message = format!("❌ 题目不存在：{}", id);
            return Ok(stream::once(async move { message }).boxed());
        };
        match ai_client::explain_question(self.backend.as_ref(), &question).await {
            Ok(text) => Ok(text
                .map(|chunk| chunk.unwrap_or_else(|e| e.user_message()))
                .boxed()),
            Err(e) => {
                let message = e.user_message();
                Ok(stream::once(async move { message }).boxed())
            }
        }
    }
}
