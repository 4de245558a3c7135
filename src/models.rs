use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// 题库文件的包装结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionWrapper {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub total_count: usize,
    pub data: Vec<Question>,
}

/// 选项（label 仅对客观题有意义）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub text: String,
}

impl QuestionOption {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// 题型
///
/// 序列化为 `SINGLE_CHOICE` 等大写标签；无法识别的标签一律视为 `ESSAY`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    TrueFalse,
    FillBlank,
    #[default]
    Essay,
}

impl QuestionType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "SINGLE_CHOICE" => QuestionType::SingleChoice,
            "MULTI_CHOICE" => QuestionType::MultiChoice,
            "TRUE_FALSE" => QuestionType::TrueFalse,
            "FILL_BLANK" => QuestionType::FillBlank,
            _ => QuestionType::Essay,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "SINGLE_CHOICE",
            QuestionType::MultiChoice => "MULTI_CHOICE",
            QuestionType::TrueFalse => "TRUE_FALSE",
            QuestionType::FillBlank => "FILL_BLANK",
            QuestionType::Essay => "ESSAY",
        }
    }

    /// 是否为客观题（可自动判分）
    pub fn is_objective(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultiChoice | QuestionType::TrueFalse
        )
    }
}

impl<'de> Deserialize<'de> for QuestionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(QuestionType::from_tag)
            .unwrap_or_default())
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// 题目实体
///
/// `id` 全局唯一且不可变，是进度、错题与自定义题库之间的关联键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionType,
    pub content: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub analysis: String,
}

const NO_EXPLANATION: &str = "暂无详细解析";

fn answer_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("参考答案|正确答案|答案|：|:").expect("static regex"))
}

fn verdict_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("(?i)不正确|正确|错误|TRUE|FALSE|对|错|A|B|T|F").expect("static regex")
    })
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.kind
    }

    /// 标准答案（用于判分）
    ///
    /// 判断题统一折算为 `A`（正确）/ `B`（错误）；其他题型只保留 A–E 字母，
    /// 没有字母时原样返回。
    pub fn real_answer(&self) -> String {
        if self.kind == QuestionType::TrueFalse {
            return true_false_letter(&self.answer).to_string();
        }
        let cleaned: String = self
            .answer
            .to_uppercase()
            .chars()
            .filter(|c| ('A'..='E').contains(c))
            .collect();
        if cleaned.is_empty() {
            self.answer.clone()
        } else {
            cleaned
        }
    }

    /// 完整解析文本
    pub fn full_explanation(&self) -> String {
        if self.kind == QuestionType::TrueFalse {
            let without_prefix = answer_prefix_regex().replace_all(&self.answer, "");
            let remark = verdict_regex().replace_all(&without_prefix, "");
            let remark = remark
                .trim()
                .trim_start_matches(['。', '，', '.', ','])
                .trim();
            let parts: Vec<&str> = [remark, self.analysis.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();
            return if parts.is_empty() {
                NO_EXPLANATION.to_string()
            } else {
                parts.join("\n\n")
            };
        }
        if self.analysis.trim().is_empty() {
            NO_EXPLANATION.to_string()
        } else {
            self.analysis.clone()
        }
    }
}

pub(crate) fn true_false_letter(answer: &str) -> &'static str {
    if answer.contains("正确") && !answer.contains("不正确") {
        return "A";
    }
    if answer.contains('对') && !answer.contains("不对") {
        return "A";
    }
    if answer.contains("不正确") || answer.contains("错误") || answer.contains('错') {
        return "B";
    }
    match answer.trim().to_uppercase().as_str() {
        "A" | "T" | "TRUE" => "A",
        "B" | "F" | "FALSE" => "B",
        _ => "A",
    }
}

/// AI 弱点分析生成的复习卡片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisCard {
    pub title: String,
    pub body: String,
}

impl AnalysisCard {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// 服务句柄返回的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppErrorType {
    NotFound,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: String,
}

impl AppError {
    pub fn new(error_type: AppErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::NotFound, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Unknown, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(answer: &str, analysis: &str) -> Question {
        Question {
            id: "tf-1".into(),
            number: 1,
            chapter: "第一章".into(),
            category: "判断题".into(),
            kind: QuestionType::TrueFalse,
            content: "太阳病，发热汗出者，为中风。".into(),
            options: vec![QuestionOption::new("A", "正确"), QuestionOption::new("B", "错误")],
            answer: answer.into(),
            analysis: analysis.into(),
        }
    }

    #[test]
    fn test_unknown_type_tag_falls_back_to_essay() {
        let json = r#"{"id":"q1","content":"c","type":"MATCHING"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind, QuestionType::Essay);

        let json = r#"{"id":"q2","content":"c","type":null}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind, QuestionType::Essay);

        let json = r#"{"id":"q3","content":"c","type":"MULTI_CHOICE"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind, QuestionType::MultiChoice);
    }

    #[test]
    fn test_type_serializes_as_tag() {
        let q = tf("正确", "");
        let value = serde_json::to_value(&q).unwrap();
        assert_eq!(value["type"], "TRUE_FALSE");
    }

    #[test]
    fn test_true_false_real_answer() {
        assert_eq!(tf("正确", "").real_answer(), "A");
        assert_eq!(tf("不正确", "").real_answer(), "B");
        assert_eq!(tf("错误。应为伤寒", "").real_answer(), "B");
        assert_eq!(tf("F", "").real_answer(), "B");
        assert_eq!(tf("true", "").real_answer(), "A");
        assert_eq!(tf("不确定", "").real_answer(), "A");
    }

    #[test]
    fn test_choice_real_answer_keeps_letters() {
        let mut q = tf("", "");
        q.kind = QuestionType::MultiChoice;
        q.answer = "答案：a、C、E".into();
        assert_eq!(q.real_answer(), "ACE");

        q.kind = QuestionType::FillBlank;
        q.answer = "桂枝汤".into();
        assert_eq!(q.real_answer(), "桂枝汤");
    }

    #[test]
    fn test_full_explanation() {
        let q = tf("答案：错误。应为太阳中风", "出自第2条");
        assert_eq!(q.full_explanation(), "应为太阳中风\n\n出自第2条");

        let q = tf("正确", "");
        assert_eq!(q.full_explanation(), NO_EXPLANATION);

        let mut q = tf("A", "  ");
        q.kind = QuestionType::SingleChoice;
        assert_eq!(q.full_explanation(), NO_EXPLANATION);
    }
}
