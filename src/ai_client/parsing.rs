//! AI 返回文本的解析：复习卡片与生成题目

use serde::Deserialize;

use super::AiError;
use crate::models::{AnalysisCard, Question, QuestionOption, QuestionType};

const CARD_SEPARATOR: &str = "|||";

/// 解析 `标题#内容|||标题#内容` 格式的卡片
///
/// 标题与内容在第一个 `#` 处分开；没有 `#` 或任一侧为空的片段会被丢弃。
/// 一张卡片都解析不出来时，把原文作为一张"分析完成"卡片返回。
pub fn parse_analysis_cards(content: &str) -> Vec<AnalysisCard> {
    let cards: Vec<AnalysisCard> = content
        .split(CARD_SEPARATOR)
        .filter_map(|segment| {
            let (title, body) = segment.trim().split_once('#')?;
            let (title, body) = (title.trim(), body.trim());
            (!title.is_empty() && !body.is_empty()).then(|| AnalysisCard::new(title, body))
        })
        .collect();

    if cards.is_empty() {
        vec![AnalysisCard::new("分析完成", content)]
    } else {
        cards
    }
}

/// 去掉模型常加的 ```json 代码块标记
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// 多选题的答案有时是字符串，有时是字母数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnswerField {
    Text(String),
    Letters(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct GeneratedOption {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    #[serde(rename = "type", default)]
    kind: QuestionType,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    options: Option<Vec<GeneratedOption>>,
    #[serde(default)]
    answer: Option<AnswerField>,
    #[serde(default)]
    analysis: Option<String>,
}

fn non_empty(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// 把模型返回的 JSON 数组转换为题目
///
/// id 为 `online_<毫秒时间戳>_<序号>`，章节为 `联网搜索: <关键词>`。
pub fn parse_generated_questions(
    content: &str,
    keyword: &str,
    timestamp_millis: i64,
) -> Result<Vec<Question>, AiError> {
    let json = strip_code_fences(content);
    let raw: Vec<GeneratedQuestion> = serde_json::from_str(json)
        .map_err(|e| AiError::UnexpectedShape(format!("生成的题目不是合法的 JSON 数组: {}", e)))?;

    let chapter = format!("联网搜索: {}", keyword);
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, g)| {
            let answer = match g.answer {
                Some(AnswerField::Text(text)) => Some(text),
                Some(AnswerField::Letters(letters)) => Some(letters.concat()),
                None => None,
            };
            let options = match g.kind {
                QuestionType::FillBlank | QuestionType::Essay => Vec::new(),
                _ => g
                    .options
                    .unwrap_or_default()
                    .into_iter()
                    .map(|o| QuestionOption::new(o.label.unwrap_or_default(), o.text.unwrap_or_default()))
                    .collect(),
            };
            Question {
                id: format!("online_{}_{}", timestamp_millis, index),
                number: 0,
                chapter: chapter.clone(),
                category: non_empty(g.category, "综合题"),
                kind: g.kind,
                content: non_empty(g.content, "加载失败"),
                options,
                answer: non_empty(answer, "略"),
                analysis: non_empty(g.analysis, "暂无"),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_cards_split_at_first_hash() {
        let content = "桂枝汤证#- **易错点**：与麻黄汤混淆\n# 小标题|||  小柴胡汤#和解少阳 |||无效片段|||#缺标题";
        let cards = parse_analysis_cards(content);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title, "桂枝汤证");
        assert_eq!(cards[0].body, "- **易错点**：与麻黄汤混淆\n# 小标题");
        assert_eq!(cards[1], AnalysisCard::new("小柴胡汤", "和解少阳"));
    }

    #[test]
    fn test_unparseable_content_becomes_single_card() {
        let cards = parse_analysis_cards("模型没有按格式输出");
        assert_eq!(cards, vec![AnalysisCard::new("分析完成", "模型没有按格式输出")]);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  [1] "), "[1]");
        assert_eq!(strip_code_fences("```\n[]```"), "[]");
    }

    #[test]
    fn test_generated_questions_get_ids_and_defaults() {
        let content = r#"```json
[
  {"type": "MULTI_CHOICE", "category": "X型题", "content": "太阳病的主症有",
   "options": [{"label": "A", "text": "脉浮"}, {"label": "B", "text": "头项强痛"}],
   "answer": ["A", "B"], "analysis": "太阳之为病"},
  {"type": "CASE_STUDY", "content": "论述桂枝汤的配伍意义", "options": [{"label": "A"}]}
]
```"#;
        let qs = parse_generated_questions(content, "太阳病", 1700000000000).unwrap();
        assert_eq!(qs.len(), 2);

        assert_eq!(qs[0].id, "online_1700000000000_0");
        assert_eq!(qs[0].chapter, "联网搜索: 太阳病");
        assert_eq!(qs[0].kind, QuestionType::MultiChoice);
        assert_eq!(qs[0].answer, "AB");
        assert_eq!(qs[0].options.len(), 2);

        assert_eq!(qs[1].id, "online_1700000000000_1");
        assert_eq!(qs[1].kind, QuestionType::Essay);
        assert_eq!(qs[1].category, "综合题");
        assert_eq!(qs[1].answer, "略");
        assert_eq!(qs[1].analysis, "暂无");
        assert!(qs[1].options.is_empty());
    }

    #[test]
    fn test_non_array_is_unexpected_shape() {
        assert_matches!(
            parse_generated_questions("{\"questions\": []}", "k", 0),
            Err(AiError::UnexpectedShape(_))
        );
        assert_matches!(
            parse_generated_questions("抱歉，我无法生成", "k", 0),
            Err(AiError::UnexpectedShape(_))
        );
    }
}
