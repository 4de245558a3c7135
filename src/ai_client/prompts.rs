//! 提示词模板

use crate::models::Question;

pub const ROLE_ANALYSIS: &str = "你是一位中医专家。";

pub const ANALYSIS_TEMPLATE: &str = "请解析这道题：
1. 核心考点。
2. 为什么选该答案。
3. 排除干扰项（如果是选择题）。

要求：Markdown格式，精练，200字以内。";

pub const WEAKNESS_TEMPLATE: &str = "你是一位中医考研辅导专家。请为下面这些学生最近做错的题目制作【复习知识卡片】。

【数量与策略】：
1. **不要**进行笼统的概括。
2. 请尽量为**每一个**具体的知识点/汤证/病机生成一张独立的卡片。
3. 如果多道题考的是同一个汤证（如都是桂枝汤），请合并为一张深度解析卡片。
4. 目标是生成尽可能详细的复习资料，卡片数量根据题目实际考点数量决定（不设上限）。

【卡片内容要求】：
必须包含以下分点（使用 Markdown 列表）：
- **易错点**：指出为什么容易做错。
- **核心考点详解**：深度剖析该方剂或条文。
- **辨证眼目/口诀**：辅助记忆的关键词。

【格式严格要求】：
1. 格式：知识点标题#知识点内容
2. 每张卡片之间用 \"|||\" 分隔。
3. 标题纯文本，内容使用 Markdown。";

const GENERATION_TEMPLATE: &str = "请根据关键词 {keyword}，生成 {count} 道中医（伤寒论课程）题目。

【题型混合要求】：
请按适合该知识点的形式，混合以下题型（不要局限于选择题）：
1. **A1/A2型题** (单选) -> type: \"SINGLE_CHOICE\"
2. **X型题** (多选) -> type: \"MULTI_CHOICE\"
3. **判断说明题** -> type: \"TRUE_FALSE\" (选项放 A:正确, B:错误)
4. **填空题** -> type: \"FILL_BLANK\" (options留空)
5. **名词解释题/简答题/论述题/病例分析题** -> type: \"ESSAY\" (options留空)

【JSON 格式要求】：
必须返回严格的 JSON 数组，JSON 结构如下：
[
  {
    \"type\": \"SINGLE_CHOICE\",
    \"category\": \"A1型题\",
    \"content\": \"题目内容\",
    \"options\": [
      {\"label\": \"A\", \"text\": \"选项内容\"}
    ],
    \"answer\": \"A\",
    \"analysis\": \"解析内容\"
  }
]

【内容要求】：
1. 难度适中，符合中医执业医师/考研标准。
2. 确保 JSON 格式合法，不要包含 ```json 等标记。
3. 题目数量尽量接近 {count} 道。";

/// 弱点分析最多取最近的错题数
pub const WEAKNESS_SAMPLE_SIZE: usize = 15;

/// 单题解析
pub fn explain_prompt(question: &Question) -> String {
    let mut stem = question.content.clone();
    for opt in &question.options {
        stem.push_str(&format!("\n{}. {}", opt.label, opt.text));
    }
    format!(
        "{}\n\n题目：{}\n参考答案：{}\n\n{}",
        ROLE_ANALYSIS,
        stem,
        question.real_answer(),
        ANALYSIS_TEMPLATE
    )
}

/// 错题弱点分析，只取最后 [`WEAKNESS_SAMPLE_SIZE`] 道
pub fn weakness_prompt(mistakes: &[Question]) -> String {
    let start = mistakes.len().saturating_sub(WEAKNESS_SAMPLE_SIZE);
    let listing = mistakes[start..]
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. [{}] {}", i + 1, q.category, q.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n以下是学生最近做错的题目：\n{}", WEAKNESS_TEMPLATE, listing)
}

/// 按关键词出题
pub fn generation_prompt(keyword: &str, count: usize) -> String {
    GENERATION_TEMPLATE
        .replace("{keyword}", keyword)
        .replace("{count}", &count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionOption, QuestionType};

    fn q(i: usize) -> Question {
        Question {
            id: format!("q{}", i),
            number: i as u32,
            chapter: "第一章".into(),
            category: "A1型题".into(),
            kind: QuestionType::SingleChoice,
            content: format!("题干{}", i),
            options: vec![QuestionOption::new("A", "桂枝汤")],
            answer: "A".into(),
            analysis: String::new(),
        }
    }

    #[test]
    fn test_weakness_prompt_takes_last_fifteen() {
        let mistakes: Vec<Question> = (0..20).map(q).collect();
        let prompt = weakness_prompt(&mistakes);
        assert!(prompt.contains("1. [A1型题] 题干5"));
        assert!(prompt.contains("15. [A1型题] 题干19"));
        assert!(!prompt.contains("题干4\n"));
    }

    #[test]
    fn test_explain_prompt_lists_options() {
        let prompt = explain_prompt(&q(1));
        assert!(prompt.starts_with(ROLE_ANALYSIS));
        assert!(prompt.contains("题目：题干1\nA. 桂枝汤"));
        assert!(prompt.contains("参考答案：A"));
    }

    #[test]
    fn test_generation_prompt_fills_placeholders() {
        let prompt = generation_prompt("桂枝汤", 5);
        assert!(prompt.starts_with("请根据关键词 桂枝汤，生成 5 道"));
        assert!(prompt.contains("尽量接近 5 道"));
        assert!(!prompt.contains("{count}"));
    }
}
