//! 客观题判分
//!
//! 单选 / 多选 / 判断题自动判分；填空与问答题返回 `None`，由用户自评。

use std::collections::BTreeSet;

use crate::models::{true_false_letter, Question, QuestionType};

/// 只保留 A–E 选项字母（忽略大小写、顺序与分隔符）
fn letter_set(s: &str) -> BTreeSet<char> {
    s.to_uppercase()
        .chars()
        .filter(|c| ('A'..='E').contains(c))
        .collect()
}

/// 判分
///
/// 返回 `Some(true/false)` 表示已自动判分；`None` 表示需要用户自评。
pub fn grade(question: &Question, user_answer: &str) -> Option<bool> {
    let user_answer = user_answer.trim();
    match question.question_type() {
        QuestionType::TrueFalse => {
            if user_answer.is_empty() {
                return Some(false);
            }
            Some(true_false_letter(user_answer) == question.real_answer())
        }
        QuestionType::SingleChoice | QuestionType::MultiChoice => {
            let expected = letter_set(&question.real_answer());
            // 标准答案里没有字母，无法自动判分
            if expected.is_empty() {
                return None;
            }
            Some(letter_set(user_answer) == expected)
        }
        QuestionType::FillBlank | QuestionType::Essay => None,
    }
}
