//! 章节/分类名称的自然排序
//!
//! 名称中第一段阿拉伯数字优先；没有时取第一段中文数字（一 到 十、零）；
//! 两边都能取到数字时按数值比较，都取不到时按普通字符串比较。
//! 只有一边带数字时，带数字的排在前面，这样整个比较是全序，可直接用于 `sort_by`。

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[0-9]+").expect("static regex"))
}

fn chinese_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[零一二三四五六七八九十]+").expect("static regex"))
}

fn chinese_digit(c: char) -> Option<u64> {
    let value = match c {
        '零' => 0,
        '一' => 1,
        '二' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        '十' => 10,
        _ => return None,
    };
    Some(value)
}

/// 解析简单中文数字：`十` → 10，`十一` → 11，`二十` → 20，`二十三` → 23
///
/// 结果为 0 时视为未找到数字。
pub fn parse_chinese_number(s: &str) -> Option<u64> {
    let mut result = 0u64;
    let mut pending = 0u64;
    for value in s.chars().filter_map(chinese_digit) {
        if value == 10 {
            if pending == 0 {
                pending = 1;
            }
            result += pending * 10;
            pending = 0;
        } else {
            pending = value;
        }
    }
    result += pending;
    (result != 0).then_some(result)
}

/// 提取名称中的排序数字
pub fn extract_number(s: &str) -> Option<u64> {
    if let Some(m) = digit_run().find(s) {
        // 超长数字串无法表示时退回字符串比较
        return m.as_str().parse::<u64>().ok();
    }
    chinese_run()
        .find(s)
        .and_then(|m| parse_chinese_number(m.as_str()))
}

/// 比较两个名称
///
/// 数值相同时再按字符串比较。
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    match (extract_number(a), extract_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// 原地排序名称列表
pub fn sort_labels(labels: &mut [String]) {
    labels.sort_by(|a, b| compare_labels(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arabic_numbers_sort_numerically() {
        assert_eq!(compare_labels("第3章", "第10章"), Ordering::Less);
        assert_eq!(compare_labels("第10章", "第3章"), Ordering::Greater);
    }

    #[test]
    fn test_chinese_numbers_sort_numerically() {
        assert_eq!(compare_labels("第十章", "第二章"), Ordering::Greater);
        assert_eq!(compare_labels("十一", "十二"), Ordering::Less);
        assert_eq!(compare_labels("第九章", "第十一章"), Ordering::Less);
    }

    #[test]
    fn test_lexicographic_fallback() {
        assert_eq!(compare_labels("Alpha", "Beta"), Ordering::Less);
        assert_eq!(compare_labels("第零章", "第零节"), "第零章".cmp("第零节"));
    }

    #[test]
    fn test_numbered_before_unnumbered() {
        assert_eq!(compare_labels("第1章", "附录"), Ordering::Less);
        assert_eq!(compare_labels("Appendix", "第十章"), Ordering::Greater);
    }

    #[test]
    fn test_parse_chinese_number() {
        assert_eq!(parse_chinese_number("十"), Some(10));
        assert_eq!(parse_chinese_number("十一"), Some(11));
        assert_eq!(parse_chinese_number("十九"), Some(19));
        assert_eq!(parse_chinese_number("二十"), Some(20));
        assert_eq!(parse_chinese_number("二十三"), Some(23));
        assert_eq!(parse_chinese_number("七"), Some(7));
        assert_eq!(parse_chinese_number("零"), None);
        assert_eq!(parse_chinese_number(""), None);
    }

    #[test]
    fn test_first_run_wins() {
        assert_eq!(extract_number("第2章第15节"), Some(2));
        assert_eq!(extract_number("第三章 12条"), Some(12));
        assert_eq!(extract_number("第三章 第五节"), Some(3));
        assert_eq!(extract_number("附录"), None);
    }

    #[test]
    fn test_sort_labels() {
        let mut labels: Vec<String> = ["附录", "第十章", "第2章", "第一章", "A型题", "第十一章"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        sort_labels(&mut labels);
        assert_eq!(labels[0], "第一章");
        assert_eq!(labels[1], "第2章");
        assert_eq!(labels[2], "第十章");
        assert_eq!(labels[3], "第十一章");
        assert_eq!(labels[4], "A型题");
        assert_eq!(labels[5], "附录");
    }
}
