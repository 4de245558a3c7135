//! 文本相关的安全工具函数
//!
//! 提供 UTF-8 安全的截断与密钥脱敏，避免字节级切片导致 panic

/// 按字符安全截断字符串，若超过则追加省略号
pub fn safe_truncate(input: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }

    let mut result = String::with_capacity(max_chars.min(input.len()) + 3);
    let mut iter = input.chars();

    for _ in 0..max_chars {
        match iter.next() {
            Some(ch) => result.push(ch),
            None => return result,
        }
    }

    if iter.next().is_some() {
        result.push_str("...");
    }

    result
}

/// API Key 脱敏：只保留前 4 个字符
pub fn mask_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "EMPTY".to_string();
    }
    let count = trimmed.chars().count();
    let prefix: String = trimmed.chars().take(4.min(count)).collect();
    format!("{}**** (len={})", prefix, count)
}
