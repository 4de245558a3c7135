/// SSE行缓冲工具
/// 网络分片可能把一行 `data: {...}` 切成多段，这里把它们重新拼成完整的行
pub struct SseLineBuffer {
    buffer: String,
    /// 上一个分片末尾不完整的 UTF-8 字节
    pending_bytes: Vec<u8>,
}

/// 一行 SSE 的含义
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// `data: {...}` 中的负载
    Data(&'a str),
    /// `data: [DONE]` 结束标记
    Done,
    /// 空行、注释行（`: keep-alive`）或其他字段
    Ignored,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            pending_bytes: Vec::new(),
        }
    }

    /// 处理原始字节分片；多字节字符被切断时，残缺部分留到下一个分片再解码
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(bytes);
        let text = match std::str::from_utf8(&self.pending_bytes) {
            Ok(text) => {
                let text = text.to_string();
                self.pending_bytes.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending_bytes[..valid]).into_owned();
                self.pending_bytes.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending_bytes).into_owned();
                self.pending_bytes.clear();
                text
            }
        };
        self.process_chunk(&text)
    }

    /// 处理新到达的chunk数据，返回完整的行
    pub fn process_chunk(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let last_line_complete = self.buffer.ends_with('\n');
        let split_lines: Vec<&str> = self.buffer.lines().collect();
        if split_lines.is_empty() {
            return Vec::new();
        }

        if last_line_complete {
            let lines = split_lines.iter().map(|s| s.to_string()).collect();
            self.buffer.clear();
            return lines;
        }

        // 最后一行不完整，留在缓冲区等待下一个 chunk
        let (complete, tail) = split_lines.split_at(split_lines.len() - 1);
        let lines = complete.iter().map(|s| s.to_string()).collect();
        self.buffer = tail[0].to_string();
        lines
    }

    /// 检查缓冲区是否有剩余数据
    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty() || !self.pending_bytes.is_empty()
    }

    /// 获取剩余的不完整行（流结束时调用）
    pub fn flush(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.buffer.push_str(&tail);
            self.pending_bytes.clear();
        }
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// 解析一行 SSE
    pub fn classify(line: &str) -> SseLine<'_> {
        let trimmed = line.trim();
        let Some(payload) = trimmed.strip_prefix("data:") else {
            return SseLine::Ignored;
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            SseLine::Done
        } else if payload.is_empty() {
            SseLine::Ignored
        } else {
            SseLine::Data(payload)
        }
    }
}

impl Default for SseLineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
