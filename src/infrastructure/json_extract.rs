//! 从模型的自由文本中提取结构化数据
//!
//! 按以下顺序尝试，第一个成功的结果胜出：
//! 1. 整段文本严格解析
//! 2. Markdown 代码块（```json ... ```）
//! 3. 从每个 `{` 开始做括号配对扫描（识别字符串和转义）
//! 4. 第一个 `{` 到最后一个 `}` 的贪婪区间（数组同理）

use anyhow::{Context, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// 括号配对扫描最多尝试的起点数
const MAX_SCAN_STARTS: usize = 64;

fn fence_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```").ok())
        .as_ref()
}

/// 提取第一个能解析的 JSON 值
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // 方法1：整段严格解析
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    // 方法2：代码块
    let fenced = fence_regex().into_iter().flat_map(|re| re.captures_iter(trimmed));
    for caps in fenced {
        let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return Some(value);
        }
    }

    // 方法3：括号配对
    if let Some(value) = balanced_scan(trimmed) {
        return Some(value);
    }

    // 方法4：贪婪区间
    greedy_span(trimmed, '{', '}').or_else(|| greedy_span(trimmed, '[', ']'))
}

/// 提取并反序列化为指定类型
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json(text).context("响应中没有找到可解析的 JSON")?;
    serde_json::from_value(value).context("JSON 结构与预期不符")
}

/// 返回第一个代码块的内容（不关心语言标记）
pub fn extract_fenced_block(text: &str) -> Option<String> {
    fence_regex()?
        .captures(text)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|body| !body.is_empty())
}

/// 模型返回的布尔字段：接受 `true`、`"true"`、`"yes"` 和非零数字
pub fn json_flag(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes")
        }
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

/// 从前 `MAX_SCAN_STARTS` 个 `{` 出发寻找与之配对的 `}`，返回第一个可解析的对象
fn balanced_scan(text: &str) -> Option<Value> {
    for (start, _) in text.match_indices('{').take(MAX_SCAN_STARTS) {
        if let Some(end) = matching_brace(&text[start..]) {
            let candidate = &text[start..start + end + 1];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Some(value);
            }
        }
    }
    None
}

/// 返回与开头 `{` 配对的 `}` 的字节偏移
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn greedy_span(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
