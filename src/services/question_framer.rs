//! 出题服务 - 业务能力层
//!
//! 把一个想法变成一道结构化的四选一题目
//!
//! 职责：
//! - 调用模型出题并容错解析
//! - 拒绝占位题（"Sample question"、"Option 1" 之类）
//! - 规范化选项和正确答案
//! - 不分配题号、不决定难度（由控制器传入）

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::FramingError;
use crate::infrastructure::json_extract::{extract_json, json_flag};
use crate::infrastructure::{run_with_retry, RetryPolicy, TextOracle};
use crate::models::{Difficulty, OptionLabel, QuestionRecord};
use crate::utils::truncate_text;

/// 占位题特征（小写匹配题干）
const PLACEHOLDER_MARKERS: &[&str] = &["sample question", "option 1"];

/// 出题服务
pub struct QuestionFramer {
    oracle: Arc<dyn TextOracle>,
    policy: RetryPolicy,
}

impl QuestionFramer {
    pub fn new(oracle: Arc<dyn TextOracle>, policy: RetryPolicy) -> Self {
        Self { oracle, policy }
    }

    /// 根据想法出一道题
    ///
    /// # 参数
    /// - `idea`: 想法（重出时会附带校验反馈）
    /// - `question_id`: 控制器分配的题号
    /// - `difficulty`: 控制器分配的难度
    ///
    /// # 返回
    /// 所有尝试都失败时返回 `FramingError::Exhausted`
    pub async fn frame(
        &self,
        idea: &str,
        topic: &str,
        class_level: &str,
        question_id: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionRecord, FramingError> {
        let prompt = build_framing_prompt(idea, topic, class_level, question_id, difficulty);
        let prompt = prompt.as_str();
        let oracle = &self.oracle;
        let label = format!("出题 {}", question_id);

        run_with_retry(self.policy, &label, |attempt| async move {
            debug!("{} 第 {} 次尝试", question_id, attempt);
            let response = oracle.complete(prompt).await?;
            parse_framed_question(&response, question_id, difficulty)
        })
        .await
        .map_err(|e| FramingError::Exhausted {
            question_id: question_id.to_string(),
            attempts: e.attempts,
            idea_preview: truncate_text(idea, 50),
            last_error: format!("{:#}", e.last_error),
        })
    }
}

fn build_framing_prompt(
    idea: &str,
    topic: &str,
    class_level: &str,
    question_id: &str,
    difficulty: Difficulty,
) -> String {
    format!(
        r#"Convert this question idea into a complete MCQ:

Idea: {idea}
Topic: {topic}
Class Level: {class_level}
Difficulty: {difficulty}
Question ID: {question_id}

Create a well-framed MCQ with:
1. Clear question statement (use LaTeX for math: $...$ or $$...$$)
2. Exactly 4 options WITHOUT labels (just the option text, no "A:", "B:", etc.)
3. One correct option (specify as "A", "B", "C", or "D")
4. Options should be plausible but only one is correct
5. Do NOT include options in the question_text - keep them separate
6. Set needs_diagram to true only if the question cannot be answered without a figure

Return ONLY valid JSON (no markdown, no code blocks):
{{
    "question_id": "{question_id}",
    "question_text": "If $\\alpha$ and $\\beta$ are the roots of $x^2 + px + q = 0$, then the value of $\\alpha^2 + \\beta^2$ is:",
    "options": ["$p^2 - 2q$", "$p^2 + 2q$", "$2q - p^2$", "$p^2 / q$"],
    "correct_option": "A",
    "difficulty": "{difficulty}",
    "needs_diagram": false
}}"#
    )
}

/// 解析并规范化一次出题结果；任何不合格都返回错误，交给重试
fn parse_framed_question(
    response: &str,
    question_id: &str,
    difficulty: Difficulty,
) -> Result<QuestionRecord> {
    let value = extract_json(response).context("响应中没有找到 JSON")?;
    let obj = value.as_object().context("题目不是 JSON 对象")?;

    let question_text = obj
        .get("question_text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .context("Missing or empty question_text")?;

    let raw_options = obj
        .get("options")
        .and_then(Value::as_array)
        .context("Missing or invalid options")?;

    if is_placeholder(question_text) {
        bail!("Detected fallback/sample question");
    }

    let mut record = QuestionRecord {
        question_id: question_id.to_string(),
        question_text: question_text.to_string(),
        options: raw_options.iter().map(option_to_string).collect(),
        correct_option: correct_option_of(obj),
        difficulty,
        needs_diagram: json_flag(obj, "needs_diagram"),
        needs_python_diagram: false,
        diagram_code: None,
        image_path: None,
        filled_options: Vec::new(),
    };
    record.normalize_options();

    Ok(record)
}

pub(crate) fn is_placeholder(question_text: &str) -> bool {
    let lower = question_text.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn option_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn correct_option_of(obj: &Map<String, Value>) -> OptionLabel {
    obj.get("correct_option")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}
