//! 校验服务 - 业务能力层
//!
//! 让模型按清单检查一道题，返回结论、反馈和可选的修正版
//!
//! 模型调用或解析失败时按 `ValidatorFailurePolicy` 处理：
//! - `FailOpen`: 视为通过，避免死循环
//! - `FailClosed`: 视为不通过，由流程重新出题

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ValidatorFailurePolicy;
use crate::infrastructure::json_extract::{extract_json, json_flag};
use crate::infrastructure::TextOracle;
use crate::models::QuestionRecord;

/// 兜底通过时的反馈
pub const FALLBACK_FEEDBACK: &str = "Validation check completed (fallback)";

/// 校验结论
#[derive(Debug, Clone)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub feedback: String,
    /// 不通过且模型给了修正时，合并后的完整题目
    pub corrected: Option<QuestionRecord>,
}

impl ValidationVerdict {
    fn accepted(feedback: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            feedback: feedback.into(),
            corrected: None,
        }
    }
}

/// 校验服务
pub struct Validator {
    oracle: Arc<dyn TextOracle>,
    policy: ValidatorFailurePolicy,
}

impl Validator {
    pub fn new(oracle: Arc<dyn TextOracle>, policy: ValidatorFailurePolicy) -> Self {
        Self { oracle, policy }
    }

    /// 校验一道题，不会返回错误
    pub async fn validate(
        &self,
        record: &QuestionRecord,
        topic: &str,
        class_level: &str,
    ) -> ValidationVerdict {
        match self.try_validate(record, topic, class_level).await {
            Ok(verdict) => verdict,
            Err(e) => self.on_failure(record, e),
        }
    }

    async fn try_validate(
        &self,
        record: &QuestionRecord,
        topic: &str,
        class_level: &str,
    ) -> Result<ValidationVerdict> {
        let prompt = build_validation_prompt(record, topic, class_level)?;
        let response = self.oracle.complete(&prompt).await?;
        parse_verdict(&response, record)
    }

    fn on_failure(&self, record: &QuestionRecord, error: anyhow::Error) -> ValidationVerdict {
        match self.policy {
            ValidatorFailurePolicy::FailOpen => {
                warn!(
                    "⚠️ {} 校验失败，按放行处理: {:#}",
                    record.question_id, error
                );
                ValidationVerdict::accepted(FALLBACK_FEEDBACK)
            }
            ValidatorFailurePolicy::FailClosed => {
                warn!(
                    "⚠️ {} 校验失败，按不通过处理: {:#}",
                    record.question_id, error
                );
                ValidationVerdict {
                    is_valid: false,
                    feedback: format!("Validation could not be completed: {:#}", error),
                    corrected: None,
                }
            }
        }
    }
}

fn build_validation_prompt(
    record: &QuestionRecord,
    topic: &str,
    class_level: &str,
) -> Result<String> {
    let question_json = serde_json::to_string_pretty(record).context("序列化题目失败")?;
    Ok(format!(
        r#"Validate this MCQ question:

{question_json}

Topic: {topic}
Class Level: {class_level}

Check:
1. Is the question mathematically correct?
2. Is exactly one option correct?
3. Is the phrasing clear and unambiguous?
4. Are there any grammatical errors?
5. Is the difficulty appropriate?
6. Is this a real question (NOT a sample/fallback question with placeholder text like "Sample question on", "Option 1", etc.)?
7. Do all options contain actual content (not just "Option 1", "Option 2", etc.)?

Return ONLY valid JSON:
{{
    "is_valid": true/false,
    "feedback": "Detailed feedback",
    "suggested_corrections": {{"question_text": "...", "options": [...], "correct_option": "..."}} or null
}}"#
    ))
}

fn parse_verdict(response: &str, original: &QuestionRecord) -> Result<ValidationVerdict> {
    let value = extract_json(response).context("响应中没有找到 JSON")?;
    let obj = value.as_object().context("校验结果不是 JSON 对象")?;

    // 缺少 is_valid 视为不通过；"true" 字符串也算通过
    let is_valid = json_flag(obj, "is_valid");
    let feedback = obj
        .get("feedback")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if is_valid {
        return Ok(ValidationVerdict::accepted(feedback));
    }

    let corrected = match obj.get("suggested_corrections") {
        Some(Value::Object(patch)) if !patch.is_empty() => merge_corrections(original, patch),
        _ => None,
    };

    debug!(
        "{} 未通过校验，修正版: {}",
        original.question_id,
        if corrected.is_some() { "有" } else { "无" }
    );

    Ok(ValidationVerdict {
        is_valid: false,
        feedback,
        corrected,
    })
}

/// 把修正字段覆盖到原题上，再重新规范化；题号和难度保持不变
fn merge_corrections(
    original: &QuestionRecord,
    patch: &serde_json::Map<String, Value>,
) -> Option<QuestionRecord> {
    let mut merged = serde_json::to_value(original).ok()?;
    let target = merged.as_object_mut()?;
    // 换了选项就重新判断哪些位置是补齐的
    if patch.contains_key("options") {
        target.remove("filled_options");
    }
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }

    let mut record: QuestionRecord = match serde_json::from_value(merged) {
        Ok(record) => record,
        Err(e) => {
            warn!("修正版无法解析，忽略: {}", e);
            return None;
        }
    };
    record.question_id = original.question_id.clone();
    record.difficulty = original.difficulty;
    record.normalize_options();
    Some(record)
}
