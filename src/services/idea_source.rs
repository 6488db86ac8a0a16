//! 出题想法服务 - 业务能力层
//!
//! 只负责"给一个主题，拿回一批想法"，永远不返回错误

use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::infrastructure::json_extract::extract_json;
use crate::infrastructure::{run_with_retry, RetryPolicy, TextOracle};

/// 兜底想法的数量
pub const FALLBACK_IDEA_COUNT: usize = 40;

/// 想法来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdeaOrigin {
    /// 模型返回的真实想法
    Oracle,
    /// 模型失败后生成的占位想法
    Synthetic,
}

/// 一批想法
#[derive(Debug, Clone)]
pub struct IdeaBatch {
    pub ideas: Vec<String>,
    pub origin: IdeaOrigin,
}

impl IdeaBatch {
    pub fn is_synthetic(&self) -> bool {
        self.origin == IdeaOrigin::Synthetic
    }

    /// 确定性的兜底批次
    pub fn fallback(topic: &str, class_level: &str) -> Self {
        Self {
            ideas: (1..=FALLBACK_IDEA_COUNT)
                .map(|i| format!("Core concept {} of {} for {}", i, topic, class_level))
                .collect(),
            origin: IdeaOrigin::Synthetic,
        }
    }
}

/// 出题想法服务
pub struct IdeaSource {
    oracle: Arc<dyn TextOracle>,
    policy: RetryPolicy,
}

impl IdeaSource {
    pub fn new(oracle: Arc<dyn TextOracle>, policy: RetryPolicy) -> Self {
        Self { oracle, policy }
    }

    /// 获取一批想法，失败时返回兜底批次
    pub async fn fetch(&self, topic: &str, class_level: &str) -> IdeaBatch {
        let prompt = build_ideas_prompt(topic, class_level);
        let prompt = prompt.as_str();
        let oracle = &self.oracle;

        let result = run_with_retry(self.policy, "想法生成", |_| async move {
            let response = oracle.complete(prompt).await?;
            parse_ideas(&response).context("响应中没有可用的想法列表")
        })
        .await;

        match result {
            Ok(ideas) => {
                info!("✓ 获得 {} 个出题想法", ideas.len());
                IdeaBatch {
                    ideas,
                    origin: IdeaOrigin::Oracle,
                }
            }
            Err(e) => {
                warn!("⚠️ 想法生成失败，使用兜底想法: {}", e);
                IdeaBatch::fallback(topic, class_level)
            }
        }
    }
}

fn build_ideas_prompt(topic: &str, class_level: &str) -> String {
    format!(
        r#"Research and collect 40-50 creative question ideas for the topic: "{topic}"
Suitable for: {class_level}

Focus on:
- Higher-order thinking questions
- Application-based problems
- Conceptual understanding
- Problem-solving scenarios

Each idea is one short phrase describing a question theme.

Return ONLY a valid JSON object in this format:
{{
    "topic": "{topic}",
    "class_level": "{class_level}",
    "ideas": [
        "Roots and coefficients relation problems",
        "Nature of roots with parameter-based conditions",
        "Graphical interpretation of quadratic functions"
    ]
}}"#
    )
}

/// 解析想法列表：`{"ideas": [...]}` 或直接是数组；空列表视为失败
fn parse_ideas(response: &str) -> Option<Vec<String>> {
    let value = extract_json(response)?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("ideas")?.as_array()?,
        _ => return None,
    };

    let ideas: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|idea| !idea.is_empty())
        .map(str::to_string)
        .collect();

    debug!("解析出 {} 个想法（原始 {} 项）", ideas.len(), items.len());
    if ideas.is_empty() {
        None
    } else {
        Some(ideas)
    }
}
