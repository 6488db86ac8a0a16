//! 配图服务（第一阶段）- 业务能力层
//!
//! 为 `needs_diagram` 的题目请求 TikZ 代码；太复杂的图交给第二阶段栅格渲染

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::infrastructure::json_extract::{extract_json, json_flag};
use crate::infrastructure::TextOracle;
use crate::models::QuestionRecord;

/// 第一阶段的解析结果
#[derive(Debug, Clone, PartialEq)]
struct DiagramReply {
    diagram_code: Option<String>,
    needs_python_diagram: bool,
}

/// TikZ 配图服务
pub struct DiagramSelector {
    oracle: Arc<dyn TextOracle>,
}

impl DiagramSelector {
    pub fn new(oracle: Arc<dyn TextOracle>) -> Self {
        Self { oracle }
    }

    /// 为题目生成 TikZ 代码
    ///
    /// 未标记 `needs_diagram` 时原样返回；失败时丢弃配图，不会报错
    pub async fn select(&self, mut record: QuestionRecord, topic: &str) -> QuestionRecord {
        if !record.needs_diagram {
            return record;
        }

        match self.request(&record, topic).await {
            Ok(reply) => {
                info!(
                    "🖼️ {} 配图: TikZ={}, 需要栅格图={}",
                    record.question_id,
                    reply.diagram_code.is_some(),
                    reply.needs_python_diagram
                );
                record.diagram_code = reply.diagram_code;
                record.needs_python_diagram = reply.needs_python_diagram;
            }
            Err(e) => {
                warn!("⚠️ {} 配图失败，跳过: {:#}", record.question_id, e);
                record.diagram_code = None;
                record.needs_python_diagram = false;
            }
        }
        record
    }

    async fn request(&self, record: &QuestionRecord, topic: &str) -> Result<DiagramReply> {
        let prompt = build_diagram_prompt(&record.question_text, topic);
        let response = self.oracle.complete(&prompt).await?;
        debug!("配图响应长度: {}", response.len());
        parse_diagram_reply(&response)
    }
}

fn build_diagram_prompt(question_text: &str, topic: &str) -> String {
    format!(
        r#"Generate a LaTeX TikZ or PGFPlots diagram for this question:

{question_text}
Topic: {topic}

If the diagram is simple (graphs, basic geometry), provide TikZ code.
If complex (data visualization, network graphs), set needs_python_diagram: true.

Return JSON:
{{
    "diagram_code": "\\begin{{tikzpicture}}...\\end{{tikzpicture}}",
    "needs_python_diagram": false
}}"#
    )
}

fn parse_diagram_reply(response: &str) -> Result<DiagramReply> {
    let value = extract_json(response).context("响应中没有找到 JSON")?;
    let obj = value.as_object().context("配图结果不是 JSON 对象")?;

    let diagram_code = obj
        .get("diagram_code")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string);
    let needs_python_diagram = json_flag(obj, "needs_python_diagram");

    Ok(DiagramReply {
        diagram_code,
        needs_python_diagram,
    })
}
