//! 续写（从 JSON 重新渲染）- 编排层
//!
//! 跳过想法、出题、校验、配图，只把已保存的题目重新写一遍文档，不调用模型

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, ResumeError};
use crate::models::PaperData;
use crate::orchestrator::output_layout::OutputLayout;
use crate::services::DocumentWriter;

/// 续写结果
#[derive(Debug, Clone)]
pub struct ResumeOutcome {
    pub topic: String,
    pub class_level: String,
    pub total_questions: usize,
    pub tex_path: PathBuf,
    pub images_dir: PathBuf,
}

/// 从 JSON 文件重新生成文档
///
/// 命令行提供的主题 / 年级优先，否则使用 JSON 中的值
pub fn resume_from_json(
    json_path: &Path,
    topic: Option<&str>,
    class_level: Option<&str>,
    config: &Config,
) -> Result<ResumeOutcome, AppError> {
    info!("📂 正在加载题目数据: {}", json_path.display());
    let data = PaperData::load(json_path)?;
    info!("✓ 加载了 {} 道题", data.questions.len());

    if data.questions.is_empty() {
        return Err(ResumeError::EmptyQuestionSet {
            path: json_path.display().to_string(),
        }
        .into());
    }

    let topic = pick(topic, &data.topic, "主题")?;
    let class_level = pick(class_level, &data.class_level, "年级")?;

    let layout = OutputLayout::new(&config.output_dir, &topic, &class_level);
    layout.prepare()?;

    let mut writer = DocumentWriter::with_subject(config.subject.as_str());
    writer.open(&layout.tex_path, &topic, &class_level)?;

    let total = data.questions.len();
    for (index, record) in data.questions.iter().enumerate() {
        info!("📝 写入第 {}/{} 题", index + 1, total);
        if record.needs_diagram && record.diagram_code.is_none() && record.image_path.is_none() {
            warn!("   ⚠️ 跳过配图生成（续写模式不调用模型）");
        }
        writer.append(record)?;
    }

    let tex_path = writer.close()?;

    Ok(ResumeOutcome {
        topic,
        class_level,
        total_questions: total,
        tex_path,
        images_dir: layout.images_dir,
    })
}

fn pick(cli: Option<&str>, stored: &str, field: &str) -> Result<String, ResumeError> {
    cli.map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| Some(stored.trim()).filter(|v| !v.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| ResumeError::MissingMetadata {
            field: field.to_string(),
        })
}
