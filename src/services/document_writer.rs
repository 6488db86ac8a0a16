//! 文档写入服务 - 业务能力层
//!
//! 只负责"把一道题追加到 LaTeX 文档"，不关心题目从哪来
//!
//! 职责：
//! - open 时写一次文件头
//! - 每次 append 写一个题目块并立即落盘（flush + sync）
//! - close 时写结尾和答案表
//! - 选项清洗和 LaTeX 转义

use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::DocumentError;
use crate::models::{
    strip_option_label, AnswerKeyEntry, QuestionRecord, OPTION_COUNT,
};

/// 缺失选项在文档中的占位（原样写入，不转义）
pub const INCOMPLETE_OPTION: &str = r"\ldots (incomplete)";

const DEFAULT_SUBJECT: &str = "Mathematics";

enum WriterState {
    Idle,
    Open { file: File, path: PathBuf },
    Closed,
}

/// LaTeX 文档写入器
///
/// 状态：Idle -> Open -> Closed，只能向前
pub struct DocumentWriter {
    subject: String,
    state: WriterState,
    question_count: usize,
    answer_key: Vec<AnswerKeyEntry>,
}

impl DocumentWriter {
    pub fn new() -> Self {
        Self::with_subject(DEFAULT_SUBJECT)
    }

    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            state: WriterState::Idle,
            question_count: 0,
            answer_key: Vec::new(),
        }
    }

    /// 创建文件并写入文件头
    pub fn open(
        &mut self,
        path: &Path,
        title: &str,
        class_level: &str,
    ) -> Result<(), DocumentError> {
        match &self.state {
            WriterState::Idle => {}
            WriterState::Open { path, .. } => {
                return Err(DocumentError::AlreadyOpen {
                    path: path.display().to_string(),
                })
            }
            WriterState::Closed => return Err(DocumentError::AlreadyClosed),
        }

        let file = File::create(path).map_err(|e| io_error(path, e))?;
        self.state = WriterState::Open {
            file,
            path: path.to_path_buf(),
        };

        let header = render_header(&self.subject, title, class_level);
        self.write_durable(&header)?;
        info!("📄 文档已创建: {}", path.display());
        Ok(())
    }

    /// 追加一道题并立即落盘
    pub fn append(&mut self, record: &QuestionRecord) -> Result<(), DocumentError> {
        self.ensure_open()?;

        let number = self.question_count + 1;
        let question_id = if record.question_id.trim().is_empty() {
            format!("Q{:02}", number)
        } else {
            record.question_id.clone()
        };

        let block = render_block(number, &question_id, record);
        self.write_durable(&block)?;

        self.question_count = number;
        self.answer_key.push(AnswerKeyEntry {
            question_id,
            correct_option: record.correct_option,
        });
        debug!("已写入第 {} 题", number);
        Ok(())
    }

    /// 写入结尾和答案表并关闭文件，返回文档路径
    pub fn close(&mut self) -> Result<PathBuf, DocumentError> {
        self.ensure_open()?;

        let trailer = render_trailer(&self.answer_key);
        self.write_durable(&trailer)?;

        match std::mem::replace(&mut self.state, WriterState::Closed) {
            WriterState::Open { path, .. } => {
                info!("📄 文档已完成: {} ({} 题)", path.display(), self.question_count);
                Ok(path)
            }
            _ => Err(DocumentError::NotInitialized),
        }
    }

    #[cfg(test)]
    pub fn question_count(&self) -> usize {
        self.question_count
    }

    #[cfg(test)]
    pub fn answer_key(&self) -> &[AnswerKeyEntry] {
        &self.answer_key
    }

    fn ensure_open(&self) -> Result<(), DocumentError> {
        match self.state {
            WriterState::Open { .. } => Ok(()),
            WriterState::Idle => Err(DocumentError::NotInitialized),
            WriterState::Closed => Err(DocumentError::AlreadyClosed),
        }
    }

    fn write_durable(&mut self, content: &str) -> Result<(), DocumentError> {
        let WriterState::Open { file, path } = &mut self.state else {
            return Err(DocumentError::NotInitialized);
        };
        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|e| io_error(path, e))
    }
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn render_header(subject: &str, title: &str, class_level: &str) -> String {
    format!(
        r"\documentclass[a4paper,12pt]{{article}}

\usepackage{{worksheet}}
\usepackage{{amsmath}}
\usepackage{{graphicx}}

\setsubject{{{subject}}}
\setclass{{{class_level}}}
\setworksheettitle{{{title}}}

\begin{{document}}

\makeworksheetheader

\begin{{enumerate}}

",
        subject = escape_latex(subject),
        class_level = escape_latex(class_level),
        title = escape_latex(title),
    )
}

fn render_block(number: usize, question_id: &str, record: &QuestionRecord) -> String {
    let mut options = clean_options(&record.options, &record.filled_options);
    let mut question_text = record.question_text.trim().to_string();

    // 选项全部缺失时，尝试从题干里找回内嵌的 A. B. C. D. 四行
    if options.iter().all(|opt| opt == INCOMPLETE_OPTION) {
        if let Some((recovered, remaining)) = recover_embedded_options(&question_text) {
            debug!("{} 从题干中找回了内嵌选项", question_id);
            options = recovered;
            question_text = remaining;
        }
    }

    let mut block = format!(
        "  % Question {} ({})\n  \\item {}\n",
        number, question_id, question_text
    );

    if let Some(code) = record.diagram_code.as_deref().filter(|c| !c.trim().is_empty()) {
        block.push_str(&format!("  \\begin{{center}}\n  {}\n  \\end{{center}}\n", code.trim()));
    } else if let Some(image) = record.image_path.as_deref().filter(|p| !p.trim().is_empty()) {
        block.push_str(&format!(
            "  \\begin{{center}}\n  \\includegraphics[width=0.8\\textwidth]{{{}}}\n  \\end{{center}}\n",
            relative_image_path(image)
        ));
    }

    let rendered: Vec<String> = options
        .iter()
        .map(|opt| {
            if opt == INCOMPLETE_OPTION {
                opt.clone()
            } else {
                escape_latex(opt)
            }
        })
        .collect();
    block.push_str(&format!(
        "  \\equidistantoptions{{{}}}{{{}}}{{{}}}{{{}}}\n\n",
        rendered[0], rendered[1], rendered[2], rendered[3]
    ));
    block
}

fn render_trailer(answer_key: &[AnswerKeyEntry]) -> String {
    let mut trailer = String::new();
    if answer_key.is_empty() {
        trailer.push_str("  \\item[] No questions were generated.\n\n");
    }
    trailer.push_str("\\end{enumerate}\n\n\\newpage\n\\section*{Answer Key}\n\n");
    for entry in answer_key {
        trailer.push_str(&format!(
            "\\textbf{{{}:}} {}\\\\\n",
            escape_latex(&entry.question_id),
            entry.correct_option
        ));
    }
    trailer.push_str("\n\\end{document}\n");
    trailer
}

/// 清洗选项：恰好 4 个，去掉字母前缀，缺失、补齐或残留标点的用占位
///
/// `filled` 是规范化时补上的位置；模型真正给出的 "N/A" 原样保留
pub fn clean_options(options: &[String], filled: &[usize]) -> Vec<String> {
    let mut cleaned: Vec<String> = options
        .iter()
        .take(OPTION_COUNT)
        .enumerate()
        .map(|(i, opt)| {
            if filled.contains(&i) {
                INCOMPLETE_OPTION.to_string()
            } else {
                clean_option(opt)
            }
        })
        .collect();
    cleaned.resize(OPTION_COUNT, INCOMPLETE_OPTION.to_string());
    cleaned
}

fn clean_option(option: &str) -> String {
    let stripped = strip_option_label(option);
    if stripped.is_empty() || stripped == ":" || stripped.starts_with(": ") {
        INCOMPLETE_OPTION.to_string()
    } else {
        stripped.to_string()
    }
}

fn embedded_options_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*[A-Da-d][.)][ \t]+\S[^\n]*(?:\n[ \t]*[A-Da-d][.)][ \t]+\S[^\n]*){3}")
            .ok()
    })
    .as_ref()
}

/// 找回题干中连续四行 "A. xxx" 形式的选项，返回 (选项, 去掉选项后的题干)
fn recover_embedded_options(question_text: &str) -> Option<(Vec<String>, String)> {
    let found = embedded_options_regex()?.find(question_text)?;
    let options: Vec<String> = found
        .as_str()
        .lines()
        .map(|line| strip_option_label(line).to_string())
        .collect();
    if options.len() != OPTION_COUNT {
        return None;
    }

    let remaining = format!(
        "{}{}",
        &question_text[..found.start()],
        &question_text[found.end()..]
    );
    Some((options, remaining.trim().to_string()))
}

/// 统一成相对文档的 `images/xxx.png`
fn relative_image_path(image_path: &str) -> String {
    let normalized = image_path.replace('\\', "/");
    if let Some(idx) = normalized.rfind("images/") {
        return normalized[idx..].to_string();
    }
    Path::new(&normalized)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or(normalized)
}

/// 转义 LaTeX 特殊字符（用于命令参数）
pub fn escape_latex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str(r"\textbackslash{}"),
            '{' => escaped.push_str(r"\{"),
            '}' => escaped.push_str(r"\}"),
            '$' | '&' | '%' | '#' | '_' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '^' => escaped.push_str(r"\textasciicircum{}"),
            '~' => escaped.push_str(r"\textasciitilde{}"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
