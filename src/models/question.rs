use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// 选项数量固定为 4
pub const OPTION_COUNT: usize = 4;

/// 出题阶段补齐选项用的占位符
pub const MISSING_OPTION: &str = "N/A";

/// 选项字母 A-D
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum OptionLabel {
    #[default]
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; OPTION_COUNT] =
        [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    /// 在 options 中的下标
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        }
    }

    /// 宽松解析："b"、"(C)"、"D."、"Option B" 都能识别
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let cleaned = raw.trim();
        let cleaned = cleaned
            .strip_prefix("Option")
            .or_else(|| cleaned.strip_prefix("option"))
            .unwrap_or(cleaned);
        let letters: Vec<char> = cleaned
            .chars()
            .filter(|c| !matches!(c, '(' | ')' | '.' | ':' | ' ' | '"' | '\''))
            .collect();
        match letters.as_slice() {
            [c] => match c.to_ascii_uppercase() {
                'A' => Some(OptionLabel::A),
                'B' => Some(OptionLabel::B),
                'C' => Some(OptionLabel::C),
                'D' => Some(OptionLabel::D),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 兼容字符串或数字下标，无法识别时退回 A
impl<'de> Deserialize<'de> for OptionLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Visitor;

        struct LabelVisitor;

        impl<'de> Visitor<'de> for LabelVisitor {
            type Value = OptionLabel;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an option letter A-D or an index 0-3")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(OptionLabel::parse_lenient(value).unwrap_or_default())
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(OptionLabel::from_index(value as usize).unwrap_or_default())
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(usize::try_from(value)
                    .ok()
                    .and_then(OptionLabel::from_index)
                    .unwrap_or_default())
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(OptionLabel::default())
            }
        }

        deserializer.deserialize_any(LabelVisitor)
    }
}

/// 难度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[serde(alias = "easy")]
    Basic,
    #[default]
    #[serde(alias = "medium")]
    Intermediate,
    #[serde(alias = "hard")]
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Basic => "basic",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一道选择题
///
/// 由出题器创建，校验器可能整体替换，通过后写入文档，之后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// 题号（Q01, Q02 ...），由控制器分配
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub question_text: String,
    /// 恰好 4 个选项
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_option: OptionLabel,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub needs_diagram: bool,
    #[serde(default)]
    pub needs_python_diagram: bool,
    /// TikZ 图代码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_code: Option<String>,
    /// 栅格图路径（相对输出目录）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// 规范化时补上的选项位置（原来为空或缺少），写文档时显示为未完成
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filled_options: Vec<usize>,
}

impl QuestionRecord {
    /// 选项规范化：截断到 4 个、去掉 "A." 之类的前缀、空选项和缺少的选项用 N/A 补齐
    ///
    /// 补齐的位置记在 `filled_options`；重复调用结果不变
    pub fn normalize_options(&mut self) {
        self.options.truncate(OPTION_COUNT);
        let options = &self.options;
        let mut filled: Vec<usize> = self
            .filled_options
            .iter()
            .copied()
            .filter(|&i| options.get(i).is_some_and(|o| o == MISSING_OPTION))
            .collect();

        for (i, option) in self.options.iter_mut().enumerate() {
            let stripped = strip_option_label(option);
            if stripped.is_empty() {
                *option = MISSING_OPTION.to_string();
                filled.push(i);
            } else {
                *option = stripped.to_string();
            }
        }
        while self.options.len() < OPTION_COUNT {
            filled.push(self.options.len());
            self.options.push(MISSING_OPTION.to_string());
        }

        filled.sort_unstable();
        filled.dedup();
        self.filled_options = filled;
    }

    pub fn answer_key_entry(&self) -> AnswerKeyEntry {
        AnswerKeyEntry {
            question_id: self.question_id.clone(),
            correct_option: self.correct_option,
        }
    }
}

/// 答案表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, OptionLabel)", into = "(String, OptionLabel)")]
pub struct AnswerKeyEntry {
    pub question_id: String,
    pub correct_option: OptionLabel,
}

impl From<(String, OptionLabel)> for AnswerKeyEntry {
    fn from((question_id, correct_option): (String, OptionLabel)) -> Self {
        Self {
            question_id,
            correct_option,
        }
    }
}

impl From<AnswerKeyEntry> for (String, OptionLabel) {
    fn from(entry: AnswerKeyEntry) -> Self {
        (entry.question_id, entry.correct_option)
    }
}

fn option_label_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    // "(B) 42"、"B) 42"、"B. 42"、"B: 42"；"A right angle" 不算前缀
    RE.get_or_init(|| Regex::new(r"^\s*(?:\([A-Da-d]\)|[A-Da-d][.):])\s*").ok())
        .as_ref()
}

/// 去掉选项开头的字母编号
pub fn strip_option_label(option: &str) -> &str {
    let trimmed = option.trim();
    match option_label_regex().and_then(|re| re.find(trimmed)) {
        Some(m) => trimmed[m.end()..].trim(),
        None => trimmed,
    }
}
