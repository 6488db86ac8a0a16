use serde::{Deserialize, Serialize};
use std::path::Path;

use super::question::{AnswerKeyEntry, QuestionRecord};
use crate::error::FileError;

/// 持久化的试卷数据（.json）
///
/// 生成结束时写一次；`--from-json` 读回来重新渲染文档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperData {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub class_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
    #[serde(default)]
    pub total_questions: usize,
    #[serde(default)]
    pub answer_key: Vec<AnswerKeyEntry>,
}

impl PaperData {
    pub fn new(topic: &str, class_level: &str, questions: Vec<QuestionRecord>) -> Self {
        let answer_key = questions
            .iter()
            .map(QuestionRecord::answer_key_entry)
            .collect();
        Self {
            topic: topic.to_string(),
            class_level: class_level.to_string(),
            generated_at: Some(chrono::Local::now().to_rfc3339()),
            total_questions: questions.len(),
            questions,
            answer_key,
        }
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self, FileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| FileError::read_failed(path, e))?;
        serde_json::from_str(&content).map_err(|e| FileError::JsonParseFailed {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// 写入 JSON 文件（UTF-8，带缩进）
    pub fn save(&self, path: &Path) -> Result<(), FileError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| FileError::JsonSerializeFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| FileError::write_failed(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, OptionLabel};
    use serde_json::json;

    fn record(id: &str, correct: OptionLabel) -> QuestionRecord {
        QuestionRecord {
            question_id: id.to_string(),
            question_text: format!("Question {}", id),
            options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
            correct_option: correct,
            difficulty: Difficulty::Basic,
            needs_diagram: false,
            needs_python_diagram: false,
            diagram_code: None,
            image_path: None,
            filled_options: Vec::new(),
        }
    }

    #[test]
    fn test_new_derives_answer_key_and_total() {
        let data = PaperData::new(
            "Triangles",
            "Class 7",
            vec![record("Q01", OptionLabel::C), record("Q02", OptionLabel::A)],
        );
        assert_eq!(data.total_questions, 2);
        assert_eq!(data.answer_key[0].question_id, "Q01");
        assert_eq!(data.answer_key[0].correct_option, OptionLabel::C);
        assert!(data.generated_at.is_some());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.json");
        let data = PaperData::new(
            "Área & Perímetro",
            "Class 7",
            vec![record("Q01", OptionLabel::D)],
        );
        data.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        // 非 ASCII 字符原样保留，并且是带缩进的格式
        assert!(content.contains("Área"));
        assert!(content.contains("\n  \"topic\""));
        assert!(content.contains(r#""answer_key": ["#));

        let loaded = PaperData::load(&path).unwrap();
        assert_eq!(loaded.questions, data.questions);
        assert_eq!(loaded.answer_key, data.answer_key);
    }

    #[test]
    fn test_load_minimal_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        std::fs::write(
            &path,
            json!({"questions": [{"question_text": "x", "options": ["a"]}]}).to_string(),
        )
        .unwrap();

        let loaded = PaperData::load(&path).unwrap();
        assert_eq!(loaded.questions.len(), 1);
        assert!(loaded.topic.is_empty());
        assert!(loaded.answer_key.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = PaperData::load(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(FileError::ReadFailed { .. })));
    }
}
