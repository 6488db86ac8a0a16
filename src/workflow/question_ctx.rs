//! 题目处理上下文
//!
//! 封装"我正在用哪个想法、以什么难度出第几题"这一信息

use std::fmt::Display;

use crate::models::Difficulty;

/// 题目处理上下文
///
/// 由控制器在每次迭代开始时构建，流程内只读
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 主题
    pub topic: String,

    /// 年级
    pub class_level: String,

    /// 本次迭代分配的题号
    pub question_id: String,

    /// 本次迭代使用的想法
    pub idea: String,

    /// 本次迭代分配的难度
    pub difficulty: Difficulty,

    /// 迭代序号（从1开始，仅用于日志显示）
    pub iteration: usize,
}

impl QuestionCtx {
    /// 创建新的题目上下文
    pub fn new(
        topic: &str,
        class_level: &str,
        question_id: String,
        idea: String,
        difficulty: Difficulty,
        iteration: usize,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            class_level: class_level.to_string(),
            question_id,
            idea,
            difficulty,
            iteration,
        }
    }

    /// 带校验反馈的想法，用于重新出题
    pub fn idea_with_feedback(&self, feedback: &str) -> String {
        format!("{} [Feedback: {}]", self.idea, feedback)
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[迭代 #{} 题号 {} 难度 {}]",
            self.iteration, self.question_id, self.difficulty
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_feedback() {
        let ctx = QuestionCtx::new(
            "Fractions",
            "Class 5",
            "Q03".to_string(),
            "Adding unlike fractions".to_string(),
            Difficulty::Basic,
            7,
        );
        assert_eq!(ctx.to_string(), "[迭代 #7 题号 Q03 难度 basic]");
        assert_eq!(
            ctx.idea_with_feedback("Answer is wrong"),
            "Adding unlike fractions [Feedback: Answer is wrong]"
        );
    }
}
