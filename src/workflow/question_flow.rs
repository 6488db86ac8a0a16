//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一次迭代"的完整处理流程
//!
//! 流程顺序：
//! 1. 出题（失败则放弃本次迭代）
//! 2. 校验循环：不通过时优先采用修正版，否则带反馈重新出题
//! 3. 配图：TikZ → 需要时升级为栅格图

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::{RetryPolicy, TextOracle};
use crate::models::QuestionRecord;
use crate::services::{DiagramRenderer, DiagramSelector, QuestionFramer, Validator};
use crate::utils::truncate_text;
use crate::workflow::question_ctx::QuestionCtx;

/// 一次迭代的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    /// 通过校验（已完成配图）
    Accepted(QuestionRecord),
    /// 出题重试用尽
    FramingFailed,
    /// 校验次数用尽
    ValidationExhausted,
}

/// 题目处理流程
///
/// - 编排出题、校验、配图的顺序
/// - 决定何时采用修正版、何时重新出题
/// - 不分配题号，不写文档
pub struct QuestionFlow {
    framer: QuestionFramer,
    validator: Validator,
    selector: DiagramSelector,
    renderer: DiagramRenderer,
    validation_attempts: u32,
}

impl QuestionFlow {
    /// 创建新的题目处理流程，所有服务共用同一个 Oracle
    pub fn new(oracle: Arc<dyn TextOracle>, config: &Config) -> Self {
        let framing_policy = RetryPolicy::new(config.framing_attempts, config.retry_backoff());
        Self {
            framer: QuestionFramer::new(oracle.clone(), framing_policy),
            validator: Validator::new(oracle.clone(), config.validator_failure_policy),
            selector: DiagramSelector::new(oracle.clone()),
            renderer: DiagramRenderer::new(oracle, &config.output_dir),
            validation_attempts: config.validation_attempts.max(1),
        }
    }

    pub async fn run(&self, ctx: &QuestionCtx) -> ProcessResult {
        debug!("{} 想法: {}", ctx, truncate_text(&ctx.idea, 60));

        // ========== 1. 出题 ==========
        let mut record = match self.frame(ctx, &ctx.idea).await {
            Some(record) => record,
            None => return ProcessResult::FramingFailed,
        };

        // ========== 2. 校验循环 ==========
        let mut accepted = false;
        for attempt in 1..=self.validation_attempts {
            let verdict = self
                .validator
                .validate(&record, &ctx.topic, &ctx.class_level)
                .await;

            if verdict.is_valid {
                info!("{} ✅ 校验通过", ctx);
                accepted = true;
                break;
            }

            warn!(
                "{} ⚠️ 校验未通过 (第 {}/{} 次): {}",
                ctx,
                attempt,
                self.validation_attempts,
                truncate_text(&verdict.feedback, 50)
            );
            if attempt == self.validation_attempts {
                break;
            }

            record = match verdict.corrected {
                Some(corrected) => {
                    debug!("{} 采用修正版", ctx);
                    corrected
                }
                None => {
                    let idea = ctx.idea_with_feedback(&verdict.feedback);
                    match self.frame(ctx, &idea).await {
                        Some(record) => record,
                        None => return ProcessResult::FramingFailed,
                    }
                }
            };
        }

        if !accepted {
            warn!(
                "{} ❌ {} 次校验均未通过，放弃",
                ctx, self.validation_attempts
            );
            return ProcessResult::ValidationExhausted;
        }

        // ========== 3. 配图 ==========
        if record.needs_diagram {
            info!("{} 🎨 生成配图...", ctx);
            record = self.selector.select(record, &ctx.topic).await;
            record = self.renderer.render(record, &ctx.topic).await;
        }

        ProcessResult::Accepted(record)
    }

    async fn frame(&self, ctx: &QuestionCtx, idea: &str) -> Option<QuestionRecord> {
        match self
            .framer
            .frame(
                idea,
                &ctx.topic,
                &ctx.class_level,
                &ctx.question_id,
                ctx.difficulty,
            )
            .await
        {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("{} ❌ 出题失败: {}", ctx, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::oracle::testing::RoutingOracle;
    use crate::models::{Difficulty, OptionLabel};

    const FRAME: &str = "Convert this question idea";
    const VALIDATE: &str = "Validate this MCQ";
    const TIKZ: &str = "TikZ";
    const DRAW: &str = "drawing program";

    const GOOD_QUESTION: &str = r#"{"question_text": "What is 7 x 8?", "options": ["54", "56", "58", "64"], "correct_option": "B"}"#;
    const VALID: &str = r#"{"is_valid": true, "feedback": "ok"}"#;
    const INVALID: &str = r#"{"is_valid": false, "feedback": "Answer does not match"}"#;

    fn ctx() -> QuestionCtx {
        QuestionCtx::new(
            "Multiplication",
            "Class 3",
            "Q02".to_string(),
            "Times tables".to_string(),
            Difficulty::Basic,
            2,
        )
    }

    fn flow(oracle: RoutingOracle, dir: &std::path::Path) -> (Arc<RoutingOracle>, QuestionFlow) {
        let oracle = Arc::new(oracle);
        let config = Config {
            output_dir: dir.to_path_buf(),
            retry_backoff_ms: 0,
            ..Config::default()
        };
        let flow = QuestionFlow::new(oracle.clone(), &config);
        (oracle, flow)
    }

    #[tokio::test]
    async fn test_accepts_valid_question() {
        let dir = tempfile::tempdir().unwrap();
        let (oracle, flow) = flow(
            RoutingOracle::new()
                .always(VALIDATE, Ok(VALID))
                .always(FRAME, Ok(GOOD_QUESTION)),
            dir.path(),
        );

        match flow.run(&ctx()).await {
            ProcessResult::Accepted(record) => {
                assert_eq!(record.question_id, "Q02");
                assert_eq!(record.correct_option, OptionLabel::B);
            }
            other => panic!("应该通过: {:?}", other),
        }
        assert_eq!(oracle.calls_matching(FRAME), 1);
        assert_eq!(oracle.calls_matching(TIKZ), 0);
    }

    #[tokio::test]
    async fn test_framing_failure_abandons_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let (oracle, flow) = flow(RoutingOracle::new().always(FRAME, Err("down")), dir.path());

        assert_eq!(flow.run(&ctx()).await, ProcessResult::FramingFailed);
        assert_eq!(oracle.calls_matching(FRAME), 3);
        assert_eq!(oracle.calls_matching(VALIDATE), 0);
    }

    #[tokio::test]
    async fn test_rejection_without_correction_reframes_with_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let (oracle, flow) = flow(
            RoutingOracle::new()
                .route(VALIDATE, vec![Ok(INVALID), Ok(VALID)])
                .always(FRAME, Ok(GOOD_QUESTION)),
            dir.path(),
        );

        assert!(matches!(flow.run(&ctx()).await, ProcessResult::Accepted(_)));
        let frames = oracle.prompts_matching(FRAME);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].contains("Idea: Times tables [Feedback: Answer does not match]"));
    }

    #[tokio::test]
    async fn test_correction_is_revalidated_without_reframing() {
        let dir = tempfile::tempdir().unwrap();
        let corrected = r#"{"is_valid": false, "feedback": "wrong key", "suggested_corrections": {"correct_option": "B", "question_text": "What is 8 x 7?"}}"#;
        let (oracle, flow) = flow(
            RoutingOracle::new()
                .route(VALIDATE, vec![Ok(corrected), Ok(VALID)])
                .always(FRAME, Ok(GOOD_QUESTION)),
            dir.path(),
        );

        match flow.run(&ctx()).await {
            ProcessResult::Accepted(record) => assert_eq!(record.question_text, "What is 8 x 7?"),
            other => panic!("修正版应该通过: {:?}", other),
        }
        assert_eq!(oracle.calls_matching(FRAME), 1);
        assert_eq!(oracle.calls_matching(VALIDATE), 2);
    }

    #[tokio::test]
    async fn test_validation_exhausted_after_five_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let (oracle, flow) = flow(
            RoutingOracle::new()
                .always(VALIDATE, Ok(INVALID))
                .always(FRAME, Ok(GOOD_QUESTION)),
            dir.path(),
        );

        assert_eq!(flow.run(&ctx()).await, ProcessResult::ValidationExhausted);
        assert_eq!(oracle.calls_matching(VALIDATE), 5);
        // 最后一次不通过后不再重新出题
        assert_eq!(oracle.calls_matching(FRAME), 5);
    }

    #[tokio::test]
    async fn test_diagram_stages_run_for_flagged_question() {
        let dir = tempfile::tempdir().unwrap();
        let flagged = r#"{"question_text": "Read the graph.", "options": ["1", "2", "3", "4"], "correct_option": "C", "needs_diagram": true}"#;
        let (oracle, flow) = flow(
            RoutingOracle::new()
                .always(VALIDATE, Ok(VALID))
                .always(FRAME, Ok(flagged))
                .always(DRAW, Ok(r#"{"shapes": [{"kind": "axes"}]}"#))
                .always(TIKZ, Ok(r#"{"diagram_code": "", "needs_python_diagram": true}"#)),
            dir.path(),
        );

        match flow.run(&ctx()).await {
            ProcessResult::Accepted(record) => {
                assert!(record.diagram_code.is_none());
                assert_eq!(record.image_path.as_deref(), Some("images/diagram_q02.png"));
            }
            other => panic!("应该通过: {:?}", other),
        }
        assert!(dir.path().join("images/diagram_q02.png").exists());
        assert_eq!(oracle.calls_matching(DRAW), 1);
    }
}
