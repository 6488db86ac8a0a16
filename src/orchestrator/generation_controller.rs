//! 生成控制器 - 编排层
//!
//! ## 职责
//!
//! 把不可靠的模型调用收敛成"最多 N 道通过校验的题"：
//!
//! 1. **想法池**：循环取用想法，用完时有限次补充
//! 2. **题号 / 难度分配**：每次迭代分配新题号，难度按预算好的序列循环
//! 3. **安全阀**：迭代次数达到上限时结束，保留已有结果
//! 4. **增量落盘**：每通过一道题立即写入文档
//! 5. **收尾**：关闭文档，写 JSON 数据

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{RetryPolicy, TextOracle};
use crate::models::{DifficultyDistribution, PaperData, QuestionRecord};
use crate::orchestrator::output_layout::OutputLayout;
use crate::services::{DocumentWriter, IdeaBatch, IdeaSource};
use crate::utils::logging::{log_iteration_start, log_question_accepted};
use crate::workflow::{ProcessResult, QuestionCtx, QuestionFlow};

/// 想法池
///
/// 游标走到末尾时，如果还有补充次数就追加一批新想法，然后从 0 重新开始
#[derive(Debug)]
pub struct IdeaPool {
    ideas: Vec<String>,
    cursor: usize,
    refreshes_left: usize,
}

impl IdeaPool {
    pub fn new(batch: IdeaBatch, max_refreshes: usize) -> Self {
        Self {
            ideas: batch.ideas,
            cursor: 0,
            refreshes_left: max_refreshes,
        }
    }

    pub fn len(&self) -> usize {
        self.ideas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    /// 游标到达末尾且还能补充
    pub fn needs_refill(&self) -> bool {
        self.cursor >= self.ideas.len() && self.refreshes_left > 0
    }

    /// 追加一批想法并把游标归零；兜底想法只会加入空池
    pub fn absorb(&mut self, batch: IdeaBatch) {
        self.refreshes_left = self.refreshes_left.saturating_sub(1);
        if batch.is_synthetic() && !self.ideas.is_empty() {
            info!("兜底想法不追加，继续循环已有的 {} 个想法", self.ideas.len());
        } else {
            info!("✓ 追加 {} 个想法", batch.ideas.len());
            self.ideas.extend(batch.ideas);
        }
        self.cursor = 0;
    }

    /// 取下一个想法，返回 (下标, 想法)
    pub fn next_idea(&mut self) -> Option<(usize, String)> {
        if self.ideas.is_empty() {
            return None;
        }
        if self.cursor >= self.ideas.len() {
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some((index, self.ideas[index].clone()))
    }
}

/// 一次生成的结果
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub questions: Vec<QuestionRecord>,
    pub target: usize,
    pub iterations: usize,
    pub tex_path: PathBuf,
    pub json_path: PathBuf,
    pub images_dir: PathBuf,
}

impl GenerationOutcome {
    pub fn accepted(&self) -> usize {
        self.questions.len()
    }

    /// 未达到目标的数量
    pub fn shortfall(&self) -> usize {
        self.target.saturating_sub(self.questions.len())
    }
}

/// 生成控制器
pub struct GenerationController {
    idea_source: IdeaSource,
    flow: QuestionFlow,
    config: Config,
}

impl GenerationController {
    pub fn new(oracle: Arc<dyn TextOracle>, config: &Config) -> Self {
        let idea_policy = RetryPolicy::new(config.idea_fetch_attempts, config.retry_backoff());
        Self {
            idea_source: IdeaSource::new(oracle.clone(), idea_policy),
            flow: QuestionFlow::new(oracle, config),
            config: config.clone(),
        }
    }

    /// 运行生成循环
    ///
    /// 达到目标或迭代上限都算正常结束；只有文档 / 文件写入失败才返回错误
    pub async fn run(
        &self,
        topic: &str,
        class_level: &str,
        target: usize,
    ) -> Result<GenerationOutcome, AppError> {
        let layout = OutputLayout::new(&self.config.output_dir, topic, class_level);
        layout.prepare()?;

        let mut writer = DocumentWriter::with_subject(self.config.subject.as_str());
        writer.open(&layout.tex_path, topic, class_level)?;

        // ========== 想法 ==========
        info!("📚 正在获取出题想法...");
        let batch = self.idea_source.fetch(topic, class_level).await;
        if batch.is_synthetic() {
            warn!("⚠️ 使用兜底想法继续生成");
        }
        let mut pool = IdeaPool::new(batch, self.config.max_idea_refreshes);

        let distribution = DifficultyDistribution::new(target);
        let (basic, intermediate, advanced) = distribution.counts();
        info!(
            "📐 难度分布: basic {} / intermediate {} / advanced {}",
            basic, intermediate, advanced
        );

        // ========== 主循环 ==========
        let mut accepted: Vec<QuestionRecord> = Vec::with_capacity(target);
        let mut iteration = 0;
        let mut question_counter = 0;
        let mut difficulty_index = 0;

        while accepted.len() < target && iteration < self.config.max_iterations {
            iteration += 1;

            if pool.needs_refill() {
                warn!("⚠️ 想法已用完，重新获取...");
                let batch = self.idea_source.fetch(topic, class_level).await;
                pool.absorb(batch);
            }

            let Some((_, idea)) = pool.next_idea() else {
                warn!("⚠️ 想法池为空，提前结束");
                break;
            };

            question_counter += 1;
            let question_id = format!("Q{:02}", question_counter);
            let difficulty = distribution.get(difficulty_index);
            difficulty_index += 1;

            log_iteration_start(iteration, &question_id, accepted.len(), target);

            let ctx =
                QuestionCtx::new(topic, class_level, question_id, idea, difficulty, iteration);
            match self.flow.run(&ctx).await {
                ProcessResult::Accepted(record) => {
                    writer.append(&record)?;
                    accepted.push(record);
                    log_question_accepted(&ctx.question_id, accepted.len(), target);
                }
                ProcessResult::FramingFailed | ProcessResult::ValidationExhausted => {
                    info!("{} 跳过，继续下一个想法", ctx);
                }
            }
        }

        if accepted.len() < target && iteration >= self.config.max_iterations {
            warn!(
                "⚠️ 已达到迭代上限 {}，提前结束",
                self.config.max_iterations
            );
        }

        // ========== 收尾 ==========
        info!("✨ 正在完成文档...");
        let tex_path = writer.close()?;

        let data = PaperData::new(topic, class_level, accepted);
        data.save(&layout.json_path)?;
        info!("💾 题目数据已保存: {}", layout.json_path.display());

        Ok(GenerationOutcome {
            questions: data.questions,
            target,
            iterations: iteration,
            tex_path,
            json_path: layout.json_path,
            images_dir: layout.images_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::oracle::testing::RoutingOracle;
    use crate::models::Difficulty;
    use crate::services::IdeaOrigin;

    const IDEAS: &str = "question ideas";
    const FRAME: &str = "Convert this question idea";
    const VALIDATE: &str = "Validate this MCQ";

    fn batch(ideas: &[&str], origin: IdeaOrigin) -> IdeaBatch {
        IdeaBatch {
            ideas: ideas.iter().map(|s| s.to_string()).collect(),
            origin,
        }
    }

    fn config(dir: &std::path::Path) -> Config {
        Config {
            output_dir: dir.to_path_buf(),
            retry_backoff_ms: 0,
            ..Config::default()
        }
    }

    #[test]
    fn test_pool_cycles_in_order() {
        let mut pool = IdeaPool::new(batch(&["a", "b", "c", "d", "e"], IdeaOrigin::Oracle), 0);
        let indices: Vec<usize> = (0..8).map(|_| pool.next_idea().unwrap().0).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 0, 1, 2]);
    }

    #[test]
    fn test_pool_refill_appends_and_rewinds() {
        let mut pool = IdeaPool::new(batch(&["a", "b", "c", "d", "e"], IdeaOrigin::Oracle), 1);
        let mut indices = Vec::new();
        for _ in 0..8 {
            if pool.needs_refill() {
                pool.absorb(batch(&["f", "g"], IdeaOrigin::Oracle));
            }
            indices.push(pool.next_idea().unwrap().0);
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 0, 1, 2]);
        assert_eq!(pool.len(), 7);
        // 补充次数用完
        for _ in 0..4 {
            pool.next_idea();
        }
        assert!(!pool.needs_refill());
    }

    #[test]
    fn test_pool_ignores_synthetic_refill_when_not_empty() {
        let mut pool = IdeaPool::new(batch(&["a"], IdeaOrigin::Oracle), 2);
        pool.next_idea();
        assert!(pool.needs_refill());
        pool.absorb(IdeaBatch::fallback("t", "c"));
        assert_eq!(pool.len(), 1);

        let mut empty = IdeaPool::new(batch(&[], IdeaOrigin::Oracle), 1);
        assert!(empty.next_idea().is_none());
        assert!(empty.needs_refill());
        empty.absorb(IdeaBatch::fallback("t", "c"));
        assert!(!empty.is_empty());
    }

    #[tokio::test]
    async fn test_run_reaches_target() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = Arc::new(
            RoutingOracle::new()
                .always(VALIDATE, Ok(r#"{"is_valid": true, "feedback": "ok"}"#))
                .always(
                    FRAME,
                    Ok(r#"{"question_text": "What is 5 + 5?", "options": ["10", "11", "12", "13"], "correct_option": "A"}"#),
                )
                .always(IDEAS, Ok(r#"{"ideas": ["Addition facts", "Doubles"]}"#)),
        );
        let controller = GenerationController::new(oracle.clone(), &config(dir.path()));

        let outcome = controller.run("Addition", "Class 1", 3).await.unwrap();
        assert_eq!(outcome.accepted(), 3);
        assert_eq!(outcome.shortfall(), 0);
        assert_eq!(outcome.iterations, 3);

        let ids: Vec<&str> = outcome.questions.iter().map(|q| q.question_id.as_str()).collect();
        assert_eq!(ids, vec!["Q01", "Q02", "Q03"]);
        // 3 道题: 0 basic, 1 intermediate, 2 advanced
        let difficulties: Vec<Difficulty> =
            outcome.questions.iter().map(|q| q.difficulty).collect();
        assert_eq!(
            difficulties,
            vec![Difficulty::Intermediate, Difficulty::Advanced, Difficulty::Advanced]
        );

        // 第三次出题用回第一个想法
        let frames = oracle.prompts_matching(FRAME);
        assert!(frames[2].contains("Idea: Addition facts"));

        let tex = std::fs::read_to_string(&outcome.tex_path).unwrap();
        assert_eq!(tex.matches("\\item ").count(), 3);
        let data = PaperData::load(&outcome.json_path).unwrap();
        assert_eq!(data.total_questions, 3);
        assert_eq!(data.answer_key.len(), 3);
        assert!(outcome.json_path.ends_with("addition_class_1.json"));
    }

    #[tokio::test]
    async fn test_ceiling_ends_run_with_partial_result() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = Arc::new(
            RoutingOracle::new()
                .always(FRAME, Ok(r#"{"question_text": "Sample question on X", "options": ["Option 1"]}"#))
                .always(IDEAS, Err("quota exceeded")),
        );
        let config = Config {
            max_iterations: 4,
            ..config(dir.path())
        };
        let controller = GenerationController::new(oracle.clone(), &config);

        let outcome = controller.run("Sets", "Class 8", 25).await.unwrap();
        assert_eq!(outcome.accepted(), 0);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.shortfall(), 25);
        // 每次迭代出题 3 次
        assert_eq!(oracle.calls_matching(FRAME), 12);

        let frames = oracle.prompts_matching(FRAME);
        assert!(frames[0].contains("Idea: Core concept 1 of Sets for Class 8"));

        let tex = std::fs::read_to_string(&outcome.tex_path).unwrap();
        assert!(tex.contains(r"\item[] No questions were generated."));
        assert!(tex.trim_end().ends_with(r"\end{document}"));
        assert!(outcome.json_path.exists());
    }

    #[tokio::test]
    async fn test_ids_have_gaps_after_abandoned_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let good = r#"{"question_text": "What is 9 - 4?", "options": ["5", "4", "3", "6"], "correct_option": "A"}"#;
        let oracle = Arc::new(
            RoutingOracle::new()
                .always(VALIDATE, Ok(r#"{"is_valid": true}"#))
                .route(FRAME, vec![Err("x"), Err("x"), Err("x"), Ok(good)])
                .always(IDEAS, Ok(r#"["Subtraction"]"#)),
        );
        let controller = GenerationController::new(oracle, &config(dir.path()));

        let outcome = controller.run("Subtraction", "Class 2", 1).await.unwrap();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.questions[0].question_id, "Q02");
    }
}
