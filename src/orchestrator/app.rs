//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **模式分发**：完整生成 / 从 JSON 续写
//! 2. **资源管理**：按需创建 Oracle（续写模式不需要 API Key）
//! 3. **全局统计**：启动横幅和最终统计
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单道题的细节
//! - **向下委托**：生成交给 `GenerationController`，续写交给 `resume`

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{OpenAiOracle, TextOracle};
use crate::orchestrator::generation_controller::GenerationController;
use crate::orchestrator::resume::resume_from_json;
use crate::utils::logging::{log_startup, print_final_stats};

/// 运行模式
#[derive(Debug, Clone)]
pub enum RunMode {
    /// 完整生成
    Generate {
        topic: String,
        class_level: String,
        count: usize,
    },
    /// 从已保存的 JSON 重新渲染文档
    Resume {
        json_path: PathBuf,
        topic: Option<String>,
        class_level: Option<String>,
    },
}

/// 运行结果摘要
#[derive(Debug, Clone)]
pub struct RunReport {
    pub tex_path: PathBuf,
    /// 续写模式不写 JSON
    pub json_path: Option<PathBuf>,
    pub images_dir: PathBuf,
    pub total_questions: usize,
    /// 续写模式没有目标数
    pub target: Option<usize>,
}

impl RunReport {
    pub fn is_short(&self) -> bool {
        self.target.is_some_and(|target| self.total_questions < target)
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    oracle: Option<Arc<dyn TextOracle>>,
}

impl App {
    /// 使用配置创建应用，生成时才连接模型
    pub fn new(config: Config) -> Self {
        Self {
            config,
            oracle: None,
        }
    }

    /// 使用指定的 Oracle（测试或自定义后端）
    pub fn with_oracle(config: Config, oracle: Arc<dyn TextOracle>) -> Self {
        Self {
            config,
            oracle: Some(oracle),
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self, mode: RunMode) -> Result<RunReport, AppError> {
        match mode {
            RunMode::Generate {
                topic,
                class_level,
                count,
            } => self.generate(&topic, &class_level, count).await,
            RunMode::Resume {
                json_path,
                topic,
                class_level,
            } => {
                info!("{}", "=".repeat(60));
                info!("📂 续写模式: 只根据 JSON 重新生成文档");
                info!("{}", "=".repeat(60));
                let outcome = resume_from_json(
                    &json_path,
                    topic.as_deref(),
                    class_level.as_deref(),
                    &self.config,
                )?;
                info!("✨ 文档重新生成完成: {}", outcome.tex_path.display());
                Ok(RunReport {
                    tex_path: outcome.tex_path,
                    json_path: None,
                    images_dir: outcome.images_dir,
                    total_questions: outcome.total_questions,
                    target: None,
                })
            }
        }
    }

    async fn generate(
        &self,
        topic: &str,
        class_level: &str,
        count: usize,
    ) -> Result<RunReport, AppError> {
        log_startup(topic, class_level, count);

        let oracle = self.oracle()?;
        info!("🤖 使用模型: {}", oracle.name());

        let controller = GenerationController::new(oracle, &self.config);
        let outcome = controller.run(topic, class_level, count).await?;

        print_final_stats(
            outcome.accepted(),
            outcome.target,
            outcome.iterations,
            &outcome.tex_path,
        );

        Ok(RunReport {
            total_questions: outcome.accepted(),
            target: Some(outcome.target),
            tex_path: outcome.tex_path,
            json_path: Some(outcome.json_path),
            images_dir: outcome.images_dir,
        })
    }

    fn oracle(&self) -> Result<Arc<dyn TextOracle>, AppError> {
        match &self.oracle {
            Some(oracle) => Ok(oracle.clone()),
            None => Ok(Arc::new(OpenAiOracle::new(&self.config)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_generate_without_api_key_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::new(Config {
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        });

        let result = tokio_test::block_on(app.run(RunMode::Generate {
            topic: "Fractions".to_string(),
            class_level: "Class 5".to_string(),
            count: 5,
        }));
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::EnvVarNotFound { .. }))
        ));
        // 没有创建任何输出
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_report_shortfall() {
        let report = RunReport {
            tex_path: PathBuf::from("a.tex"),
            json_path: None,
            images_dir: PathBuf::from("images"),
            total_questions: 3,
            target: Some(5),
        };
        assert!(report.is_short());
        assert!(!RunReport {
            target: None,
            ..report
        }
        .is_short());
    }
}
