//! # Question Paper Gen
//!
//! 一个用文本模型生成数学选择题试卷的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源（模型客户端），只暴露能力
//! - `TextOracle` - "给 prompt，拿文本"，`OpenAiOracle` 是唯一的真实实现
//! - `run_with_retry` - 共用的重试策略
//! - `json_extract` - 从自由文本中容错提取 JSON
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单道题
//! - `IdeaSource` - 出题想法（失败时兜底）
//! - `QuestionFramer` - 想法 → 四选一题目
//! - `Validator` - 校验 + 修正
//! - `DiagramSelector` / `DiagramRenderer` - TikZ 配图 / 栅格配图
//! - `DocumentWriter` - 追加写 LaTeX 文档
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次迭代"的完整处理流程
//! - `QuestionCtx` - 上下文封装（题号 + 想法 + 难度）
//! - `QuestionFlow` - 流程编排（出题 → 校验循环 → 配图）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用入口，分发生成 / 续写
//! - `orchestrator/generation_controller` - 有上限的生成循环
//! - `orchestrator/resume` - 从 JSON 重新渲染文档
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ValidatorFailurePolicy};
pub use error::AppError;
pub use infrastructure::{OpenAiOracle, TextOracle};
pub use models::{Difficulty, OptionLabel, PaperData, QuestionRecord};
pub use orchestrator::{App, GenerationController, RunMode, RunReport};
pub use workflow::{ProcessResult, QuestionCtx, QuestionFlow};
