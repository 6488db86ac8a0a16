//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责整次运行的调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 分发运行模式（生成 / 续写）
//! - 按需创建 Oracle
//! - 输出启动信息和最终统计
//!
//! ### `generation_controller` - 生成控制器
//! - 想法池、题号、难度分配
//! - 迭代上限（安全阀）
//! - 每通过一道题立即写入文档，结束时写 JSON
//!
//! ### `resume` - 续写
//! - 从 JSON 读回题目，只重新写文档
//!
//! ### `output_layout` - 输出路径
//!
//! ## 层次关系
//!
//! ```text
//! app (生成 / 续写)
//!     ↓
//! generation_controller (循环 N 次迭代)
//!     ↓
//! workflow::QuestionFlow (处理单次迭代)
//!     ↓
//! services (能力层：ideas / framer / validator / diagram / writer)
//!     ↓
//! infrastructure (基础设施：TextOracle / 重试 / JSON 提取)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：controller 管循环，flow 管单次迭代
//! 2. **资源隔离**：只有编排层持有 DocumentWriter
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod app;
pub mod generation_controller;
pub mod output_layout;
pub mod resume;

// 重新导出主要类型
pub use app::{App, RunMode, RunReport};
pub use generation_controller::{GenerationController, GenerationOutcome, IdeaPool};
pub use output_layout::{base_filename, OutputLayout};
pub use resume::{resume_from_json, ResumeOutcome};
