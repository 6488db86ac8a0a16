//! 流程层：一次迭代 = 一个想法变成一道通过校验的题
//!
//! 不持有文档，也不分配题号；这些由编排层负责

pub mod question_ctx;
pub mod question_flow;

pub use question_ctx::QuestionCtx;
pub use question_flow::{ProcessResult, QuestionFlow};
