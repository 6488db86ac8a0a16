//! 基础设施层
//!
//! - `oracle` - 持有模型客户端，只暴露 complete() 能力
//! - `json_extract` - 从自由文本中容错提取 JSON
//! - `resilient` - 统一的重试策略

pub mod json_extract;
pub mod oracle;
pub mod resilient;

pub use oracle::{OpenAiOracle, TextOracle};
pub use resilient::{run_with_retry, RetryExhausted, RetryPolicy};
