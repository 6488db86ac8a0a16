//! 带重试的调用封装
//!
//! 所有和模型打交道的组件共用同一套重试策略，而不是各自写循环

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 两次尝试之间的固定等待
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// 不等待，适合测试
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

/// 所有尝试都失败
#[derive(Debug, Error)]
#[error("{label} 在 {attempts} 次尝试后失败: {last_error}")]
pub struct RetryExhausted {
    pub label: String,
    pub attempts: u32,
    pub last_error: anyhow::Error,
}

/// 按策略执行 `op`，返回第一次成功的结果
///
/// `op` 接收从 1 开始的尝试序号
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    "{} 失败 (第 {}/{} 次): {:#}",
                    label, attempt, policy.max_attempts, e
                );
                last_error = Some(e);
                if attempt < policy.max_attempts && !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    Err(RetryExhausted {
        label: label.to_string(),
        attempts: policy.max_attempts,
        last_error: last_error.unwrap_or_else(|| anyhow::anyhow!("没有执行任何尝试")),
    })
}
