/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::path::Path;
use tracing::{info, warn};

/// 记录程序启动信息
///
/// # 参数
/// - `topic`: 主题
/// - `class_level`: 年级
/// - `target`: 目标题目数
pub fn log_startup(topic: &str, class_level: &str, target: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始生成试卷: {} - {}", topic, class_level);
    info!("🎯 目标题目数: {}", target);
    info!("{}", "=".repeat(60));
}

/// 记录单次迭代开始
pub fn log_iteration_start(iteration: usize, question_id: &str, accepted: usize, target: usize) {
    info!("   🔨 第 {} 轮: 生成 {} (已完成 {}/{})", iteration, question_id, accepted, target);
}

/// 记录一道题被接受
pub fn log_question_accepted(question_id: &str, accepted: usize, target: usize) {
    info!("   ✅ {} 已写入文件 ({}/{})", question_id, accepted, target);
}

/// 打印最终统计信息
///
/// # 参数
/// - `accepted`: 通过的题目数
/// - `target`: 目标题目数
/// - `iterations`: 实际迭代次数
/// - `tex_path`: 文档路径
pub fn print_final_stats(accepted: usize, target: usize, iterations: usize, tex_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 试卷生成统计");
    info!("完成时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 通过: {}/{}", accepted, target);
    info!("🔁 迭代次数: {}", iterations);
    if accepted < target {
        warn!("⚠️ 只生成了 {} 道题 (目标: {})", accepted, target);
    }
    info!("{}", "=".repeat(60));
    info!("\n文档已保存至: {}", tex_path.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
