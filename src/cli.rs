//! 命令行参数

use clap::Parser;
use std::path::PathBuf;

use crate::orchestrator::RunMode;

/// 用文本模型生成数学选择题试卷（LaTeX + JSON）
#[derive(Debug, Parser)]
#[command(name = "question_paper_gen", version, about)]
pub struct Cli {
    /// 主题，例如 "Congruence of Triangles"
    #[arg(required_unless_present = "from_json")]
    pub topic: Option<String>,

    /// 年级，例如 "Class 7"
    #[arg(required_unless_present = "from_json")]
    pub class_level: Option<String>,

    /// 跳过生成，只根据已保存的 JSON 重新写文档
    #[arg(long, value_name = "PATH")]
    pub from_json: Option<PathBuf>,

    /// 目标题目数
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// TOML 配置文件
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 输出目录（覆盖配置）
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// 输出 debug 日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// 转换成运行模式
    pub fn run_mode(&self) -> RunMode {
        match &self.from_json {
            Some(json_path) => RunMode::Resume {
                json_path: json_path.clone(),
                topic: self.topic.clone(),
                class_level: self.class_level.clone(),
            },
            None => RunMode::Generate {
                topic: self.topic.clone().unwrap_or_default(),
                class_level: self.class_level.clone().unwrap_or_default(),
                count: self.count as usize,
            },
        }
    }
}
