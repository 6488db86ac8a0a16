use anyhow::Result;
use clap::Parser;

use question_paper_gen::cli::Cli;
use question_paper_gen::utils::logger;
use question_paper_gen::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置：默认值 → 配置文件 → 环境变量 → 命令行
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logger::init(config.verbose_logging);

    // 初始化并运行应用
    let app = App::new(config);
    let report = app.run(cli.run_mode()).await?;

    println!();
    println!("📄 LaTeX file: {}", report.tex_path.display());
    if let Some(json_path) = &report.json_path {
        println!("📊 Question data: {}", json_path.display());
    }
    println!("🖼️  Images: {}", report.images_dir.display());
    if let Some(target) = report.target.filter(|_| report.is_short()) {
        println!(
            "⚠️  Only {} of {} questions were generated",
            report.total_questions, target
        );
    }
    println!("🎉 Success! Processed {} questions.", report.total_questions);
    println!("💡 To compile: pdflatex {}", report.tex_path.display());

    Ok(())
}
