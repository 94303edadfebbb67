//! Scout - 计划 / 执行 / 重规划 / 求解 网页智能体
//!
//! 入口：初始化日志、加载配置、按执行器变体装配状态机并运行单个目标。
//!
//! 用法：scout [--executor search|browser] [--config <path>] <goal...>

use std::path::PathBuf;

use anyhow::Context;
use scout::config::load_config;
use scout::{ExecutionGraph, ExecutorKind};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct CliArgs {
    executor: String,
    config_path: Option<PathBuf>,
    goal: String,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut executor = "search".to_string();
    let mut config_path = None;
    let mut goal_parts: Vec<String> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--executor" => {
                executor = args.next().context("--executor requires a value")?;
            }
            "--config" => {
                config_path = Some(PathBuf::from(
                    args.next().context("--config requires a value")?,
                ));
            }
            _ => goal_parts.push(arg),
        }
    }

    let goal = goal_parts.join(" ");
    anyhow::ensure!(
        !goal.trim().is_empty(),
        "usage: scout [--executor search|browser] [--config <path>] <goal...>"
    );
    Ok(CliArgs {
        executor,
        config_path,
        goal,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let args = parse_args()?;
    let cfg = load_config(args.config_path).context("Failed to load config")?;
    let kind: ExecutorKind = args.executor.parse().context("Invalid --executor value")?;

    let graph = ExecutionGraph::from_config(kind, &cfg).context("Failed to assemble agent")?;
    graph
        .wait_browser_ready()
        .await
        .context("Browser session did not become ready")?;

    let answer = graph.run(&args.goal).await.context("Run failed")?;
    println!("{}", answer);

    Ok(())
}
