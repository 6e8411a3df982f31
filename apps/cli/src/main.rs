//! # UR CLI
//!
//! Universal Robots 轨迹执行命令行工具。
//!
//! ```bash
//! # 查看生效配置（文件 + 默认值）
//! ur-cli config show
//!
//! # 执行轨迹文件（退出码反映结果）
//! ur-cli run --trajectory pick.json --host 192.168.56.101
//!
//! # 打印实时端口解码结果
//! ur-cli dump --port realtime --count 20
//! ```
//!
//! 配置文件默认位于 `<config_dir>/ur-driver/config.toml`，可用 `--config` 指定。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config_path;
mod trajectory_file;

use commands::{ConfigCommand, DumpCommand, RunCommand};

/// UR CLI - 轨迹执行工具
#[derive(Parser, Debug)]
#[command(name = "ur-cli")]
#[command(about = "Command-line interface for Universal Robots trajectory execution", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 执行轨迹文件
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 打印解码后的包
    Dump {
        #[command(flatten)]
        args: DumpCommand,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = config_path::resolve(cli.config)?;

    match cli.command {
        Commands::Config(cmd) => {
            cmd.execute(&config_path)?;
            Ok(ExitCode::SUCCESS)
        },

        Commands::Run { args } => args.execute(&config_path),

        Commands::Dump { args } => {
            args.execute(&config_path)?;
            Ok(ExitCode::SUCCESS)
        },
    }
}
