//! 配置管理命令

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;
use ur_control::DriverConfig;

use crate::config_path;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效配置（文件 + 默认值）
    Show,

    /// 校验配置文件
    Check,

    /// 写出默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => Self::show(path),
            ConfigCommand::Check => Self::check(path),
            ConfigCommand::Init { force } => Self::init(path, force),
        }
    }

    fn show(path: &Path) -> Result<()> {
        let config = config_path::load(path)?;
        println!("# {}", path.display());
        print!("{}", config.to_toml_string()?);
        Ok(())
    }

    fn check(path: &Path) -> Result<()> {
        if !path.exists() {
            anyhow::bail!("配置文件不存在: {}", path.display());
        }
        let config = config_path::load(path)?;
        println!("✅ 配置有效: {}", path.display());
        println!("  机器人: {}", config.robot_host);
        println!("  反向连接: {}:{}", config.reverse_ip, config.reverse_port);
        println!("  关节: {}", config.resolved_joint_names().join(", "));
        println!(
            "  模式: {}",
            if config.use_smooth_trajectory { "smooth" } else { "timed" }
        );
        Ok(())
    }

    fn init(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
        }
        DriverConfig::default()
            .save(path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }
}
