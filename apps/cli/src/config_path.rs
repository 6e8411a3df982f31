//! 配置文件定位与加载

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use ur_control::DriverConfig;

/// `--config` 优先，否则为 `<config_dir>/ur-driver/config.toml`
pub fn resolve(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("ur-driver");
    path.push("config.toml");
    Ok(path)
}

/// 加载配置；文件不存在时使用默认值
pub fn load(path: &Path) -> Result<DriverConfig> {
    if !path.exists() {
        tracing::debug!("Config file {} not found, using defaults", path.display());
        return Ok(DriverConfig::default());
    }
    DriverConfig::load(path).with_context(|| format!("加载配置文件失败: {}", path.display()))
}
