//! 驱动配置
//!
//! TOML 文件，所有字段都有默认值：
//!
//! ```toml
//! robot_host = "192.168.56.101"
//! reverse_port = 50001
//! use_smooth_trajectory = true
//! kill_on_hang = false
//! prefix = "ur5_"
//! ```

use crate::coordinator::CoordinatorConfig;
use crate::error::ConfigError;
use crate::follower::FollowerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use ur_protocol::{JOINT_COUNT, PRIMARY_PORT, REALTIME_PORT, SECONDARY_PORT};

/// UR 关节名（不含前缀）
pub const DEFAULT_JOINT_NAMES: [&str; JOINT_COUNT] = [
    "shoulder_pan_joint",
    "shoulder_lift_joint",
    "elbow_joint",
    "wrist_1_joint",
    "wrist_2_joint",
    "wrist_3_joint",
];

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// 控制器地址
    pub robot_host: String,
    pub primary_port: u16,
    pub secondary_port: u16,
    pub realtime_port: u16,

    /// 反向连接监听地址
    pub reverse_ip: String,
    pub reverse_port: u16,
    /// 等待控制程序连入的时间（秒）
    pub accept_timeout: f64,

    /// 控制周期（秒）
    pub servoj_time: f64,
    /// 控制程序 servoj 前瞻时间（秒）
    pub servoj_lookahead_time: f64,
    /// 控制程序 servoj 增益
    pub servoj_gain: f64,
    /// 应答超时（秒），未设置时不等待应答
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_timeout: Option<f64>,

    /// 速度上限（弧度/秒）
    pub max_velocity: f64,
    /// 定时模式加速度上限（弧度/秒²）
    pub max_acceleration: f64,
    /// true: 平滑插值；false: 在每个路点停下
    pub use_smooth_trajectory: bool,

    /// 机器人挂起时退出进程
    pub kill_on_hang: bool,
    /// 退出前等待（秒）
    pub hang_exit_delay: f64,

    /// 关节名前缀
    pub prefix: String,
    /// 关节名（不含前缀），顺序即控制程序期望的顺序
    pub joint_names: Vec<String>,

    /// 到位容差（弧度）
    pub goal_tolerance: f64,
    /// 静止判定阈值（弧度/秒）
    pub motion_threshold: f64,
    /// 超时 = 轨迹时长 × timeout_factor
    pub timeout_factor: f64,
    /// 开始检查到位前等待 = 轨迹时长 × grace_factor
    pub grace_factor: f64,
    /// 到位检查周期（秒）
    pub monitor_interval: f64,
    /// 新目标打断旧目标后的等待（秒）
    pub settle_delay: f64,

    /// 超过该时长无遥测即视为失联（秒）
    pub telemetry_timeout: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            robot_host: "192.168.56.101".to_string(),
            primary_port: PRIMARY_PORT,
            secondary_port: SECONDARY_PORT,
            realtime_port: REALTIME_PORT,
            reverse_ip: "0.0.0.0".to_string(),
            reverse_port: 50001,
            accept_timeout: 30.0,
            servoj_time: 0.008,
            servoj_lookahead_time: 0.03,
            servoj_gain: 300.0,
            ack_timeout: None,
            max_velocity: 10.0,
            max_acceleration: 15.0,
            use_smooth_trajectory: true,
            kill_on_hang: true,
            hang_exit_delay: 0.25,
            prefix: String::new(),
            joint_names: DEFAULT_JOINT_NAMES.iter().map(|s| s.to_string()).collect(),
            goal_tolerance: 0.0025,
            motion_threshold: 0.01,
            timeout_factor: 1.5,
            grace_factor: 0.1,
            monitor_interval: 0.001,
            settle_delay: 0.25,
            telemetry_timeout: 1.0,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl DriverConfig {
    /// 从 TOML 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存到文件（自动创建父目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        for (name, value) in [
            ("servoj_time", self.servoj_time),
            ("monitor_interval", self.monitor_interval),
            ("max_velocity", self.max_velocity),
            ("max_acceleration", self.max_acceleration),
            ("goal_tolerance", self.goal_tolerance),
            ("motion_threshold", self.motion_threshold),
            ("timeout_factor", self.timeout_factor),
            ("accept_timeout", self.accept_timeout),
            ("telemetry_timeout", self.telemetry_timeout),
        ] {
            if !is_positive(value) {
                return invalid(format!("{} must be positive and finite, got {}", name, value));
            }
        }
        for (name, value) in [
            ("grace_factor", self.grace_factor),
            ("settle_delay", self.settle_delay),
            ("hang_exit_delay", self.hang_exit_delay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{} must be non-negative, got {}", name, value));
            }
        }
        if let Some(ack) = self.ack_timeout
            && !is_positive(ack)
        {
            return invalid(format!("ack_timeout must be positive, got {}", ack));
        }

        if self.joint_names.len() != JOINT_COUNT {
            return invalid(format!(
                "expected {} joint names, got {}",
                JOINT_COUNT,
                self.joint_names.len()
            ));
        }
        let mut seen = HashSet::new();
        for name in &self.joint_names {
            if name.is_empty() {
                return invalid("joint names must not be empty".to_string());
            }
            if !seen.insert(name) {
                return invalid(format!("duplicate joint name: {}", name));
            }
        }
        Ok(())
    }

    /// 带前缀的关节名
    pub fn resolved_joint_names(&self) -> Vec<String> {
        self.joint_names
            .iter()
            .map(|name| format!("{}{}", self.prefix, name))
            .collect()
    }

    pub fn follower_config(&self) -> FollowerConfig {
        let servoj_time = secs(self.servoj_time);
        FollowerConfig {
            reverse_ip: self.reverse_ip.clone(),
            reverse_port: self.reverse_port,
            accept_timeout: secs(self.accept_timeout),
            servoj_time,
            write_timeout: servoj_time,
            ack_timeout: self.ack_timeout.map(secs),
            max_velocity: self.max_velocity,
            max_acceleration: self.max_acceleration,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            joint_names: self.resolved_joint_names(),
            max_velocity: self.max_velocity,
            use_smooth_trajectory: self.use_smooth_trajectory,
            goal_tolerance: self.goal_tolerance,
            motion_threshold: self.motion_threshold,
            timeout_factor: self.timeout_factor,
            grace_factor: self.grace_factor,
            monitor_interval: secs(self.monitor_interval),
            settle_delay: secs(self.settle_delay),
        }
    }

    pub fn telemetry_timeout(&self) -> Duration {
        secs(self.telemetry_timeout)
    }

    pub fn hang_exit_delay(&self) -> Duration {
        secs(self.hang_exit_delay)
    }
}
