//! 控制层错误类型定义

use std::time::Duration;
use thiserror::Error;

/// 轨迹跟随器错误
#[derive(Error, Debug)]
pub enum FollowerError {
    /// 控制程序尚未连接
    #[error("Robot control program is not connected")]
    NotConnected,

    /// 等待控制程序连接超时
    #[error("Robot control program did not connect within {0:?}")]
    AcceptTimeout(Duration),

    /// 对端关闭了反向连接
    #[error("Reverse connection lost")]
    ConnectionLost,

    /// 写入指令失败
    #[error("Failed to write command record: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// 应答未在规定时间内到达
    #[error("No acknowledgement for record {sequence} within {timeout:?}")]
    AckTimeout { sequence: u32, timeout: Duration },

    /// 应答序号不符
    #[error("Acknowledgement mismatch: expected {expected}, got {actual}")]
    AckMismatch { expected: u32, actual: u32 },

    /// 分段在加速度/速度限制下无法完成
    #[error("Segment {segment} is infeasible for joint {joint} under the velocity/acceleration limits")]
    InfeasibleSegment { segment: usize, joint: usize },

    /// 空轨迹
    #[error("Trajectory contains no points")]
    EmptyTrajectory,

    /// 应答解码失败
    #[error("Protocol error: {0}")]
    Protocol(#[from] ur_protocol::ProtocolError),

    /// 套接字错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FollowerError {
    /// 是否表示机器人无响应（挂起）
    ///
    /// 规划类错误（空轨迹、不可行分段）不算挂起。
    pub fn is_hang(&self) -> bool {
        matches!(
            self,
            FollowerError::NotConnected
                | FollowerError::AcceptTimeout(_)
                | FollowerError::ConnectionLost
                | FollowerError::WriteFailed(_)
                | FollowerError::AckTimeout { .. }
                | FollowerError::AckMismatch { .. }
                | FollowerError::Protocol(_)
                | FollowerError::Io(_)
        )
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 协调器启动错误
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid coordinator config: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn trajectory thread: {0}")]
    Spawn(#[from] std::io::Error),
}
