//! # UR Protocol
//!
//! Universal Robots 控制器二进制协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `reader`: 大端二进制读取器
//! - `ids`: 消息类型标签与端口常量
//! - `rt_state`: 实时端口的版本化状态快照
//! - `state`: 主端口的机器人状态快照（子包）
//! - `messages`: 机器人日志/版本消息
//! - `parser`: 三种解析策略（状态 / 实时 / 消息）
//! - `command`: 反向连接上发送给控制程序的伺服指令记录
//! - `version`: 固件版本到快照布局的映射
//!
//! ## 字节序
//!
//! 所有多字节标量均为大端字节序（网络字节序）。

pub mod command;
pub mod ids;
pub mod messages;
pub mod parser;
pub mod reader;
pub mod rt_state;
pub mod state;
pub mod version;

// 重新导出常用类型
pub use command::*;
pub use ids::*;
pub use messages::*;
pub use parser::*;
pub use reader::{BeScalar, BinaryReader};
pub use rt_state::*;
pub use state::*;
pub use version::*;

use thiserror::Error;

/// 机械臂关节数量
pub const JOINT_COUNT: usize = 6;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Insufficient data: need {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },

    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid declared packet length: {0}")]
    InvalidDeclaredLength(i32),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: i64 },

    #[error("Unsupported firmware version: {0}")]
    UnsupportedVersion(String),
}

/// 关节反馈能力
///
/// 各版本快照（实时 / 主端口状态）共享的读取接口。
/// 返回 `None` 表示该快照不携带对应字段。
pub trait JointFeedback {
    /// 实际关节位置（弧度）
    fn q_actual(&self) -> Option<[f64; JOINT_COUNT]>;

    /// 实际关节速度（弧度/秒）
    fn qd_actual(&self) -> Option<[f64; JOINT_COUNT]>;

    /// 由快照推导出的机器人状态
    fn robot_state(&self) -> Option<RobotState>;
}
