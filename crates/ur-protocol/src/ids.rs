//! 消息类型标签与协议常量
//!
//! 主/副端口（30001/30002）上的每条消息在 4 字节长度之后带 1 字节类型标签；
//! 实时端口（30003）的消息没有类型标签。

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// 主端口（状态 + 日志消息，10Hz）
pub const PRIMARY_PORT: u16 = 30001;
/// 副端口（与主端口同格式，可接收 URScript）
pub const SECONDARY_PORT: u16 = 30002;
/// 实时端口（125Hz 实时状态）
pub const REALTIME_PORT: u16 = 30003;

/// 长度前缀字节数（包长度包含该前缀本身）
pub const LENGTH_PREFIX_SIZE: usize = 4;
/// 长度前缀 + 类型标签
pub const TAGGED_HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + 1;

/// 线上消息类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MessageType {
    /// 机器人状态快照（内含若干子包）
    RobotState = 16,
    /// 机器人日志/版本消息
    RobotMessage = 20,
    /// 程序状态消息（本驱动不解码）
    ProgramStateMessage = 25,
}

/// 机器人消息子类型
///
/// 只有 `Version` 会被解码，其余子类型作为无载荷的合法消息接受。
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RobotMessageType {
    Text = 0,
    ProgramLabel = 1,
    PopupMessage = 2,
    Version = 3,
    SafetyMode = 5,
    ErrorCode = 6,
    Key = 7,
    RequestValue = 9,
    RuntimeException = 10,
    /// 未知子类型（前向兼容）
    #[num_enum(catch_all)]
    Other(u8),
}

/// 机器人状态消息中的子包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RobotStatePackageType {
    RobotModeData = 0,
    JointData = 1,
    ToolData = 2,
    MasterboardData = 3,
    CartesianInfo = 4,
    KinematicsInfo = 5,
    ConfigurationData = 6,
    ForceModeData = 7,
    AdditionalInfo = 8,
    CalibrationData = 9,
    #[num_enum(catch_all)]
    Other(u8),
}
