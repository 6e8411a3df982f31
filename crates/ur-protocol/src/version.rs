//! 固件版本到快照布局的映射
//!
//! 快照布局随控制器固件演进。版本在连接建立时（读取主端口的第一条版本消息）
//! 解析一次，之后每条消息都按同一布局解码，不再逐条判断。

use crate::ProtocolError;
use semver::Version;

/// 实时端口快照布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RealtimeVersion {
    /// 固件 1.6 - 1.7
    V1_6_7,
    /// 固件 1.8
    V1_8,
    /// 固件 3.0 - 3.1
    V3_0_1,
    /// 固件 3.2 - 3.4
    V3_2_3,
    /// 固件 3.5+ 以及 5.1+（e-Series）
    V3_5_5_1,
}

impl RealtimeVersion {
    /// 该布局的完整包长度（含 4 字节长度前缀）
    pub const fn packet_size(self) -> usize {
        match self {
            RealtimeVersion::V1_6_7 => 756,
            RealtimeVersion::V1_8 => 812,
            RealtimeVersion::V3_0_1 => 1044,
            RealtimeVersion::V3_2_3 => 1060,
            RealtimeVersion::V3_5_5_1 => 1108,
        }
    }

    /// 根据固件版本选择布局
    pub fn for_firmware(firmware: &Version) -> Result<Self, ProtocolError> {
        match (firmware.major, firmware.minor) {
            (1, m) if m < 8 => Ok(RealtimeVersion::V1_6_7),
            (1, _) => Ok(RealtimeVersion::V1_8),
            (3, m) if m < 2 => Ok(RealtimeVersion::V3_0_1),
            (3, m) if m < 5 => Ok(RealtimeVersion::V3_2_3),
            (3, _) | (5, _) => Ok(RealtimeVersion::V3_5_5_1),
            _ => Err(ProtocolError::UnsupportedVersion(firmware.to_string())),
        }
    }
}

/// 主端口机器人状态快照布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateVersion {
    /// 固件 1.x
    V1_X,
    /// 固件 3.0 - 3.1
    V3_0_1,
    /// 固件 3.2+ 以及 5.x
    V3_2,
}

impl StateVersion {
    /// 根据固件版本选择布局
    pub fn for_firmware(firmware: &Version) -> Result<Self, ProtocolError> {
        match (firmware.major, firmware.minor) {
            (1, _) => Ok(StateVersion::V1_X),
            (3, m) if m < 2 => Ok(StateVersion::V3_0_1),
            (3, _) | (5, _) => Ok(StateVersion::V3_2),
            _ => Err(ProtocolError::UnsupportedVersion(firmware.to_string())),
        }
    }
}

/// 一次连接内固定的协议布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersions {
    pub firmware: Version,
    pub realtime: RealtimeVersion,
    pub state: StateVersion,
}

impl ProtocolVersions {
    /// 由固件版本一次性解析全部布局
    pub fn resolve(firmware: Version) -> Result<Self, ProtocolError> {
        let realtime = RealtimeVersion::for_firmware(&firmware)?;
        let state = StateVersion::for_firmware(&firmware)?;
        Ok(Self {
            firmware,
            realtime,
            state,
        })
    }
}
