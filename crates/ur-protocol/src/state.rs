//! 机器人状态快照（主端口）
//!
//! 一条 `RobotState` 消息由若干子包组成，每个子包格式为
//! `[i32 长度][u8 子包类型][内容]`，长度包含 5 字节子包头。
//! 本模块解码 `RobotModeData` 与 `JointData`，其余子包按长度跳过。

use crate::reader::BinaryReader;
use crate::version::StateVersion;
use crate::{JOINT_COUNT, JointFeedback, ProtocolError, RobotStatePackageType};
use num_enum::{FromPrimitive, IntoPrimitive};

/// 子包头字节数（长度 + 类型）
const PACKAGE_HEADER_SIZE: usize = 5;

// ============================================================================
// 机器人状态
// ============================================================================

/// 由快照推导出的机器人状态
///
/// 只有 `Running` 允许执行轨迹。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RobotState {
    Running = 0,
    ProtectiveStopped = 1,
    EmergencyStopped = 2,
    Error = 3,
}

impl RobotState {
    /// 转换为 u8（用于原子存储）
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 从 u8 转换，未知值返回 `None`
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RobotState::Running),
            1 => Some(RobotState::ProtectiveStopped),
            2 => Some(RobotState::EmergencyStopped),
            3 => Some(RobotState::Error),
            _ => None,
        }
    }

    /// 由急停/保护性停止标志与“是否处于运行模式”推导状态
    ///
    /// 急停优先于保护性停止，二者都优先于模式判断。
    pub fn derive(emergency_stopped: bool, protective_stopped: bool, running: bool) -> Self {
        if emergency_stopped {
            RobotState::EmergencyStopped
        } else if protective_stopped {
            RobotState::ProtectiveStopped
        } else if !running {
            RobotState::Error
        } else {
            RobotState::Running
        }
    }
}

/// 机器人模式（固件 1.x）
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RobotModeV1 {
    Running = 0,
    Freedrive = 1,
    Ready = 2,
    Initializing = 3,
    SecurityStopped = 4,
    EmergencyStopped = 5,
    FatalError = 6,
    NoPower = 7,
    NotConnected = 8,
    Shutdown = 9,
    SafeguardStop = 10,
    #[num_enum(catch_all)]
    Other(u8),
}

/// 机器人模式（固件 3.x / 5.x）
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RobotModeV3 {
    Disconnected = 0,
    ConfirmSafety = 1,
    Booting = 2,
    PowerOff = 3,
    PowerOn = 4,
    Idle = 5,
    Backdrive = 6,
    Running = 7,
    UpdatingFirmware = 8,
    /// 包括 `NO_CONTROLLER`（线上为 -1）
    #[num_enum(catch_all)]
    Other(u8),
}

/// 安全模式（固件 3.x / 5.x，实时端口以 double 传输）
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SafetyMode {
    Normal = 1,
    Reduced = 2,
    ProtectiveStop = 3,
    Recovery = 4,
    SafeguardStop = 5,
    SystemEmergencyStop = 6,
    RobotEmergencyStop = 7,
    Violation = 8,
    Fault = 9,
    #[num_enum(catch_all)]
    Other(u8),
}

// ============================================================================
// RobotModeData 子包
// ============================================================================

/// 各版本 RobotModeData 共有的布尔标志
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotModeFlags {
    pub timestamp: u64,
    pub physical_robot_connected: bool,
    pub real_robot_enabled: bool,
    pub robot_power_on: bool,
    pub emergency_stopped: bool,
    /// 固件 1.x 中称为 security stopped
    pub protective_stopped: bool,
    pub program_running: bool,
    pub program_paused: bool,
}

impl RobotModeFlags {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            timestamp: bp.parse()?,
            physical_robot_connected: bp.parse()?,
            real_robot_enabled: bp.parse()?,
            robot_power_on: bp.parse()?,
            emergency_stopped: bp.parse()?,
            protective_stopped: bp.parse()?,
            program_running: bp.parse()?,
            program_paused: bp.parse()?,
        })
    }
}

/// RobotModeData（固件 1.x）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotModeDataV1X {
    pub flags: RobotModeFlags,
    pub robot_mode: RobotModeV1,
    pub speed_fraction: f64,
}

/// RobotModeData（固件 3.0 - 3.1）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotModeDataV3_0_1 {
    pub flags: RobotModeFlags,
    pub robot_mode: RobotModeV3,
    pub control_mode: u8,
    pub target_speed_fraction: f64,
    pub speed_scaling: f64,
}

/// RobotModeData（固件 3.2+）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotModeDataV3_2 {
    pub base: RobotModeDataV3_0_1,
    pub target_speed_fraction_limit: f64,
}

/// 版本化的 RobotModeData
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RobotModeData {
    V1_X(RobotModeDataV1X),
    V3_0_1(RobotModeDataV3_0_1),
    V3_2(RobotModeDataV3_2),
}

impl RobotModeDataV3_0_1 {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            flags: RobotModeFlags::decode(bp)?,
            robot_mode: RobotModeV3::from(bp.parse::<u8>()?),
            control_mode: bp.parse()?,
            target_speed_fraction: bp.parse()?,
            speed_scaling: bp.parse()?,
        })
    }
}

impl RobotModeData {
    /// 按布局版本解码子包内容（不含子包头）
    pub fn decode(version: StateVersion, bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        match version {
            StateVersion::V1_X => Ok(RobotModeData::V1_X(RobotModeDataV1X {
                flags: RobotModeFlags::decode(bp)?,
                robot_mode: RobotModeV1::from(bp.parse::<u8>()?),
                speed_fraction: bp.parse()?,
            })),
            StateVersion::V3_0_1 => Ok(RobotModeData::V3_0_1(RobotModeDataV3_0_1::decode(bp)?)),
            StateVersion::V3_2 => {
                let base = RobotModeDataV3_0_1::decode(bp)?;
                Ok(RobotModeData::V3_2(RobotModeDataV3_2 {
                    base,
                    target_speed_fraction_limit: bp.parse()?,
                }))
            },
        }
    }

    /// 共有标志
    pub fn flags(&self) -> &RobotModeFlags {
        match self {
            RobotModeData::V1_X(d) => &d.flags,
            RobotModeData::V3_0_1(d) => &d.flags,
            RobotModeData::V3_2(d) => &d.base.flags,
        }
    }

    /// 是否处于运行模式
    pub fn is_running_mode(&self) -> bool {
        match self {
            RobotModeData::V1_X(d) => d.robot_mode == RobotModeV1::Running,
            RobotModeData::V3_0_1(d) => d.robot_mode == RobotModeV3::Running,
            RobotModeData::V3_2(d) => d.base.robot_mode == RobotModeV3::Running,
        }
    }

    /// 推导机器人状态
    pub fn robot_state(&self) -> RobotState {
        let flags = self.flags();
        RobotState::derive(
            flags.emergency_stopped,
            flags.protective_stopped,
            self.is_running_mode(),
        )
    }
}

// ============================================================================
// JointData 子包
// ============================================================================

/// 单个关节的状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointInfo {
    pub q_actual: f64,
    pub q_target: f64,
    pub qd_actual: f64,
    pub i_actual: f32,
    pub v_actual: f32,
    pub t_motor: f32,
    pub t_micro: f32,
    pub joint_mode: u8,
}

impl JointInfo {
    /// 线上字节数
    pub const SIZE: usize = 3 * 8 + 4 * 4 + 1;

    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            q_actual: bp.parse()?,
            q_target: bp.parse()?,
            qd_actual: bp.parse()?,
            i_actual: bp.parse()?,
            v_actual: bp.parse()?,
            t_motor: bp.parse()?,
            t_micro: bp.parse()?,
            joint_mode: bp.parse()?,
        })
    }
}

/// JointData 子包（所有版本布局相同）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointData {
    pub joints: [JointInfo; JOINT_COUNT],
}

impl JointData {
    pub fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        let mut joints = [JointInfo::default(); JOINT_COUNT];
        for joint in joints.iter_mut() {
            *joint = JointInfo::decode(bp)?;
        }
        Ok(Self { joints })
    }

    pub fn q_actual(&self) -> [f64; JOINT_COUNT] {
        self.joints.map(|j| j.q_actual)
    }

    pub fn qd_actual(&self) -> [f64; JOINT_COUNT] {
        self.joints.map(|j| j.qd_actual)
    }
}

// ============================================================================
// 完整快照
// ============================================================================

/// 主端口机器人状态快照
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotStateSnapshot {
    pub version: StateVersion,
    pub robot_mode: Option<RobotModeData>,
    pub joint_data: Option<JointData>,
    /// 未解码而跳过的子包数量
    pub skipped_packages: usize,
}

impl RobotStateSnapshot {
    /// 解码消息体（类型标签之后的全部字节）
    ///
    /// 每个子包都被限制在自身声明的长度内；子包内多出的字节忽略（前向兼容）。
    pub fn decode(version: StateVersion, bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        let mut snapshot = Self {
            version,
            robot_mode: None,
            joint_data: None,
            skipped_packages: 0,
        };

        while !bp.is_empty() {
            let declared = bp.peek::<i32>()?;
            let size = usize::try_from(declared)
                .ok()
                .filter(|s| *s >= PACKAGE_HEADER_SIZE)
                .ok_or(ProtocolError::InvalidDeclaredLength(declared))?;

            let mut package = bp.take(size)?;
            package.consume(4)?;
            let package_type = RobotStatePackageType::from(package.parse::<u8>()?);

            match package_type {
                RobotStatePackageType::RobotModeData => {
                    snapshot.robot_mode = Some(RobotModeData::decode(version, &mut package)?);
                },
                RobotStatePackageType::JointData => {
                    snapshot.joint_data = Some(JointData::decode(&mut package)?);
                },
                _ => snapshot.skipped_packages += 1,
            }
        }

        Ok(snapshot)
    }
}

impl JointFeedback for RobotStateSnapshot {
    fn q_actual(&self) -> Option<[f64; JOINT_COUNT]> {
        self.joint_data.as_ref().map(JointData::q_actual)
    }

    fn qd_actual(&self) -> Option<[f64; JOINT_COUNT]> {
        self.joint_data.as_ref().map(JointData::qd_actual)
    }

    fn robot_state(&self) -> Option<RobotState> {
        self.robot_mode.as_ref().map(RobotModeData::robot_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_package_v3(emergency: bool, protective: bool, mode: u8, with_limit: bool) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&123_456u64.to_be_bytes());
        body.extend_from_slice(&[1, 1, 1, emergency as u8, protective as u8, 0, 0]);
        body.push(mode);
        body.push(0); // control mode
        body.extend_from_slice(&1.0f64.to_be_bytes());
        body.extend_from_slice(&0.5f64.to_be_bytes());
        if with_limit {
            body.extend_from_slice(&0.9f64.to_be_bytes());
        }
        wrap_package(0, &body)
    }

    fn wrap_package(package_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((body.len() + PACKAGE_HEADER_SIZE) as i32).to_be_bytes());
        out.push(package_type);
        out.extend_from_slice(body);
        out
    }

    fn joint_package(q: f64) -> Vec<u8> {
        let mut body = Vec::new();
        for i in 0..JOINT_COUNT {
            body.extend_from_slice(&(q + i as f64).to_be_bytes());
            body.extend_from_slice(&0.0f64.to_be_bytes());
            body.extend_from_slice(&0.25f64.to_be_bytes());
            for _ in 0..4 {
                body.extend_from_slice(&1.0f32.to_be_bytes());
            }
            body.push(253);
        }
        wrap_package(1, &body)
    }

    #[test]
    fn test_robot_state_u8_roundtrip() {
        for state in [
            RobotState::Running,
            RobotState::ProtectiveStopped,
            RobotState::EmergencyStopped,
            RobotState::Error,
        ] {
            assert_eq!(RobotState::from_u8(state.as_u8()), Some(state));
        }
        assert_eq!(RobotState::from_u8(17), None);
    }

    #[test]
    fn test_derive_priority() {
        assert_eq!(RobotState::derive(true, true, true), RobotState::EmergencyStopped);
        assert_eq!(RobotState::derive(false, true, true), RobotState::ProtectiveStopped);
        assert_eq!(RobotState::derive(false, false, false), RobotState::Error);
        assert_eq!(RobotState::derive(false, false, true), RobotState::Running);
    }

    #[test]
    fn test_decode_v3_2_snapshot() {
        let mut buf = mode_package_v3(false, false, 7, true);
        buf.extend_from_slice(&joint_package(0.1));
        buf.extend_from_slice(&wrap_package(4, &[0u8; 12])); // CartesianInfo，跳过

        let mut bp = BinaryReader::new(&buf);
        let snapshot = RobotStateSnapshot::decode(StateVersion::V3_2, &mut bp).unwrap();

        assert_eq!(snapshot.robot_state(), Some(RobotState::Running));
        assert_eq!(snapshot.skipped_packages, 1);
        let q = snapshot.q_actual().unwrap();
        assert!((q[0] - 0.1).abs() < 1e-12);
        assert!((q[5] - 5.1).abs() < 1e-12);
        assert_eq!(snapshot.qd_actual().unwrap(), [0.25; JOINT_COUNT]);
        match snapshot.robot_mode.unwrap() {
            RobotModeData::V3_2(d) => assert_eq!(d.target_speed_fraction_limit, 0.9),
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_decode_protective_stop() {
        let buf = mode_package_v3(false, true, 7, false);
        let mut bp = BinaryReader::new(&buf);
        let snapshot = RobotStateSnapshot::decode(StateVersion::V3_0_1, &mut bp).unwrap();
        assert_eq!(snapshot.robot_state(), Some(RobotState::ProtectiveStopped));
        assert!(snapshot.q_actual().is_none());
    }

    #[test]
    fn test_decode_v1_mode_not_running_is_error() {
        let mut body = Vec::new();
        body.extend_from_slice(&1u64.to_be_bytes());
        body.extend_from_slice(&[1, 1, 1, 0, 0, 0, 0]);
        body.push(2); // Ready
        body.extend_from_slice(&1.0f64.to_be_bytes());
        let buf = wrap_package(0, &body);

        let mut bp = BinaryReader::new(&buf);
        let snapshot = RobotStateSnapshot::decode(StateVersion::V1_X, &mut bp).unwrap();
        assert_eq!(snapshot.robot_state(), Some(RobotState::Error));
    }

    #[test]
    fn test_truncated_package_is_error() {
        let mut buf = joint_package(0.0);
        buf.truncate(buf.len() - 10);
        let mut bp = BinaryReader::new(&buf);
        assert!(matches!(
            RobotStateSnapshot::decode(StateVersion::V3_2, &mut bp),
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_invalid_package_length() {
        let buf = 2i32.to_be_bytes();
        let mut bp = BinaryReader::new(&buf);
        assert_eq!(
            RobotStateSnapshot::decode(StateVersion::V3_2, &mut bp),
            Err(ProtocolError::InvalidDeclaredLength(2))
        );
    }
}
