//! 实时端口状态快照
//!
//! 实时端口（30003）每 8ms 推送一个定长包：4 字节长度前缀之后全部为 `f64`。
//! 布局由固件版本决定，见 [`RealtimeVersion`]。

use crate::reader::BinaryReader;
use crate::state::{RobotModeV3, SafetyMode};
use crate::version::RealtimeVersion;
use crate::{JOINT_COUNT, JointFeedback, ProtocolError, RobotState};

type Joints = [f64; JOINT_COUNT];
type Vector6 = [f64; 6];
type Vector3 = [f64; 3];

/// 各版本共有的头部字段
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtShared {
    pub time: f64,
    pub q_target: Joints,
    pub qd_target: Joints,
    pub qdd_target: Joints,
    pub i_target: Joints,
    pub m_target: Joints,
    pub q_actual: Joints,
    pub qd_actual: Joints,
    pub i_actual: Joints,
}

impl RtShared {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            time: bp.parse()?,
            q_target: bp.parse_array()?,
            qd_target: bp.parse_array()?,
            qdd_target: bp.parse_array()?,
            i_target: bp.parse_array()?,
            m_target: bp.parse_array()?,
            q_actual: bp.parse_array()?,
            qd_actual: bp.parse_array()?,
            i_actual: bp.parse_array()?,
        })
    }
}

/// 固件 1.6 - 1.7
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtStateV1_6_7 {
    pub shared: RtShared,
    pub tool_accelerometer_values: Vector3,
    pub tcp_force: Vector6,
    pub tool_vector: Vector6,
    pub tcp_speed: Vector6,
    pub digital_input_bits: f64,
    pub motor_temperatures: Joints,
    pub controller_timer: f64,
    pub test_value: f64,
}

impl RtStateV1_6_7 {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        let shared = RtShared::decode(bp)?;
        let tool_accelerometer_values = bp.parse_array()?;
        bp.consume(15 * 8)?;
        Ok(Self {
            shared,
            tool_accelerometer_values,
            tcp_force: bp.parse_array()?,
            tool_vector: bp.parse_array()?,
            tcp_speed: bp.parse_array()?,
            digital_input_bits: bp.parse()?,
            motor_temperatures: bp.parse_array()?,
            controller_timer: bp.parse()?,
            test_value: bp.parse()?,
        })
    }
}

/// 固件 1.8
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtStateV1_8 {
    pub base: RtStateV1_6_7,
    pub robot_mode: f64,
    pub joint_modes: Joints,
}

impl RtStateV1_8 {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            base: RtStateV1_6_7::decode(bp)?,
            robot_mode: bp.parse()?,
            joint_modes: bp.parse_array()?,
        })
    }

    /// 1.x 的模式编码：0 运行，4/10 保护性停止，5 急停
    pub fn robot_state(&self) -> RobotState {
        match self.robot_mode as u8 {
            0 => RobotState::Running,
            4 | 10 => RobotState::ProtectiveStopped,
            5 => RobotState::EmergencyStopped,
            _ => RobotState::Error,
        }
    }
}

/// 固件 3.0 - 3.1
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtStateV3_0_1 {
    pub shared: RtShared,
    pub i_control: Joints,
    pub tool_vector_actual: Vector6,
    pub tcp_speed_actual: Vector6,
    pub tcp_force: Vector6,
    pub tool_vector_target: Vector6,
    pub tcp_speed_target: Vector6,
    pub digital_input_bits: f64,
    pub motor_temperatures: Joints,
    pub controller_timer: f64,
    pub test_value: f64,
    pub robot_mode: f64,
    pub joint_modes: Joints,
    pub safety_mode: f64,
    pub tool_accelerometer_values: Vector3,
    pub speed_scaling: f64,
    pub linear_momentum_norm: f64,
    pub v_main: f64,
    pub v_robot: f64,
    pub i_robot: f64,
    pub v_actual: Joints,
}

impl RtStateV3_0_1 {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        let shared = RtShared::decode(bp)?;
        let i_control = bp.parse_array()?;
        let tool_vector_actual = bp.parse_array()?;
        let tcp_speed_actual = bp.parse_array()?;
        let tcp_force = bp.parse_array()?;
        let tool_vector_target = bp.parse_array()?;
        let tcp_speed_target = bp.parse_array()?;
        let digital_input_bits = bp.parse()?;
        let motor_temperatures = bp.parse_array()?;
        let controller_timer = bp.parse()?;
        let test_value = bp.parse()?;
        let robot_mode = bp.parse()?;
        let joint_modes = bp.parse_array()?;
        let safety_mode = bp.parse()?;
        bp.consume(6 * 8)?;
        let tool_accelerometer_values = bp.parse_array()?;
        bp.consume(6 * 8)?;
        let speed_scaling = bp.parse()?;
        let linear_momentum_norm = bp.parse()?;
        bp.consume(2 * 8)?;
        Ok(Self {
            shared,
            i_control,
            tool_vector_actual,
            tcp_speed_actual,
            tcp_force,
            tool_vector_target,
            tcp_speed_target,
            digital_input_bits,
            motor_temperatures,
            controller_timer,
            test_value,
            robot_mode,
            joint_modes,
            safety_mode,
            tool_accelerometer_values,
            speed_scaling,
            linear_momentum_norm,
            v_main: bp.parse()?,
            v_robot: bp.parse()?,
            i_robot: bp.parse()?,
            v_actual: bp.parse_array()?,
        })
    }

    /// 3.x 的状态推导：安全模式优先于机器人模式
    pub fn robot_state(&self) -> RobotState {
        let safety = SafetyMode::from(self.safety_mode as u8);
        let mode = RobotModeV3::from(self.robot_mode as u8);
        match safety {
            SafetyMode::SystemEmergencyStop | SafetyMode::RobotEmergencyStop => {
                RobotState::EmergencyStopped
            },
            SafetyMode::ProtectiveStop | SafetyMode::SafeguardStop => {
                RobotState::ProtectiveStopped
            },
            SafetyMode::Recovery | SafetyMode::Violation | SafetyMode::Fault => RobotState::Error,
            _ if mode != RobotModeV3::Running => RobotState::Error,
            _ => RobotState::Running,
        }
    }
}

/// 固件 3.2 - 3.4
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtStateV3_2_3 {
    pub base: RtStateV3_0_1,
    pub digital_outputs: f64,
    pub program_state: f64,
}

impl RtStateV3_2_3 {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            base: RtStateV3_0_1::decode(bp)?,
            digital_outputs: bp.parse()?,
            program_state: bp.parse()?,
        })
    }
}

/// 固件 3.5+ 与 5.1+
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtStateV3_5_5_1 {
    pub base: RtStateV3_2_3,
    pub elbow_position: Vector3,
    pub elbow_velocity: Vector3,
}

impl RtStateV3_5_5_1 {
    fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            base: RtStateV3_2_3::decode(bp)?,
            elbow_position: bp.parse_array()?,
            elbow_velocity: bp.parse_array()?,
        })
    }
}

/// 版本化的实时快照
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::large_enum_variant)]
pub enum RealtimeStateSnapshot {
    V1_6_7(RtStateV1_6_7),
    V1_8(RtStateV1_8),
    V3_0_1(RtStateV3_0_1),
    V3_2_3(RtStateV3_2_3),
    V3_5_5_1(RtStateV3_5_5_1),
}

impl RealtimeStateSnapshot {
    /// 解码长度前缀之后的包体
    ///
    /// 调用方负责保证 `bp` 覆盖完整的包体（见 `RealtimeVersion::packet_size`）。
    pub fn decode(version: RealtimeVersion, bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        Ok(match version {
            RealtimeVersion::V1_6_7 => RealtimeStateSnapshot::V1_6_7(RtStateV1_6_7::decode(bp)?),
            RealtimeVersion::V1_8 => RealtimeStateSnapshot::V1_8(RtStateV1_8::decode(bp)?),
            RealtimeVersion::V3_0_1 => RealtimeStateSnapshot::V3_0_1(RtStateV3_0_1::decode(bp)?),
            RealtimeVersion::V3_2_3 => RealtimeStateSnapshot::V3_2_3(RtStateV3_2_3::decode(bp)?),
            RealtimeVersion::V3_5_5_1 => {
                RealtimeStateSnapshot::V3_5_5_1(RtStateV3_5_5_1::decode(bp)?)
            },
        })
    }

    pub fn version(&self) -> RealtimeVersion {
        match self {
            RealtimeStateSnapshot::V1_6_7(_) => RealtimeVersion::V1_6_7,
            RealtimeStateSnapshot::V1_8(_) => RealtimeVersion::V1_8,
            RealtimeStateSnapshot::V3_0_1(_) => RealtimeVersion::V3_0_1,
            RealtimeStateSnapshot::V3_2_3(_) => RealtimeVersion::V3_2_3,
            RealtimeStateSnapshot::V3_5_5_1(_) => RealtimeVersion::V3_5_5_1,
        }
    }

    /// 共有头部字段
    pub fn shared(&self) -> &RtShared {
        match self {
            RealtimeStateSnapshot::V1_6_7(s) => &s.shared,
            RealtimeStateSnapshot::V1_8(s) => &s.base.shared,
            RealtimeStateSnapshot::V3_0_1(s) => &s.shared,
            RealtimeStateSnapshot::V3_2_3(s) => &s.base.shared,
            RealtimeStateSnapshot::V3_5_5_1(s) => &s.base.base.shared,
        }
    }

    /// 控制器时间戳（秒）
    pub fn time(&self) -> f64 {
        self.shared().time
    }
}

impl JointFeedback for RealtimeStateSnapshot {
    fn q_actual(&self) -> Option<Joints> {
        Some(self.shared().q_actual)
    }

    fn qd_actual(&self) -> Option<Joints> {
        Some(self.shared().qd_actual)
    }

    /// 1.6 - 1.7 的实时包不携带模式字段
    fn robot_state(&self) -> Option<RobotState> {
        match self {
            RealtimeStateSnapshot::V1_6_7(_) => None,
            RealtimeStateSnapshot::V1_8(s) => Some(s.robot_state()),
            RealtimeStateSnapshot::V3_0_1(s) => Some(s.robot_state()),
            RealtimeStateSnapshot::V3_2_3(s) => Some(s.base.robot_state()),
            RealtimeStateSnapshot::V3_5_5_1(s) => Some(s.base.base.robot_state()),
        }
    }
}
