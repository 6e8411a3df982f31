//! 伺服指令记录
//!
//! 反向连接上每个控制周期发送一条定长记录（56 字节，大端）：
//!
//! ```text
//! [u32 序号][6 × i32 位置][6 × i32 速度][i32 标志]
//! ```
//!
//! 位置与速度乘以 [`SERVO_SCALE`] 后取整传输。控制程序可选择回显 4 字节序号作为应答。

use crate::reader::BinaryReader;
use crate::{JOINT_COUNT, ProtocolError};
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 定点缩放系数
pub const SERVO_SCALE: f64 = 1_000_000.0;

/// 一条记录的字节数
pub const SERVO_RECORD_SIZE: usize = 4 + JOINT_COUNT * 4 * 2 + 4;

/// 应答字节数（回显的序号）
pub const SERVO_ACK_SIZE: usize = 4;

/// 记录标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum ServoFlag {
    /// 停止伺服，控制程序保持连接等待下一段轨迹
    Stop = 0,
    /// 继续伺服到给定目标
    KeepAlive = 1,
}

/// 一条伺服指令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoCommand {
    pub sequence: u32,
    pub positions: [f64; JOINT_COUNT],
    pub velocities: [f64; JOINT_COUNT],
    pub flag: ServoFlag,
}

/// 弧度/弧度每秒 → 线上定点值（饱和截断）
#[inline]
pub fn to_fixed(value: f64) -> i32 {
    (value * SERVO_SCALE).round() as i32
}

/// 线上定点值 → 弧度/弧度每秒
#[inline]
pub fn from_fixed(value: i32) -> f64 {
    value as f64 / SERVO_SCALE
}

impl ServoCommand {
    /// 伺服到目标位置/速度
    pub fn servo(
        sequence: u32,
        positions: [f64; JOINT_COUNT],
        velocities: [f64; JOINT_COUNT],
    ) -> Self {
        Self {
            sequence,
            positions,
            velocities,
            flag: ServoFlag::KeepAlive,
        }
    }

    /// 保持当前位置（速度为 0）
    pub fn hold(sequence: u32, positions: [f64; JOINT_COUNT]) -> Self {
        Self::servo(sequence, positions, [0.0; JOINT_COUNT])
    }

    /// 停止伺服
    pub fn stop(sequence: u32, positions: [f64; JOINT_COUNT]) -> Self {
        Self {
            flag: ServoFlag::Stop,
            ..Self::hold(sequence, positions)
        }
    }

    /// 编码为线上记录
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SERVO_RECORD_SIZE);
        buf.put_u32(self.sequence);
        for p in self.positions {
            buf.put_i32(to_fixed(p));
        }
        for v in self.velocities {
            buf.put_i32(to_fixed(v));
        }
        buf.put_i32(self.flag.into());
        buf.freeze()
    }

    /// 从线上记录解码（定点精度内还原）
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != SERVO_RECORD_SIZE {
            return Err(ProtocolError::InvalidLength {
                expected: SERVO_RECORD_SIZE,
                actual: bytes.len(),
            });
        }
        let mut bp = BinaryReader::new(bytes);
        let sequence = bp.parse()?;
        let positions = bp.parse_array::<i32, JOINT_COUNT>()?.map(from_fixed);
        let velocities = bp.parse_array::<i32, JOINT_COUNT>()?.map(from_fixed);
        let raw_flag = bp.parse::<i32>()?;
        let flag = ServoFlag::try_from(raw_flag).map_err(|_| ProtocolError::InvalidValue {
            field: "flag".to_string(),
            value: raw_flag as i64,
        })?;
        Ok(Self {
            sequence,
            positions,
            velocities,
            flag,
        })
    }
}

/// 解码应答中的序号
pub fn decode_ack(bytes: &[u8]) -> Result<u32, ProtocolError> {
    BinaryReader::new(bytes).peek::<u32>()
}
