//! 机器人消息（`MessageType::RobotMessage`）
//!
//! 消息体布局：`[u64 时间戳][i8 来源][u8 子类型][子类型内容]`。
//! 目前只解码 `Version` 子类型，它在连接建立后作为主端口的第一条消息到达。

use crate::ids::{LENGTH_PREFIX_SIZE, MessageType, RobotMessageType, TAGGED_HEADER_SIZE};
use crate::reader::BinaryReader;
use crate::ProtocolError;
use bytes::{BufMut, BytesMut};
use semver::Version;

/// 控制器版本消息
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionMessage {
    pub project_name: String,
    pub major_version: u8,
    pub minor_version: u8,
    pub bugfix_version: i32,
    pub build_number: i32,
    pub build_date: String,
}

impl VersionMessage {
    /// 解码子类型内容
    pub fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        let name_len = bp.parse::<u8>()? as usize;
        let project_name = String::from_utf8_lossy(bp.parse_bytes(name_len)?).into_owned();
        let major_version = bp.parse()?;
        let minor_version = bp.parse()?;
        let bugfix_version = bp.parse()?;
        let build_number = bp.parse()?;
        let build_date = String::from_utf8_lossy(bp.parse_remainder())
            .trim_end_matches('\0')
            .to_string();

        Ok(Self {
            project_name,
            major_version,
            minor_version,
            bugfix_version,
            build_number,
            build_date,
        })
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        // 名称长度字段只有 1 字节
        let name = &self.project_name.as_bytes()[..self.project_name.len().min(u8::MAX as usize)];
        buf.put_u8(name.len() as u8);
        buf.put_slice(name);
        buf.put_u8(self.major_version);
        buf.put_u8(self.minor_version);
        buf.put_i32(self.bugfix_version);
        buf.put_i32(self.build_number);
        buf.put_slice(self.build_date.as_bytes());
    }

    /// 固件版本（负的 bugfix 视为 0）
    pub fn firmware(&self) -> Version {
        Version::new(
            self.major_version as u64,
            self.minor_version as u64,
            self.bugfix_version.max(0) as u64,
        )
    }
}

/// 机器人消息
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotMessage {
    pub timestamp: u64,
    pub source: i8,
    pub message_type: RobotMessageType,
    /// 仅当 `message_type == Version` 时存在；其余子类型没有载荷
    pub version: Option<VersionMessage>,
}

impl RobotMessage {
    /// 解码类型标签之后的消息体
    pub fn decode(bp: &mut BinaryReader<'_>) -> Result<Self, ProtocolError> {
        let timestamp = bp.parse()?;
        let source = bp.parse()?;
        let message_type = RobotMessageType::from(bp.parse::<u8>()?);
        let version = match message_type {
            RobotMessageType::Version => Some(VersionMessage::decode(bp)?),
            _ => None,
        };
        Ok(Self {
            timestamp,
            source,
            message_type,
            version,
        })
    }

    /// 编码为完整的线上消息（长度前缀 + 类型标签 + 消息体）
    ///
    /// 非 `Version` 子类型只写出消息头。用于仿真端与测试。
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_i32(0);
        buf.put_u8(MessageType::RobotMessage.into());
        buf.put_u64(self.timestamp);
        buf.put_i8(self.source);
        buf.put_u8(self.message_type.into());
        if let Some(version) = &self.version {
            version.encode_into(&mut buf);
        }
        let len = buf.len() as i32;
        buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&len.to_be_bytes());
        debug_assert!(buf.len() >= TAGGED_HEADER_SIZE);
        buf.to_vec()
    }
}
