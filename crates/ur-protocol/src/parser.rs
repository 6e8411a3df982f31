//! 消息解析策略
//!
//! 三种策略分别对应三类线上消息：
//!
//! | 策略 | 帧格式 | 载荷 |
//! |------|--------|------|
//! | [`StateParser`] | `[i32 长度][u8 标签=16][子包...]` | [`RobotStateSnapshot`] |
//! | [`RealtimeParser`] | `[i32 长度][f64...]`（无标签） | [`RealtimeStateSnapshot`] |
//! | [`MessageParser`] | `[i32 长度][u8 标签=20][u64][i8][u8 子类型]...` | [`RobotMessage`] |
//!
//! 解析失败通过 [`ParseError`] 区分三种情况：
//!
//! - `UnexpectedKind`：标签不匹配，调用方可换一种策略重试；
//! - `Incomplete`：缓冲区不足一个完整包，调用方应继续读取后重试；
//! - `Decode`：标签匹配但内容损坏，唯一以 `error!` 级别记录的情况。
//!
//! 前两种情况下读取器游标保持不动。

use crate::ids::{LENGTH_PREFIX_SIZE, MessageType, TAGGED_HEADER_SIZE};
use crate::messages::RobotMessage;
use crate::reader::BinaryReader;
use crate::rt_state::RealtimeStateSnapshot;
use crate::state::{RobotState, RobotStateSnapshot};
use crate::version::{ProtocolVersions, RealtimeVersion, StateVersion};
use crate::{JOINT_COUNT, JointFeedback, ProtocolError};
use thiserror::Error;
use tracing::{debug, error};

/// 消息种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageKind {
    RobotState,
    RobotMessage,
    RealtimeState,
}

/// 已解码的载荷
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::large_enum_variant)]
pub enum Payload {
    RobotState(RobotStateSnapshot),
    RealtimeState(RealtimeStateSnapshot),
    RobotMessage(RobotMessage),
}

/// 一条完整解码的线上消息
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WireMessage {
    /// 包头声明的长度（含长度前缀），等于本次消费的字节数
    pub length: usize,
    pub payload: Payload,
}

impl WireMessage {
    pub fn kind(&self) -> MessageKind {
        match self.payload {
            Payload::RobotState(_) => MessageKind::RobotState,
            Payload::RealtimeState(_) => MessageKind::RealtimeState,
            Payload::RobotMessage(_) => MessageKind::RobotMessage,
        }
    }

    pub fn as_robot_message(&self) -> Option<&RobotMessage> {
        match &self.payload {
            Payload::RobotMessage(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_realtime(&self) -> Option<&RealtimeStateSnapshot> {
        match &self.payload {
            Payload::RealtimeState(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn as_robot_state(&self) -> Option<&RobotStateSnapshot> {
        match &self.payload {
            Payload::RobotState(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

impl JointFeedback for WireMessage {
    fn q_actual(&self) -> Option<[f64; JOINT_COUNT]> {
        match &self.payload {
            Payload::RobotState(s) => s.q_actual(),
            Payload::RealtimeState(s) => s.q_actual(),
            Payload::RobotMessage(_) => None,
        }
    }

    fn qd_actual(&self) -> Option<[f64; JOINT_COUNT]> {
        match &self.payload {
            Payload::RobotState(s) => s.qd_actual(),
            Payload::RealtimeState(s) => s.qd_actual(),
            Payload::RobotMessage(_) => None,
        }
    }

    fn robot_state(&self) -> Option<RobotState> {
        match &self.payload {
            Payload::RobotState(s) => s.robot_state(),
            Payload::RealtimeState(s) => s.robot_state(),
            Payload::RobotMessage(_) => None,
        }
    }
}

/// “未产生消息”的原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// 标签与本策略不符（换一种策略重试）
    #[error("Unexpected message kind: expected {expected:?}, found tag {found}")]
    UnexpectedKind { expected: MessageType, found: u8 },

    /// 缓冲区不足一个完整包（继续读取后重试）
    #[error("Incomplete packet: need {needed} bytes, {available} available")]
    Incomplete { needed: usize, available: usize },

    /// 标签匹配但内容无法解码
    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: ProtocolError,
    },
}

impl ParseError {
    pub fn is_wrong_kind(&self) -> bool {
        matches!(self, ParseError::UnexpectedKind { .. })
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Incomplete { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ParseError::Decode { .. })
    }

    /// 不需要记录为错误的情况
    pub fn is_recoverable(&self) -> bool {
        !self.is_malformed()
    }

    fn decode(what: &'static str, source: ProtocolError) -> Self {
        ParseError::Decode { what, source }
    }

    /// 按约定的级别记录
    fn log(&self, strategy: &'static str) {
        match self {
            ParseError::UnexpectedKind { expected, found } => {
                debug!("{strategy}: skipping message with tag {found}, expected {expected:?}");
            },
            ParseError::Incomplete { needed, available } => {
                debug!("{strategy}: waiting for more data ({available}/{needed} bytes)");
            },
            ParseError::Decode { what, source } => {
                error!("{strategy}: failed to decode {what}: {source}");
            },
        }
    }
}

/// 解析策略
pub trait Parser {
    /// 从读取器当前位置解码一条完整消息
    ///
    /// 成功时游标前进整个声明长度；`UnexpectedKind` / `Incomplete` 时游标不动。
    fn parse(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError>;

    /// 便捷方法：解码一个独立的缓冲区
    fn parse_bytes(&self, bytes: &[u8]) -> Result<WireMessage, ParseError> {
        self.parse(&mut BinaryReader::new(bytes))
    }
}

/// 读取帧头并切出包体
///
/// 返回的子读取器已跳过帧头（长度前缀与可选标签），且只覆盖声明长度。
fn frame<'a>(
    bp: &mut BinaryReader<'a>,
    tag: Option<MessageType>,
    what: &'static str,
) -> Result<(usize, BinaryReader<'a>), ParseError> {
    let incomplete = |needed: usize| ParseError::Incomplete {
        needed,
        available: bp.remaining(),
    };

    let declared = bp
        .peek::<i32>()
        .map_err(|_| incomplete(LENGTH_PREFIX_SIZE))?;

    let header = match tag {
        Some(expected) => {
            let found = bp
                .peek_at::<u8>(LENGTH_PREFIX_SIZE)
                .map_err(|_| incomplete(TAGGED_HEADER_SIZE))?;
            if found != u8::from(expected) {
                return Err(ParseError::UnexpectedKind { expected, found });
            }
            TAGGED_HEADER_SIZE
        },
        None => LENGTH_PREFIX_SIZE,
    };

    let length = usize::try_from(declared)
        .ok()
        .filter(|len| *len >= header)
        .ok_or_else(|| ParseError::decode(what, ProtocolError::InvalidDeclaredLength(declared)))?;

    if !bp.check_size(length) {
        return Err(incomplete(length));
    }

    let mut body = bp.take(length).map_err(|e| ParseError::decode(what, e))?;
    body.consume(header).map_err(|e| ParseError::decode(what, e))?;
    Ok((length, body))
}

/// 机器人状态快照策略（主/副端口）
#[derive(Debug, Clone, Copy)]
pub struct StateParser {
    pub version: StateVersion,
}

impl StateParser {
    pub fn new(version: StateVersion) -> Self {
        Self { version }
    }

    fn parse_inner(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError> {
        const WHAT: &str = "robot state";
        let (length, mut body) = frame(bp, Some(MessageType::RobotState), WHAT)?;
        let snapshot = RobotStateSnapshot::decode(self.version, &mut body)
            .map_err(|e| ParseError::decode(WHAT, e))?;
        Ok(WireMessage {
            length,
            payload: Payload::RobotState(snapshot),
        })
    }
}

impl Parser for StateParser {
    fn parse(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError> {
        self.parse_inner(bp).inspect_err(|e| e.log("state parser"))
    }
}

/// 实时状态策略（实时端口）
#[derive(Debug, Clone, Copy)]
pub struct RealtimeParser {
    pub version: RealtimeVersion,
}

impl RealtimeParser {
    pub fn new(version: RealtimeVersion) -> Self {
        Self { version }
    }

    fn parse_inner(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError> {
        const WHAT: &str = "realtime state";
        let (length, mut body) = frame(bp, None, WHAT)?;
        let snapshot = RealtimeStateSnapshot::decode(self.version, &mut body)
            .map_err(|e| ParseError::decode(WHAT, e))?;
        Ok(WireMessage {
            length,
            payload: Payload::RealtimeState(snapshot),
        })
    }
}

impl Parser for RealtimeParser {
    fn parse(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError> {
        self.parse_inner(bp).inspect_err(|e| e.log("realtime parser"))
    }
}

/// 机器人消息策略（不依赖固件版本）
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageParser;

impl MessageParser {
    fn parse_inner(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError> {
        const WHAT: &str = "robot message";
        let (length, mut body) = frame(bp, Some(MessageType::RobotMessage), WHAT)?;
        let message = RobotMessage::decode(&mut body).map_err(|e| ParseError::decode(WHAT, e))?;
        Ok(WireMessage {
            length,
            payload: Payload::RobotMessage(message),
        })
    }
}

impl Parser for MessageParser {
    fn parse(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError> {
        self.parse_inner(bp).inspect_err(|e| e.log("message parser"))
    }
}

/// 主/副端口组合策略：先尝试状态快照，标签不符时再尝试机器人消息
#[derive(Debug, Clone, Copy)]
pub struct PrimaryParser {
    state: StateParser,
    message: MessageParser,
}

impl PrimaryParser {
    pub fn new(version: StateVersion) -> Self {
        Self {
            state: StateParser::new(version),
            message: MessageParser,
        }
    }
}

impl Parser for PrimaryParser {
    fn parse(&self, bp: &mut BinaryReader<'_>) -> Result<WireMessage, ParseError> {
        match self.state.parse(bp) {
            Err(ParseError::UnexpectedKind { .. }) => self.message.parse(bp),
            other => other,
        }
    }
}

impl From<&ProtocolVersions> for PrimaryParser {
    fn from(versions: &ProtocolVersions) -> Self {
        PrimaryParser::new(versions.state)
    }
}

impl From<&ProtocolVersions> for RealtimeParser {
    fn from(versions: &ProtocolVersions) -> Self {
        RealtimeParser::new(versions.realtime)
    }
}
