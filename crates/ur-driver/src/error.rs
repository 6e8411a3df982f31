//! 驱动层错误类型定义

use thiserror::Error;
use ur_protocol::{ParseError, ProtocolError};

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 网络 IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 协议解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 消息解析未产生结果
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// 对端关闭了连接
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 控制器固件版本不受支持
    #[error("Unsupported firmware version: {0}")]
    UnsupportedVersion(String),

    /// 收到了与当前步骤不符的消息
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// 包头声明的长度无效
    #[error("Invalid packet length: {0}")]
    InvalidPacketLength(i32),

    /// 后台线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否为可以继续读取的暂时性错误
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout)
    }

    /// 是否表示连接已不可用
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::ConnectionClosed | DriverError::Io(_) | DriverError::InvalidPacketLength(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use ur_protocol::{MessageType, ParseError, ProtocolError};

    #[test]
    fn test_driver_error_display() {
        let msg = format!("{}", DriverError::Timeout);
        assert_eq!(msg, "Operation timeout");

        let msg = format!("{}", DriverError::ConnectionClosed);
        assert_eq!(msg, "Connection closed by peer");

        let msg = format!("{}", DriverError::UnsupportedVersion("2.0.0".into()));
        assert!(msg.contains("2.0.0"));

        let msg = format!("{}", DriverError::InvalidPacketLength(-3));
        assert!(msg.contains("-3"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: DriverError = ProtocolError::InvalidDeclaredLength(2).into();
        assert!(matches!(
            err,
            DriverError::Protocol(ProtocolError::InvalidDeclaredLength(2))
        ));
    }

    #[test]
    fn test_from_parse_error() {
        let err: DriverError = ParseError::UnexpectedKind {
            expected: MessageType::RobotMessage,
            found: 16,
        }
        .into();
        assert!(matches!(err, DriverError::Parse(ParseError::UnexpectedKind { .. })));
    }

    #[test]
    fn test_classification() {
        assert!(DriverError::Timeout.is_timeout());
        assert!(!DriverError::Timeout.is_fatal());
        assert!(DriverError::ConnectionClosed.is_fatal());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(DriverError::from(io).is_fatal());
    }
}
