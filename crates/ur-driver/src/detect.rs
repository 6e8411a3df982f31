//! 固件版本探测
//!
//! 控制器在主端口连接建立后首先发送一条 `Version` 机器人消息。
//! 这里读取它并一次性确定后续使用的快照布局。

use crate::error::DriverError;
use crate::stream::PacketSource;
use semver::Version;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use ur_protocol::{MessageParser, ParseError, Parser, ProtocolError, ProtocolVersions};

/// 从主端口读取版本消息并解析布局
///
/// 版本消息之前到达的其他包会被跳过；截止时间内没有收到版本消息返回
/// [`DriverError::Timeout`]。
pub fn detect_versions(
    source: &mut impl PacketSource,
    timeout: Duration,
) -> Result<ProtocolVersions, DriverError> {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        let bytes = match source.receive() {
            Ok(bytes) => bytes,
            Err(DriverError::Timeout) => continue,
            Err(e) => return Err(e),
        };

        let msg = match MessageParser.parse_bytes(&bytes) {
            Ok(msg) => msg,
            Err(ParseError::UnexpectedKind { found, .. }) => {
                debug!("Skipping message with tag {} while waiting for version", found);
                continue;
            },
            Err(e) => return Err(e.into()),
        };

        let Some(version) = msg.as_robot_message().and_then(|m| m.version.as_ref()) else {
            debug!("Skipping non-version robot message");
            continue;
        };

        let versions = resolve_versions(version.firmware())?;

        info!(
            "Controller {} firmware {} (build {}), realtime layout {:?}, state layout {:?}",
            version.project_name,
            versions.firmware,
            version.build_number,
            versions.realtime,
            versions.state
        );
        return Ok(versions);
    }

    Err(DriverError::Timeout)
}

/// 固件版本 → 布局，不支持的版本映射为 [`DriverError::UnsupportedVersion`]
pub fn resolve_versions(firmware: Version) -> Result<ProtocolVersions, DriverError> {
    ProtocolVersions::resolve(firmware).map_err(|e| match e {
        ProtocolError::UnsupportedVersion(v) => DriverError::UnsupportedVersion(v),
        other => DriverError::Protocol(other),
    })
}
