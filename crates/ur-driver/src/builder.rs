//! Builder 模式实现
//!
//! 提供链式构造 [`RobotDriver`] 的便捷方式。

use crate::detect::{detect_versions, resolve_versions};
use crate::error::DriverError;
use crate::robot::RobotDriver;
use crate::state::RobotContext;
use crate::stream::{PacketSource, TcpPacketStream};
use semver::Version;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ur_protocol::{PRIMARY_PORT, ProtocolVersions, REALTIME_PORT};

/// RobotDriver Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ur_driver::RobotDriverBuilder;
///
/// let driver = RobotDriverBuilder::new("192.168.56.101")
///     .connect_timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RobotDriverBuilder {
    host: String,
    primary_port: u16,
    realtime_port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
    version_timeout: Duration,
    telemetry_timeout: Duration,
    /// 是否持续读取主端口（由主端口负责机器人状态）
    ingest_primary: bool,
    /// 跳过版本探测，直接使用给定固件版本
    firmware: Option<Version>,
}

impl RobotDriverBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            primary_port: PRIMARY_PORT,
            realtime_port: REALTIME_PORT,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(100),
            version_timeout: Duration::from_secs(5),
            telemetry_timeout: Duration::from_secs(1),
            ingest_primary: true,
            firmware: None,
        }
    }

    pub fn primary_port(mut self, port: u16) -> Self {
        self.primary_port = port;
        self
    }

    pub fn realtime_port(mut self, port: u16) -> Self {
        self.realtime_port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 套接字读超时（也是接收线程检查退出标志的周期）
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn version_timeout(mut self, timeout: Duration) -> Self {
        self.version_timeout = timeout;
        self
    }

    pub fn telemetry_timeout(mut self, timeout: Duration) -> Self {
        self.telemetry_timeout = timeout;
        self
    }

    pub fn ingest_primary(mut self, enabled: bool) -> Self {
        self.ingest_primary = enabled;
        self
    }

    pub fn firmware(mut self, firmware: Version) -> Self {
        self.firmware = Some(firmware);
        self
    }

    /// 连接控制器并启动接收线程
    ///
    /// 顺序：主端口 → 版本探测 → 实时端口 → 启动线程。
    pub fn build(self) -> Result<RobotDriver, DriverError> {
        let mut primary = TcpPacketStream::connect(
            (self.host.as_str(), self.primary_port),
            self.connect_timeout,
            self.read_timeout,
        )?;
        info!("Connected to primary interface {}:{}", self.host, self.primary_port);

        let versions = match &self.firmware {
            Some(firmware) => {
                warn!("Skipping version detection, assuming firmware {}", firmware);
                resolve_versions(firmware.clone())?
            },
            None => detect_versions(&mut primary, self.version_timeout)?,
        };

        let realtime = TcpPacketStream::connect(
            (self.host.as_str(), self.realtime_port),
            self.connect_timeout,
            self.read_timeout,
        )?;
        info!("Connected to realtime interface {}:{}", self.host, self.realtime_port);

        let primary = self.ingest_primary.then_some(primary);
        self.start(realtime, primary, versions)
    }

    /// 用给定的包来源启动驱动（不建立网络连接）
    pub fn start<R, P>(
        &self,
        realtime: R,
        primary: Option<P>,
        versions: ProtocolVersions,
    ) -> Result<RobotDriver, DriverError>
    where
        R: PacketSource + Send + 'static,
        P: PacketSource + Send + 'static,
    {
        let ctx = Arc::new(RobotContext::new(self.telemetry_timeout));
        RobotDriver::start(realtime, primary, versions, ctx)
    }
}
