//! dump 命令
//!
//! 连接主端口或实时端口，打印解码结果；无法解码的包以十六进制输出。

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use semver::Version;
use std::path::Path;
use std::time::Duration;
use ur_driver::{
    IngestMetrics, PacketSource, PipelineConfig, RobotContext, TcpPacketStream, detect_versions,
    process_packet, resolve_versions,
};
use ur_protocol::{JointFeedback, Parser, PrimaryParser, RealtimeParser, WireMessage};

use crate::config_path;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_millis(100);
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Port {
    /// 主端口（机器人状态 + 消息）
    Primary,
    /// 实时端口（125Hz 关节反馈）
    Realtime,
}

/// 包转储命令参数
#[derive(Args, Debug)]
pub struct DumpCommand {
    /// 机器人地址（覆盖配置）
    #[arg(long)]
    pub host: Option<String>,

    /// 端口
    #[arg(short, long, value_enum, default_value_t = Port::Realtime)]
    pub port: Port,

    /// 打印的包数量
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// 固件版本（跳过探测，如 3.5.4）
    #[arg(long)]
    pub firmware: Option<String>,
}

impl DumpCommand {
    pub fn execute(&self, config_path: &Path) -> Result<()> {
        let config = config_path::load(config_path)?;
        let host = self.host.clone().unwrap_or(config.robot_host);

        let versions = match &self.firmware {
            Some(firmware) => {
                let version = Version::parse(firmware)
                    .with_context(|| format!("无效的固件版本: {}", firmware))?;
                resolve_versions(version)?
            },
            None => {
                let mut primary = TcpPacketStream::connect(
                    (host.as_str(), config.primary_port),
                    CONNECT_TIMEOUT,
                    READ_TIMEOUT,
                )
                .context("连接主端口失败")?;
                detect_versions(&mut primary, VERSION_TIMEOUT).context("固件版本探测失败")?
            },
        };
        println!(
            "固件 {}，实时布局 {:?}，状态布局 {:?}",
            versions.firmware, versions.realtime, versions.state
        );

        let port = match self.port {
            Port::Primary => config.primary_port,
            Port::Realtime => config.realtime_port,
        };
        let source = TcpPacketStream::connect((host.as_str(), port), CONNECT_TIMEOUT, READ_TIMEOUT)
            .with_context(|| format!("连接 {}:{} 失败", host, port))?;

        match self.port {
            Port::Primary => dump_packets(
                source,
                PrimaryParser::new(versions.state),
                PipelineConfig::primary(),
                self.count,
            ),
            Port::Realtime => dump_packets(
                source,
                RealtimeParser::new(versions.realtime),
                PipelineConfig::realtime(true),
                self.count,
            ),
        }
    }
}

fn dump_packets(
    mut source: impl PacketSource,
    parser: impl Parser,
    pipeline: PipelineConfig,
    count: usize,
) -> Result<()> {
    let ctx = RobotContext::default();
    let metrics = IngestMetrics::new();

    let mut received = 0;
    while received < count {
        let bytes = match source.receive() {
            Ok(bytes) => bytes,
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e.into()),
        };
        received += 1;

        match process_packet(&bytes, &parser, &ctx, &pipeline, &metrics) {
            Some(msg) => print_message(received, &msg),
            None => println!(
                "#{} 无法解码（{} 字节）: {}",
                received,
                bytes.len(),
                hex::encode(&bytes)
            ),
        }
    }

    let snapshot = metrics.snapshot();
    println!();
    println!("📊 统计:");
    println!("  总包数: {}", snapshot.packets_total);
    println!("  已解码: {}", snapshot.packets_decoded);
    println!("  类型不符: {}", snapshot.wrong_kind);
    println!("  不完整: {}", snapshot.incomplete);
    println!(
        "  损坏: {} ({:.1}%)",
        snapshot.malformed,
        snapshot.malformed_rate()
    );
    Ok(())
}

fn print_message(index: usize, msg: &WireMessage) {
    println!("#{} {:?}（{} 字节）", index, msg.kind(), msg.length);
    if let Some(q) = msg.q_actual() {
        println!("  q_actual:  {:.4?}", q);
    }
    if let Some(qd) = msg.qd_actual() {
        println!("  qd_actual: {:.4?}", qd);
    }
    if let Some(state) = msg.robot_state() {
        println!("  state: {:?}", state);
    }
    if let Some(version) = msg.as_robot_message().and_then(|m| m.version.as_ref()) {
        println!("  version: {} {}", version.project_name, version.firmware());
    }
}

