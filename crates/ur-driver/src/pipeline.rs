//! 接收循环模块
//!
//! 负责后台线程的包接收、解析和共享状态更新。

use crate::error::DriverError;
use crate::metrics::IngestMetrics;
use crate::state::RobotContext;
use crate::stream::PacketSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, trace, warn};
use ur_protocol::{JointFeedback, ParseError, Parser, WireMessage};

/// 接收循环配置
///
/// 实时端口以 125Hz 提供关节反馈；主端口以 10Hz 提供机器人模式。
/// 两条链路同时运行时，由主端口负责机器人状态，实时端口只负责关节数据，
/// 避免两种推导方式交替写入导致状态抖动。
///
/// # Example
///
/// ```
/// use ur_driver::PipelineConfig;
///
/// let rt = PipelineConfig::realtime(true);
/// assert!(rt.update_joints);
/// assert!(rt.update_state);
///
/// let primary = PipelineConfig::primary();
/// assert!(!primary.update_joints);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 线程/日志名称
    pub name: &'static str,
    /// 是否写入关节位置/速度
    pub update_joints: bool,
    /// 是否写入机器人状态（并触发状态变化通知）
    pub update_state: bool,
}

impl PipelineConfig {
    /// 实时端口链路；`owns_state` 为 false 时不写机器人状态
    pub fn realtime(owns_state: bool) -> Self {
        Self {
            name: "realtime",
            update_joints: true,
            update_state: owns_state,
        }
    }

    /// 主端口链路
    pub fn primary() -> Self {
        Self {
            name: "primary",
            update_joints: false,
            update_state: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::realtime(true)
    }
}

/// 处理一个完整的包
///
/// 解码成功时更新共享状态并返回消息；解析未产生消息时按原因计数并返回 `None`。
pub fn process_packet(
    bytes: &[u8],
    parser: &impl Parser,
    ctx: &RobotContext,
    config: &PipelineConfig,
    metrics: &IngestMetrics,
) -> Option<WireMessage> {
    IngestMetrics::incr(&metrics.packets_total);

    let msg = match parser.parse_bytes(bytes) {
        Ok(msg) => msg,
        Err(e) => {
            match &e {
                ParseError::UnexpectedKind { .. } => IngestMetrics::incr(&metrics.wrong_kind),
                ParseError::Incomplete { .. } => IngestMetrics::incr(&metrics.incomplete),
                ParseError::Decode { .. } => {
                    IngestMetrics::incr(&metrics.malformed);
                    debug!(
                        "{}: malformed packet ({} bytes): {}",
                        config.name,
                        bytes.len(),
                        hex::encode(bytes)
                    );
                },
            }
            return None;
        },
    };

    IngestMetrics::incr(&metrics.packets_decoded);
    ctx.register_feedback();

    if config.update_joints
        && let (Some(q), Some(qd)) = (msg.q_actual(), msg.qd_actual())
    {
        let controller_time = msg.as_realtime().map(|s| s.time());
        ctx.publish_joints(q, qd, controller_time);
    }

    if config.update_state
        && let Some(state) = msg.robot_state()
        && ctx.update_robot_state(state)
    {
        IngestMetrics::incr(&metrics.state_changes);
    }

    Some(msg)
}

/// 接收线程主循环
///
/// # 参数
/// - `source`: 包来源（会在循环中独占）
/// - `parser`: 该链路的解析策略（版本已在连接时确定）
/// - `ctx`: 共享状态上下文
/// - `config`: 链路配置
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `metrics`: 链路指标
pub fn ingest_loop(
    mut source: impl PacketSource,
    parser: impl Parser,
    ctx: Arc<RobotContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<IngestMetrics>,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => info!("{} ingest thread priority set to MAX (realtime)", config.name),
            Err(e) => warn!(
                "Failed to set {} ingest thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                config.name, e
            ),
        }
    }

    info!("{} ingest thread started", config.name);

    loop {
        // Acquire: 看到 false 时必须能看到其他线程的清理写入
        if !is_running.load(Ordering::Acquire) {
            trace!("{} ingest thread: is_running flag is false, exiting", config.name);
            break;
        }

        let bytes = match source.receive() {
            Ok(bytes) => bytes,
            Err(DriverError::Timeout) => {
                IngestMetrics::incr(&metrics.read_timeouts);
                continue;
            },
            Err(e) => {
                IngestMetrics::incr(&metrics.read_errors);
                if e.is_fatal() {
                    error!("{} ingest thread: fatal receive error: {}", config.name, e);
                    // 只清空本链路写入的部分
                    if config.update_joints {
                        ctx.clear_joints();
                    }
                    if config.update_state {
                        ctx.clear_robot_state();
                    }
                    is_running.store(false, Ordering::Release);
                    break;
                }
                warn!("{} ingest thread: receive error: {}", config.name, e);
                continue;
            },
        };

        process_packet(&bytes, &parser, &ctx, &config, &metrics);
    }

    info!("{} ingest thread exited", config.name);
}
