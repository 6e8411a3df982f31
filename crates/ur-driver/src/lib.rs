//! 驱动层模块
//!
//! 本模块负责与 UR 控制器的遥测连接，包括：
//! - 连接建立与固件版本探测
//! - 接收线程（实时端口 125Hz、主端口 10Hz）
//! - 共享状态（ArcSwap 无锁读取关节反馈，原子机器人状态）
//! - 状态变化通知与遥测存活监控
//!
//! # 使用场景
//!
//! 轨迹执行层（`ur-control`）从 [`RobotContext`] 读取关节位置与机器人状态；
//! 需要直接观察解码结果的工具可以单独使用 [`process_packet`]。

mod builder;
pub mod detect;
mod error;
pub mod heartbeat;
pub mod metrics;
pub mod pipeline;
mod robot;
pub mod state;
pub mod stream;

pub use builder::RobotDriverBuilder;
pub use detect::{detect_versions, resolve_versions};
pub use error::DriverError;
pub use heartbeat::LivenessMonitor;
pub use metrics::{IngestMetrics, IngestMetricsSnapshot};
pub use pipeline::{PipelineConfig, ingest_loop, process_packet};
pub use robot::RobotDriver;
pub use state::*;
pub use stream::{MAX_PACKET_SIZE, PacketSource, TcpPacketStream};
