//! 控制层模块
//!
//! 本模块负责轨迹执行，包括：
//! - 轨迹插值（平滑模式的三次 Hermite，定时模式的速度/加速度受限规划）
//! - 反向连接与 8ms 控制周期的伺服指令流（[`TrajectoryFollower`]）
//! - 目标校验、打断、到位监控与安全停止（[`GoalCoordinator`]）
//! - 挂起处理策略与驱动配置
//!
//! # 使用场景
//!
//! 遥测由 `ur-driver` 写入 [`ur_driver::RobotContext`]；本模块只读取它，
//! 并通过状态监听接收安全停止通知。

pub mod config;
pub mod coordinator;
mod error;
pub mod follower;
pub mod goal;
pub mod hang;
pub mod server;
pub mod trajectory;

pub use config::{DEFAULT_JOINT_NAMES, DriverConfig};
pub use coordinator::{CoordinatorConfig, GoalCoordinator};
pub use error::{ConfigError, CoordinatorError, FollowerError};
pub use follower::{
    FollowerConfig, FollowerState, StreamOutcome, TrajectoryExecutor, TrajectoryFollower,
};
pub use goal::{Goal, GoalEvent, GoalHandle, GoalId, GoalOutcome, GoalPoint, ResultCode};
pub use hang::{ExitOnHang, HangHandler, LogOnly, hang_handler};
pub use server::ReverseServer;
pub use trajectory::{
    AxisProfile, Sample, SmoothProfile, TimedProfile, TrajectoryPoint, TrajectoryProfile,
    compute_velocity_and_accel, interpolate, total_duration,
};
