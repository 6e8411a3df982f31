//! 挂起处理策略
//!
//! 跟随器报告挂起后，协调器先中止目标，再把决定交给 [`HangHandler`]。
//! 进程退出后由外部守护（systemd、容器编排等）负责重启驱动。

use crate::error::FollowerError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// 挂起处理策略
pub trait HangHandler: Send + Sync {
    fn on_hang(&self, error: &FollowerError);
}

/// 等待一小段时间后退出进程
#[derive(Debug, Clone)]
pub struct ExitOnHang {
    /// 退出前等待（让结果先送达目标发起方）
    pub delay: Duration,
    pub exit_code: i32,
}

impl Default for ExitOnHang {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(250),
            exit_code: 0,
        }
    }
}

impl HangHandler for ExitOnHang {
    fn on_hang(&self, cause: &FollowerError) {
        error!(
            "Robot has hung ({}). Preparing to kill the robot driver. \
             The driver can recover if it is configured to respawn automatically.",
            cause
        );
        std::thread::sleep(self.delay);
        std::process::exit(self.exit_code);
    }
}

/// 只记录日志，驱动继续运行
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnly;

impl HangHandler for LogOnly {
    fn on_hang(&self, cause: &FollowerError) {
        warn!("Robot has hung ({}), waiting for the control program to reconnect", cause);
    }
}

/// 按配置选择策略
pub fn hang_handler(kill_on_hang: bool, delay: Duration) -> Arc<dyn HangHandler> {
    if kill_on_hang {
        Arc::new(ExitOnHang {
            delay,
            ..Default::default()
        })
    } else {
        Arc::new(LogOnly)
    }
}
