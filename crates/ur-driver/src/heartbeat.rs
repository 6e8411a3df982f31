//! 遥测存活监控
//!
//! 记录最近一次收到机器人反馈的时间。时间基准是进程内单调时钟，
//! 不受系统时间调整影响，可以直接存放在 `AtomicU64` 中无锁读写。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 单调时钟锚点（首次访问时设置）
static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// 尚未收到任何反馈
const NEVER: u64 = u64::MAX;

/// 自锚点以来的微秒数
fn monotonic_micros() -> u64 {
    let anchor = CLOCK_ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_micros() as u64
}

/// 遥测存活监控
///
/// 与“连接建立即视为存活”不同，这里在收到第一条反馈之前始终报告不存活，
/// 这样协调器不会在没有任何状态数据时接受目标。
#[derive(Debug)]
pub struct LivenessMonitor {
    last_feedback_us: AtomicU64,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        // 先初始化锚点，保证后续时间戳都小于 NEVER
        let _ = monotonic_micros();
        Self {
            last_feedback_us: AtomicU64::new(NEVER),
            timeout,
        }
    }

    /// 存活判定超时
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 每处理一个有效包后调用
    pub fn register_feedback(&self) {
        self.last_feedback_us
            .store(monotonic_micros(), Ordering::Relaxed);
    }

    /// 是否收到过反馈
    pub fn has_feedback(&self) -> bool {
        self.last_feedback_us.load(Ordering::Relaxed) != NEVER
    }

    /// 距上次反馈的时长；从未收到时返回 `None`
    pub fn time_since_last_feedback(&self) -> Option<Duration> {
        let last = self.last_feedback_us.load(Ordering::Relaxed);
        if last == NEVER {
            return None;
        }
        Some(Duration::from_micros(monotonic_micros().saturating_sub(last)))
    }

    /// 超时窗口内是否收到过反馈
    pub fn is_alive(&self) -> bool {
        self.time_since_last_feedback()
            .is_some_and(|elapsed| elapsed < self.timeout)
    }
}
