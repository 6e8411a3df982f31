//! 接收链路指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 接收线程指标
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// 收到的完整包数
    pub packets_total: AtomicU64,
    /// 成功解码的包数
    pub packets_decoded: AtomicU64,
    /// 标签不符、被跳过的包数
    pub wrong_kind: AtomicU64,
    /// 长度不完整的包数
    pub incomplete: AtomicU64,
    /// 标签匹配但内容损坏的包数
    pub malformed: AtomicU64,
    /// 读超时次数（无数据时的正常现象）
    pub read_timeouts: AtomicU64,
    /// 读错误次数
    pub read_errors: AtomicU64,
    /// 机器人状态变化次数
    pub state_changes: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestMetricsSnapshot {
        IngestMetricsSnapshot {
            packets_total: self.packets_total.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            wrong_kind: self.wrong_kind.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            state_changes: self.state_changes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.packets_total,
            &self.packets_decoded,
            &self.wrong_kind,
            &self.incomplete,
            &self.malformed,
            &self.read_timeouts,
            &self.read_errors,
            &self.state_changes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestMetricsSnapshot {
    pub packets_total: u64,
    pub packets_decoded: u64,
    pub wrong_kind: u64,
    pub incomplete: u64,
    pub malformed: u64,
    pub read_timeouts: u64,
    pub read_errors: u64,
    pub state_changes: u64,
}

impl IngestMetricsSnapshot {
    /// 损坏包占比（百分比），没有包时为 0
    pub fn malformed_rate(&self) -> f64 {
        if self.packets_total == 0 {
            return 0.0;
        }
        self.malformed as f64 / self.packets_total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = IngestMetrics::new();
        IngestMetrics::incr(&metrics.packets_total);
        IngestMetrics::incr(&metrics.packets_total);
        IngestMetrics::incr(&metrics.malformed);

        let snap = metrics.snapshot();
        assert_eq!(snap.packets_total, 2);
        assert_eq!(snap.malformed, 1);
        assert!((snap.malformed_rate() - 50.0).abs() < 1e-9);

        metrics.reset();
        assert_eq!(metrics.snapshot(), IngestMetricsSnapshot::default());
    }

    #[test]
    fn test_malformed_rate_empty() {
        assert_eq!(IngestMetricsSnapshot::default().malformed_rate(), 0.0);
    }
}
