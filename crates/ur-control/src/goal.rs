//! 目标与结果
//!
//! 每个目标恰好产生一个终态结果。被接受的目标先收到
//! [`GoalEvent::Accepted`]，之后收到一次 [`GoalEvent::Finished`]；
//! 被拒绝的目标只收到 `Finished(Rejected)`。

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// 目标编号（协调器内单调递增）
pub type GoalId = u64;

/// 目标中的一个轨迹点（关节顺序与 `Goal::joint_names` 一致）
#[derive(Debug, Clone, PartialEq)]
pub struct GoalPoint {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub time_from_start: Duration,
}

impl GoalPoint {
    pub fn new(positions: Vec<f64>, velocities: Vec<f64>, time_from_start: Duration) -> Self {
        Self {
            positions,
            velocities,
            time_from_start,
        }
    }
}

/// 关节轨迹目标
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Goal {
    pub joint_names: Vec<String>,
    pub points: Vec<GoalPoint>,
}

/// 结果码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResultCode {
    Successful = 0,
    InvalidGoal = -1,
    InvalidJoints = -2,
    Generic = -100,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// 终态结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalOutcome {
    Succeeded,
    Aborted { code: ResultCode, message: String },
    Canceled { message: String },
    Rejected { code: ResultCode, message: String },
}

impl GoalOutcome {
    pub fn code(&self) -> ResultCode {
        match self {
            GoalOutcome::Succeeded => ResultCode::Successful,
            GoalOutcome::Aborted { code, .. } | GoalOutcome::Rejected { code, .. } => *code,
            GoalOutcome::Canceled { .. } => ResultCode::Generic,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GoalOutcome::Succeeded => "",
            GoalOutcome::Aborted { message, .. }
            | GoalOutcome::Canceled { message }
            | GoalOutcome::Rejected { message, .. } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GoalOutcome::Succeeded)
    }
}

/// 目标状态事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalEvent {
    Accepted,
    Finished(GoalOutcome),
}

/// 目标发起方持有的句柄
#[derive(Debug)]
pub struct GoalHandle {
    id: GoalId,
    events: Receiver<GoalEvent>,
}

impl GoalHandle {
    pub fn id(&self) -> GoalId {
        self.id
    }

    /// 下一个事件（阻塞至超时）
    pub fn next_event(&self, timeout: Duration) -> Option<GoalEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// 等待终态结果，跳过 `Accepted`
    pub fn wait(&self, timeout: Duration) -> Option<GoalOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(GoalEvent::Finished(outcome)) => return Some(outcome),
                Ok(GoalEvent::Accepted) => continue,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// 协调器内部的结果发送端，保证终态只发送一次
#[derive(Debug)]
pub(crate) struct GoalResolver {
    id: GoalId,
    events: Sender<GoalEvent>,
    finished: AtomicBool,
}

impl GoalResolver {
    pub(crate) fn channel(id: GoalId) -> (Self, GoalHandle) {
        // Accepted + Finished
        let (tx, rx) = crossbeam_channel::bounded(2);
        (
            Self {
                id,
                events: tx,
                finished: AtomicBool::new(false),
            },
            GoalHandle { id, events: rx },
        )
    }

    pub(crate) fn id(&self) -> GoalId {
        self.id
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn accept(&self) {
        if !self.is_finished() {
            let _ = self.events.try_send(GoalEvent::Accepted);
        }
    }

    /// 发送终态；已有终态时返回 `false`
    pub(crate) fn finish(&self, outcome: GoalOutcome) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            debug!("Goal {} already finished, dropping {:?}", self.id, outcome);
            return false;
        }
        let _ = self.events.try_send(GoalEvent::Finished(outcome));
        true
    }

    pub(crate) fn abort(&self, code: ResultCode, message: impl Into<String>) -> bool {
        self.finish(GoalOutcome::Aborted {
            code,
            message: message.into(),
        })
    }
}

impl Drop for GoalResolver {
    fn drop(&mut self) {
        // 最后一个持有者释放时仍无终态：中断方未给出结果
        if !self.is_finished() {
            self.abort(ResultCode::Generic, "Trajectory interrupted");
        }
    }
}
