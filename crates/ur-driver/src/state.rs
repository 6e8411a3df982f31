//! 共享机器人状态
//!
//! 接收线程是唯一的写入者，协调器与跟随器只读：
//!
//! - 关节位置/速度：`ArcSwapOption`，整份快照原子替换，读取无锁；
//! - 机器人状态：`AtomicU8`，未知状态用哨兵值表示；
//! - 存活监控：见 [`LivenessMonitor`]。
//!
//! 状态变化通过 [`StateNotifier`] 去重后通知监听者。

use crate::heartbeat::LivenessMonitor;
use arc_swap::ArcSwapOption;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, trace};
use ur_protocol::{JOINT_COUNT, ProtocolVersions, RobotState};

/// 关节反馈快照
#[derive(Debug, Clone, PartialEq)]
pub struct JointSnapshot {
    /// 实际关节位置（弧度）
    pub q_actual: [f64; JOINT_COUNT],
    /// 实际关节速度（弧度/秒）
    pub qd_actual: [f64; JOINT_COUNT],
    /// 控制器时间戳（秒），主端口快照不携带
    pub controller_time: Option<f64>,
    /// 写入时的系统时间戳（微秒）
    pub system_timestamp_us: u64,
}

impl JointSnapshot {
    /// 所有关节速度是否都低于阈值
    pub fn is_still(&self, threshold: f64) -> bool {
        self.qd_actual.iter().all(|v| v.abs() < threshold)
    }
}

fn system_timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

/// 机器人状态（原子版本，用于线程间共享）
///
/// 未收到任何状态时为“未定义”，`get()` 返回 `None`。
#[derive(Debug)]
pub struct AtomicRobotState {
    inner: AtomicU8,
}

impl AtomicRobotState {
    const UNDEFINED: u8 = u8::MAX;

    pub fn undefined() -> Self {
        Self {
            inner: AtomicU8::new(Self::UNDEFINED),
        }
    }

    pub fn get(&self, ordering: Ordering) -> Option<RobotState> {
        RobotState::from_u8(self.inner.load(ordering))
    }

    /// 写入新状态，返回旧状态
    pub fn swap(&self, state: RobotState, ordering: Ordering) -> Option<RobotState> {
        RobotState::from_u8(self.inner.swap(state.as_u8(), ordering))
    }

    /// 重置为未定义（连接断开时）
    pub fn clear(&self, ordering: Ordering) {
        self.inner.store(Self::UNDEFINED, ordering);
    }
}

impl Default for AtomicRobotState {
    fn default() -> Self {
        Self::undefined()
    }
}

/// 机器人状态变化监听者
///
/// 在接收线程上同步调用，实现必须尽快返回。
pub trait StateListener: Send + Sync {
    fn on_robot_state_change(&self, state: RobotState);
}

impl<F> StateListener for F
where
    F: Fn(RobotState) + Send + Sync,
{
    fn on_robot_state_change(&self, state: RobotState) {
        self(state)
    }
}

/// 把状态变化转发到通道（非阻塞，通道满时丢弃）
pub struct ChannelListener(pub Sender<RobotState>);

impl StateListener for ChannelListener {
    fn on_robot_state_change(&self, state: RobotState) {
        let _ = self.0.try_send(state);
    }
}

/// 状态变化通知器
#[derive(Default)]
pub struct StateNotifier {
    listeners: RwLock<Vec<Arc<dyn StateListener>>>,
}

impl StateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn StateListener>) {
        self.listeners.write().push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, state: RobotState) {
        for listener in self.listeners.read().iter() {
            listener.on_robot_state_change(state);
        }
    }
}

impl std::fmt::Debug for StateNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateNotifier")
            .field("listeners", &self.len())
            .finish()
    }
}

/// 共享机器人上下文
#[derive(Debug)]
pub struct RobotContext {
    joints: ArcSwapOption<JointSnapshot>,
    robot_state: AtomicRobotState,
    liveness: LivenessMonitor,
    notifier: StateNotifier,
    versions: ArcSwapOption<ProtocolVersions>,
}

impl RobotContext {
    /// # 参数
    /// - `telemetry_timeout`: 超过该时长没有反馈即视为遥测中断
    pub fn new(telemetry_timeout: Duration) -> Self {
        Self {
            joints: ArcSwapOption::empty(),
            robot_state: AtomicRobotState::undefined(),
            liveness: LivenessMonitor::new(telemetry_timeout),
            notifier: StateNotifier::new(),
            versions: ArcSwapOption::empty(),
        }
    }

    /// 写入新的关节反馈（接收线程调用）
    pub fn publish_joints(
        &self,
        q_actual: [f64; JOINT_COUNT],
        qd_actual: [f64; JOINT_COUNT],
        controller_time: Option<f64>,
    ) {
        self.joints.store(Some(Arc::new(JointSnapshot {
            q_actual,
            qd_actual,
            controller_time,
            system_timestamp_us: system_timestamp_us(),
        })));
        self.liveness.register_feedback();
    }

    /// 最近一次关节反馈
    pub fn joints(&self) -> Option<Arc<JointSnapshot>> {
        self.joints.load_full()
    }

    /// 当前机器人状态，未定义时为 `None`
    pub fn robot_state(&self) -> Option<RobotState> {
        self.robot_state.get(Ordering::Acquire)
    }

    /// 写入机器人状态；与上一次不同时通知监听者并返回 `true`
    pub fn update_robot_state(&self, state: RobotState) -> bool {
        let previous = self.robot_state.swap(state, Ordering::AcqRel);
        if previous == Some(state) {
            trace!("Robot state unchanged: {:?}", state);
            return false;
        }
        info!("Robot state changed: {:?} -> {:?}", previous, state);
        self.notifier.notify(state);
        true
    }

    /// 连接断开后清空状态
    pub fn invalidate(&self) {
        self.clear_robot_state();
        self.clear_joints();
    }

    /// 实时链路断开后清空关节反馈
    pub fn clear_joints(&self) {
        self.joints.store(None);
    }

    pub fn clear_robot_state(&self) {
        self.robot_state.clear(Ordering::Release);
    }

    /// 注册状态变化监听者
    pub fn add_state_listener(&self, listener: Arc<dyn StateListener>) {
        self.notifier.add_listener(listener);
    }

    pub fn register_feedback(&self) {
        self.liveness.register_feedback();
    }

    /// 遥测是否在超时窗口内
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn set_versions(&self, versions: ProtocolVersions) {
        self.versions.store(Some(Arc::new(versions)));
    }

    pub fn versions(&self) -> Option<Arc<ProtocolVersions>> {
        self.versions.load_full()
    }
}

impl Default for RobotContext {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_atomic_robot_state() {
        let state = AtomicRobotState::undefined();
        assert_eq!(state.get(Ordering::Relaxed), None);
        assert_eq!(state.swap(RobotState::Running, Ordering::Relaxed), None);
        assert_eq!(
            state.swap(RobotState::Error, Ordering::Relaxed),
            Some(RobotState::Running)
        );
        state.clear(Ordering::Relaxed);
        assert_eq!(state.get(Ordering::Relaxed), None);
    }

    #[test]
    fn test_update_robot_state_deduplicates() {
        let ctx = RobotContext::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        ctx.add_state_listener(Arc::new(move |_state: RobotState| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(ctx.update_robot_state(RobotState::Running));
        assert!(!ctx.update_robot_state(RobotState::Running));
        assert!(ctx.update_robot_state(RobotState::ProtectiveStopped));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.robot_state(), Some(RobotState::ProtectiveStopped));
    }

    #[test]
    fn test_channel_listener() {
        let ctx = RobotContext::default();
        let (tx, rx) = crossbeam_channel::bounded(4);
        ctx.add_state_listener(Arc::new(ChannelListener(tx)));
        ctx.update_robot_state(RobotState::EmergencyStopped);
        assert_eq!(rx.try_recv().unwrap(), RobotState::EmergencyStopped);
    }

    #[test]
    fn test_publish_joints_marks_alive() {
        let ctx = RobotContext::new(Duration::from_secs(1));
        assert!(!ctx.is_alive());
        assert!(ctx.joints().is_none());

        ctx.publish_joints([0.1; JOINT_COUNT], [0.0; JOINT_COUNT], Some(3.5));
        assert!(ctx.is_alive());
        let joints = ctx.joints().unwrap();
        assert_eq!(joints.q_actual, [0.1; JOINT_COUNT]);
        assert_eq!(joints.controller_time, Some(3.5));
        assert!(joints.is_still(0.01));
    }

    #[test]
    fn test_invalidate() {
        let ctx = RobotContext::default();
        ctx.publish_joints([0.0; JOINT_COUNT], [0.0; JOINT_COUNT], None);
        ctx.update_robot_state(RobotState::Running);
        ctx.invalidate();
        assert!(ctx.joints().is_none());
        assert_eq!(ctx.robot_state(), None);
    }
}
