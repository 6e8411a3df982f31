//! 目标协调器
//!
//! 每个目标的状态：`Received → Validated → Executing → {Succeeded, Aborted, Canceled, Rejected}`。
//!
//! # 线程模型
//!
//! - 提交线程：校验、打断旧目标、安装新目标（[`GoalCoordinator::submit`]）；
//! - 轨迹线程：等待唤醒，执行 重排 → 补起点 → 流式发送 → 到位监控；
//! - 接收线程：通过 [`StateListener`] 回调触发安全停止，只写原子标志，不等锁。
//!
//! # 锁
//!
//! - `exec`：执行临界区，轨迹线程在整个执行期间持有；打断方获取它以等待执行结束；
//! - `pending` + `wake`：待执行目标与唤醒信号；
//! - `current`：当前目标（已安装但尚未结束），只做短暂持有。
//!
//! 获取顺序固定为 `exec → current` 与 `exec → pending`，不会反向获取。

use crate::error::CoordinatorError;
use crate::follower::{StreamOutcome, TrajectoryExecutor};
use crate::goal::{Goal, GoalHandle, GoalId, GoalOutcome, GoalResolver, ResultCode};
use crate::hang::HangHandler;
use crate::trajectory::{TrajectoryPoint, total_duration};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use ur_driver::{RobotContext, StateListener};
use ur_protocol::{JOINT_COUNT, RobotState};

/// 轨迹线程等待新目标的最长时间（之后重新检查运行标志）
const WAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// 协调器配置
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// 规范关节顺序（带前缀）
    pub joint_names: Vec<String>,
    /// 目标速度上限（弧度/秒）
    pub max_velocity: f64,
    pub use_smooth_trajectory: bool,
    /// 到位容差（弧度）
    pub goal_tolerance: f64,
    /// 静止判定阈值（弧度/秒）
    pub motion_threshold: f64,
    pub timeout_factor: f64,
    pub grace_factor: f64,
    pub monitor_interval: Duration,
    /// 打断旧目标后、执行新目标前的等待
    pub settle_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        crate::config::DriverConfig::default().coordinator_config()
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        let invalid = |msg: String| Err(CoordinatorError::InvalidConfig(msg));

        if self.joint_names.len() != JOINT_COUNT {
            return invalid(format!(
                "expected {} joint names, got {}",
                JOINT_COUNT,
                self.joint_names.len()
            ));
        }
        let unique: HashSet<&String> = self.joint_names.iter().collect();
        if unique.len() != self.joint_names.len() {
            return invalid("joint names must be unique".to_string());
        }
        if !(self.max_velocity.is_finite() && self.max_velocity > 0.0) {
            return invalid(format!("max_velocity must be positive, got {}", self.max_velocity));
        }
        if self.monitor_interval.is_zero() {
            return invalid("monitor_interval must be positive".to_string());
        }
        Ok(())
    }
}

/// 已校验、已重排为规范关节顺序的目标
struct PendingGoal {
    resolver: Arc<GoalResolver>,
    points: Vec<TrajectoryPoint>,
}

struct Inner {
    config: CoordinatorConfig,
    ctx: Arc<RobotContext>,
    executor: Arc<dyn TrajectoryExecutor>,
    hang_handler: Arc<dyn HangHandler>,

    exec: Mutex<()>,
    pending: Mutex<Option<PendingGoal>>,
    wake: Condvar,
    current: Mutex<Option<Arc<GoalResolver>>>,

    /// 当前目标的中断请求
    interrupt: AtomicBool,
    /// 是否有已安装且未结束的目标（安全停止路径无锁读取）
    has_goal: AtomicBool,
    running: AtomicBool,
    next_id: AtomicU64,
}

/// 目标协调器
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use ur_control::{
///     CoordinatorConfig, FollowerConfig, GoalCoordinator, LogOnly, TrajectoryFollower,
/// };
/// use ur_driver::RobotContext;
///
/// let ctx = Arc::new(RobotContext::new(Duration::from_secs(1)));
/// let follower = Arc::new(TrajectoryFollower::bind(FollowerConfig::default())?);
/// let coordinator =
///     GoalCoordinator::start(CoordinatorConfig::default(), ctx, follower, Arc::new(LogOnly))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GoalCoordinator {
    inner: Arc<Inner>,
    thread: Option<JoinHandle<()>>,
}

impl GoalCoordinator {
    /// 启动轨迹线程，并在 `ctx` 上注册安全停止监听
    pub fn start(
        config: CoordinatorConfig,
        ctx: Arc<RobotContext>,
        executor: Arc<dyn TrajectoryExecutor>,
        hang_handler: Arc<dyn HangHandler>,
    ) -> Result<Self, CoordinatorError> {
        config.validate()?;

        let inner = Arc::new(Inner {
            config,
            ctx,
            executor,
            hang_handler,
            exec: Mutex::new(()),
            pending: Mutex::new(None),
            wake: Condvar::new(),
            current: Mutex::new(None),
            interrupt: AtomicBool::new(false),
            has_goal: AtomicBool::new(false),
            running: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        });

        inner.ctx.add_state_listener(Arc::new(SafetyStopListener {
            inner: Arc::downgrade(&inner),
        }));

        let thread_inner = inner.clone();
        let thread = std::thread::Builder::new()
            .name("ur-trajectory".into())
            .spawn(move || thread_inner.trajectory_loop())?;

        info!("Goal coordinator started");
        Ok(Self {
            inner,
            thread: Some(thread),
        })
    }

    /// 提交目标
    ///
    /// 校验失败立即返回带 `Rejected` 结果的句柄；否则打断正在执行的目标，
    /// 安装新目标并唤醒轨迹线程。
    pub fn submit(&self, goal: Goal) -> GoalHandle {
        self.inner.on_goal(goal)
    }

    /// 取消目标，编号不是当前目标时不做任何事
    ///
    /// 返回是否由本次调用给出了 `Canceled` 结果。
    pub fn cancel(&self, id: GoalId) -> bool {
        self.inner.on_cancel(id)
    }

    /// 机器人状态变化通知（通常由接收线程经监听器调用）
    pub fn on_robot_state_change(&self, state: RobotState) {
        self.inner.on_robot_state_change(state)
    }

    /// 当前目标编号（等待执行或执行中）
    pub fn current_goal(&self) -> Option<GoalId> {
        self.inner.current.lock().as_ref().map(|goal| goal.id())
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// 停止轨迹线程；正在执行的目标被中断
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Release: 与轨迹线程中的 Acquire 配对
        self.inner.running.store(false, Ordering::Release);
        self.inner.interrupt.store(true, Ordering::Release);
        self.inner.executor.interrupt();
        self.inner.wake.notify_all();

        if thread.join().is_err() {
            error!("Trajectory thread panicked");
        }
        if let Some(pending) = self.inner.pending.lock().take() {
            pending
                .resolver
                .abort(ResultCode::Generic, "Goal coordinator shut down");
        }
        if let Some(current) = self.inner.current.lock().take() {
            current.abort(ResultCode::Generic, "Goal coordinator shut down");
        }
        self.inner.has_goal.store(false, Ordering::Release);
        info!("Goal coordinator stopped");
    }
}

impl Drop for GoalCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 安全停止监听器
///
/// 持有弱引用，协调器释放后自动失效。
struct SafetyStopListener {
    inner: Weak<Inner>,
}

impl StateListener for SafetyStopListener {
    fn on_robot_state_change(&self, state: RobotState) {
        if let Some(inner) = self.inner.upgrade() {
            inner.on_robot_state_change(state);
        }
    }
}

impl Inner {
    fn on_goal(&self, goal: Goal) -> GoalHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (resolver, handle) = GoalResolver::channel(id);

        let points = match self.validate(&goal) {
            Ok(points) => points,
            Err((code, message)) => {
                warn!("Goal {} rejected: {}", id, message);
                resolver.finish(GoalOutcome::Rejected { code, message });
                return handle;
            },
        };
        let resolver = Arc::new(resolver);

        // 先打断旧目标，再等它退出执行临界区
        let superseded = self.interrupt_current("Received another trajectory");
        let _exec = self.exec.lock();
        if superseded {
            std::thread::sleep(self.config.settle_delay);
        }

        // 并发提交时，等锁期间可能又有目标被安装
        if let Some(previous) = self.current.lock().replace(resolver.clone()) {
            previous.abort(ResultCode::Generic, "Received another trajectory");
        }
        self.interrupt.store(false, Ordering::Release);
        self.has_goal.store(true, Ordering::Release);
        *self.pending.lock() = Some(PendingGoal { resolver, points });
        self.wake.notify_one();

        debug!("Goal {} validated and queued", id);
        handle
    }

    /// 中断当前目标并给出 Aborted 结果；没有当前目标时返回 `false`
    fn interrupt_current(&self, reason: &str) -> bool {
        let current = {
            let current = self.current.lock();
            let Some(goal) = current.clone() else {
                return false;
            };
            self.interrupt.store(true, Ordering::Release);
            self.executor.interrupt();
            goal
        };
        if current.abort(ResultCode::Generic, reason) {
            info!("Goal {} aborted: {}", current.id(), reason);
        }
        true
    }

    fn on_cancel(&self, id: GoalId) -> bool {
        // 持有 current 锁置位中断，避免误打断期间新安装的目标
        let current = {
            let current = self.current.lock();
            let Some(goal) = current.as_ref().filter(|goal| goal.id() == id).cloned() else {
                debug!("Cancel request for goal {} ignored, not the current goal", id);
                return false;
            };
            self.interrupt.store(true, Ordering::Release);
            self.executor.interrupt();
            goal
        };

        // 等待执行临界区释放
        let _exec = self.exec.lock();

        warn!(
            "Trajectory has been canceled by client. Trajectory execution may have timed out. \
             Check to make sure that the speed slider is set to 100% on the pendant."
        );
        let canceled = current.finish(GoalOutcome::Canceled {
            message: "Goal cancelled by client".to_string(),
        });
        self.release(&current);
        canceled
    }

    fn on_robot_state_change(&self, state: RobotState) {
        if state == RobotState::Running {
            return;
        }
        // Acquire: 与安装目标时的 Release 配对
        if !self.has_goal.load(Ordering::Acquire) || self.interrupt.load(Ordering::Acquire) {
            return;
        }
        if self.interrupt.swap(true, Ordering::AcqRel) {
            return;
        }
        self.executor.interrupt();

        if let Some(current) = self.current.lock().clone()
            && current.abort(ResultCode::Generic, "Robot safety stop")
        {
            warn!("Goal {} aborted: robot safety stop ({:?})", current.id(), state);
        }
    }

    /// 按顺序校验：机器人状态 → 关节名 → 轨迹点；成功时返回规范顺序的轨迹点
    fn validate(&self, goal: &Goal) -> Result<Vec<TrajectoryPoint>, (ResultCode, String)> {
        self.validate_state()
            .map_err(|message| (ResultCode::Generic, message.to_string()))?;
        let permutation = self
            .joint_permutation(&goal.joint_names)
            .map_err(|message| (ResultCode::InvalidJoints, message))?;
        self.validate_points(goal, permutation)
            .map_err(|message| (ResultCode::InvalidGoal, message))
    }

    fn validate_state(&self) -> Result<(), &'static str> {
        if !self.ctx.is_alive() {
            return Err("Undefined state");
        }
        match self.ctx.robot_state() {
            Some(RobotState::Running) => Ok(()),
            Some(RobotState::EmergencyStopped) => Err("Robot is emergency stopped"),
            Some(RobotState::ProtectiveStopped) => Err("Robot is protective stopped"),
            Some(RobotState::Error) => Err("Robot is not ready, check robot_mode"),
            None => Err("Undefined state"),
        }
    }

    /// `permutation[k]` 为规范第 k 个关节在目标数组中的下标
    fn joint_permutation(&self, names: &[String]) -> Result<[usize; JOINT_COUNT], String> {
        let canonical = &self.config.joint_names;
        let index: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mismatch = || {
            format!(
                "Invalid joint names for goal\nExpected: {}\nFound: {}",
                canonical.join(", "),
                names.join(", ")
            )
        };
        if names.len() != canonical.len() || index.len() != names.len() {
            return Err(mismatch());
        }

        let mut permutation = [0usize; JOINT_COUNT];
        for (slot, name) in permutation.iter_mut().zip(canonical) {
            *slot = *index.get(name.as_str()).ok_or_else(mismatch)?;
        }
        Ok(permutation)
    }

    fn validate_points(
        &self,
        goal: &Goal,
        permutation: [usize; JOINT_COUNT],
    ) -> Result<Vec<TrajectoryPoint>, String> {
        if goal.points.is_empty() {
            return Err("Received a goal with no trajectory points".to_string());
        }

        let max_velocity = self.config.max_velocity;
        let mut previous = Duration::ZERO;
        let mut points = Vec::with_capacity(goal.points.len() + 1);

        for point in &goal.points {
            if point.velocities.len() != JOINT_COUNT {
                return Err("Received a goal with an invalid number of velocities".to_string());
            }
            if point.positions.len() != JOINT_COUNT {
                return Err("Received a goal with an invalid number of positions".to_string());
            }
            for velocity in &point.velocities {
                if !velocity.is_finite() {
                    return Err("Received a goal with infinities or NaNs in velocity".to_string());
                }
                if velocity.abs() > max_velocity {
                    return Err(format!(
                        "Received a goal with velocities that are higher than max_velocity_ {}",
                        max_velocity
                    ));
                }
            }
            if point.positions.iter().any(|p| !p.is_finite()) {
                return Err("Received a goal with infinities or NaNs in positions".to_string());
            }
            if point.time_from_start < previous {
                return Err("Received a goal with decreasing time_from_start".to_string());
            }
            previous = point.time_from_start;

            points.push(TrajectoryPoint::new(
                permutation.map(|i| point.positions[i]),
                permutation.map(|i| point.velocities[i]),
                point.time_from_start,
            ));
        }
        Ok(points)
    }

    /// 当前目标结束后清理（只清理自己，不影响已安装的新目标）
    fn release(&self, resolver: &Arc<GoalResolver>) {
        let mut current = self.current.lock();
        if current
            .as_ref()
            .is_some_and(|goal| Arc::ptr_eq(goal, resolver))
        {
            *current = None;
            self.has_goal.store(false, Ordering::Release);
        }
    }

    fn trajectory_loop(&self) {
        #[cfg(feature = "realtime")]
        {
            use thread_priority::*;

            match set_current_thread_priority(ThreadPriority::Max) {
                Ok(_) => info!("Trajectory thread priority set to MAX (realtime)"),
                Err(e) => warn!(
                    "Failed to set trajectory thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                ),
            }
        }

        debug!("Trajectory thread started");
        loop {
            // Acquire: 看到 false 时必须能看到 shutdown 之前的写入
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            let job = {
                let mut pending = self.pending.lock();
                if pending.is_none() {
                    self.wake.wait_for(&mut pending, WAKE_TIMEOUT);
                }
                pending.take()
            };
            let Some(job) = job else {
                continue;
            };

            let _exec = self.exec.lock();
            if job.resolver.is_finished() {
                debug!("Goal {} finished before execution started", job.resolver.id());
            } else {
                self.execute(&job);
            }
            if !self.running.load(Ordering::Acquire) {
                job.resolver
                    .abort(ResultCode::Generic, "Goal coordinator shut down");
            }
            self.release(&job.resolver);
        }
        debug!("Trajectory thread exiting");
    }

    fn execute(&self, job: &PendingGoal) {
        let resolver = &job.resolver;
        resolver.accept();
        info!("Executing goal {}", resolver.id());

        let points = match self.with_start_point(&job.points) {
            Some(points) => points,
            None => {
                resolver.abort(
                    ResultCode::Generic,
                    "No joint feedback available to start the trajectory",
                );
                return;
            },
        };

        // start() 清除跟随器的中断标志，之后才检查本目标是否已被打断
        if let Err(e) = self.executor.start() {
            error!("Failed to start trajectory follower: {}", e);
            resolver.abort(
                ResultCode::Generic,
                format!("Failed to connect to the robot control program: {}", e),
            );
            return;
        }
        if self.interrupt.load(Ordering::Acquire) {
            debug!("Goal {} interrupted before streaming", resolver.id());
            self.stop_follower();
            return;
        }

        // 超时预算从开始下发计时，而非从开始监控计时
        let exec_start = Instant::now();
        let streamed = if self.config.use_smooth_trajectory {
            self.executor.start_smooth_trajectory(&points)
        } else {
            self.executor.start_timed_trajectory(&points)
        };

        match streamed {
            Ok(StreamOutcome::Completed) => {
                if self.config.use_smooth_trajectory {
                    self.monitor_completion(resolver, &points, exec_start);
                } else if !self.interrupt.load(Ordering::Acquire)
                    && resolver.finish(GoalOutcome::Succeeded)
                {
                    info!("Trajectory executed successfully");
                }
                self.stop_follower();
            },
            Ok(StreamOutcome::Interrupted) => {
                debug!("Goal {} interrupted during streaming", resolver.id());
                self.stop_follower();
            },
            Err(e) if e.is_hang() => {
                warn!("Robot has hung.");
                resolver.abort(ResultCode::Generic, format!("Robot has hung. {}", e));
                self.stop_follower();
                self.hang_handler.on_hang(&e);
            },
            Err(e) => {
                error!("Trajectory could not be executed: {}", e);
                resolver.abort(
                    ResultCode::Generic,
                    format!("Trajectory could not be executed: {}", e),
                );
                self.stop_follower();
            },
        }
    }

    /// 第一个点不在 t=0 时，以当前实际位置/速度补一个起点
    fn with_start_point(&self, points: &[TrajectoryPoint]) -> Option<Vec<TrajectoryPoint>> {
        let needs_start = points
            .first()
            .is_some_and(|first| first.time_from_start > Duration::ZERO);
        if !needs_start {
            return Some(points.to_vec());
        }

        let joints = self.ctx.joints()?;
        info!("Trajectory without t0 received, inserting t0 at current position");
        let mut full = Vec::with_capacity(points.len() + 1);
        full.push(TrajectoryPoint::new(
            joints.q_actual,
            joints.qd_actual,
            Duration::ZERO,
        ));
        full.extend_from_slice(points);
        Some(full)
    }

    /// 平滑模式：等待到位且静止，或超时，或被打断
    ///
    /// 宽限期与超时都以 `exec_start`（开始下发轨迹的时刻）为起点。
    fn monitor_completion(
        &self,
        resolver: &GoalResolver,
        points: &[TrajectoryPoint],
        exec_start: Instant,
    ) {
        let duration = total_duration(points);
        let grace_end = exec_start + duration.mul_f64(self.config.grace_factor);
        let deadline = exec_start + duration.mul_f64(self.config.timeout_factor);
        let interval = self.config.monitor_interval;
        let Some(target) = points.last().map(|point| point.positions) else {
            return;
        };

        // 宽限期内也响应中断
        while Instant::now() < grace_end {
            if self.interrupt.load(Ordering::Acquire) {
                return;
            }
            std::thread::sleep(interval);
        }

        loop {
            if self.interrupt.load(Ordering::Acquire) {
                debug!("Goal {} interrupted while waiting for completion", resolver.id());
                return;
            }
            if self.reached(&target) {
                if resolver.finish(GoalOutcome::Succeeded) {
                    info!("Trajectory executed successfully");
                }
                return;
            }
            if Instant::now() >= deadline {
                error!("Trajectory timed out or failed to reach goal!");
                resolver.abort(
                    ResultCode::Generic,
                    "Robot motion timed out or failed to reach goal.",
                );
                return;
            }
            std::thread::sleep(interval);
        }
    }

    fn reached(&self, target: &[f64; JOINT_COUNT]) -> bool {
        let Some(joints) = self.ctx.joints() else {
            return false;
        };
        let in_position = joints
            .q_actual
            .iter()
            .zip(target)
            .all(|(actual, goal)| (actual - goal).abs() < self.config.goal_tolerance);
        let still = joints.is_still(self.config.motion_threshold);
        trace!("In position: {}, still: {}", in_position, still);
        in_position && still
    }

    fn stop_follower(&self) {
        if let Err(e) = self.executor.stop() {
            warn!("Failed to stop trajectory follower: {}", e);
        }
    }
}

impl std::fmt::Debug for GoalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalCoordinator")
            .field("current_goal", &self.current_goal())
            .field("running", &self.inner.running.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FollowerError;
    use crate::goal::GoalPoint;

    struct NullExecutor;

    impl TrajectoryExecutor for NullExecutor {
        fn start(&self) -> Result<(), FollowerError> {
            Ok(())
        }

        fn start_smooth_trajectory(
            &self,
            _points: &[TrajectoryPoint],
        ) -> Result<StreamOutcome, FollowerError> {
            Ok(StreamOutcome::Completed)
        }

        fn start_timed_trajectory(
            &self,
            _points: &[TrajectoryPoint],
        ) -> Result<StreamOutcome, FollowerError> {
            Ok(StreamOutcome::Completed)
        }

        fn interrupt(&self) {}

        fn stop(&self) -> Result<(), FollowerError> {
            Ok(())
        }
    }

    fn inner(config: CoordinatorConfig) -> Inner {
        Inner {
            config,
            ctx: Arc::new(RobotContext::default()),
            executor: Arc::new(NullExecutor),
            hang_handler: Arc::new(crate::hang::LogOnly),
            exec: Mutex::new(()),
            pending: Mutex::new(None),
            wake: Condvar::new(),
            current: Mutex::new(None),
            interrupt: AtomicBool::new(false),
            has_goal: AtomicBool::new(false),
            running: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }

    fn names(order: [usize; JOINT_COUNT]) -> Vec<String> {
        let canonical = CoordinatorConfig::default().joint_names;
        order.iter().map(|&i| canonical[i].clone()).collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        CoordinatorConfig::default().validate().unwrap();
        let duplicate = CoordinatorConfig {
            joint_names: vec!["a".to_string(); JOINT_COUNT],
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_reorders_into_canonical_order() {
        let inner = inner(CoordinatorConfig::default());
        // 目标按倒序给出关节
        let goal = Goal {
            joint_names: names([5, 4, 3, 2, 1, 0]),
            points: vec![GoalPoint::new(
                vec![5.0, 4.0, 3.0, 2.0, 1.0, 0.0],
                vec![0.5, 0.4, 0.3, 0.2, 0.1, 0.0],
                Duration::from_secs(1),
            )],
        };
        let permutation = inner.joint_permutation(&goal.joint_names).unwrap();
        let points = inner.validate_points(&goal, permutation).unwrap();
        assert_eq!(points[0].positions, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(points[0].velocities, [0.0, 0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_non_cyclic_permutation() {
        let inner = inner(CoordinatorConfig::default());
        let goal_names = names([1, 2, 0, 3, 4, 5]);
        let permutation = inner.joint_permutation(&goal_names).unwrap();
        // 规范第 0 个关节在目标中的下标为 2
        assert_eq!(permutation, [2, 0, 1, 3, 4, 5]);
    }

    #[test]
    fn test_joint_name_mismatch() {
        let inner = inner(CoordinatorConfig::default());
        let mut goal_names = names([0, 1, 2, 3, 4, 5]);
        goal_names[2] = "unknown_joint".to_string();
        let err = inner.joint_permutation(&goal_names).unwrap_err();
        assert!(err.starts_with("Invalid joint names for goal\nExpected: "));

        let mut repeated = names([0, 1, 2, 3, 4, 5]);
        repeated[5] = repeated[0].clone();
        assert!(inner.joint_permutation(&repeated).is_err());
        assert!(inner.joint_permutation(&names([0, 1, 2, 3, 4, 5])[..5]).is_err());
    }

    #[test]
    fn test_point_validation_messages() {
        let inner = inner(CoordinatorConfig::default());
        let permutation = [0, 1, 2, 3, 4, 5];
        let goal_with = |positions: Vec<f64>, velocities: Vec<f64>| Goal {
            joint_names: names(permutation),
            points: vec![GoalPoint::new(positions, velocities, Duration::ZERO)],
        };

        let cases = [
            (
                goal_with(vec![0.0; 6], vec![0.0; 5]),
                "Received a goal with an invalid number of velocities",
            ),
            (
                goal_with(vec![0.0; 7], vec![0.0; 6]),
                "Received a goal with an invalid number of positions",
            ),
            (
                goal_with(vec![0.0; 6], vec![0.0, f64::NAN, 0.0, 0.0, 0.0, 0.0]),
                "Received a goal with infinities or NaNs in velocity",
            ),
            (
                goal_with(vec![f64::INFINITY, 0.0, 0.0, 0.0, 0.0, 0.0], vec![0.0; 6]),
                "Received a goal with infinities or NaNs in positions",
            ),
            (
                goal_with(vec![0.0; 6], vec![0.0, 0.0, 11.0, 0.0, 0.0, 0.0]),
                "Received a goal with velocities that are higher than max_velocity_ 10",
            ),
        ];
        for (goal, expected) in cases {
            assert_eq!(inner.validate_points(&goal, permutation).unwrap_err(), expected);
        }

        let empty = Goal {
            joint_names: names(permutation),
            points: Vec::new(),
        };
        assert!(inner.validate_points(&empty, permutation).is_err());
    }

    #[test]
    fn test_decreasing_time_rejected() {
        let inner = inner(CoordinatorConfig::default());
        let permutation = [0, 1, 2, 3, 4, 5];
        let goal = Goal {
            joint_names: names(permutation),
            points: vec![
                GoalPoint::new(vec![0.0; 6], vec![0.0; 6], Duration::from_secs(2)),
                GoalPoint::new(vec![0.0; 6], vec![0.0; 6], Duration::from_secs(1)),
            ],
        };
        assert!(inner.validate_points(&goal, permutation).is_err());
    }

    #[test]
    fn test_state_check_without_telemetry() {
        let inner = inner(CoordinatorConfig::default());
        assert_eq!(inner.validate_state(), Err("Undefined state"));

        inner.ctx.publish_joints([0.0; 6], [0.0; 6], None);
        assert_eq!(inner.validate_state(), Err("Undefined state"));
        inner.ctx.update_robot_state(RobotState::ProtectiveStopped);
        assert_eq!(inner.validate_state(), Err("Robot is protective stopped"));
        inner.ctx.update_robot_state(RobotState::Running);
        assert_eq!(inner.validate_state(), Ok(()));
    }

    #[test]
    fn test_cancel_only_interrupts_matching_goal() {
        let inner = inner(CoordinatorConfig::default());
        let (resolver, handle) = GoalResolver::channel(7);
        let resolver = Arc::new(resolver);
        *inner.current.lock() = Some(resolver.clone());
        inner.has_goal.store(true, Ordering::Release);

        // 旧目标的取消请求晚于新目标安装到达
        assert!(!inner.on_cancel(6));
        assert!(!inner.interrupt.load(Ordering::Acquire));
        assert!(!resolver.is_finished());
        assert_eq!(handle.wait(Duration::ZERO), None);

        assert!(inner.on_cancel(7));
        assert!(inner.interrupt.load(Ordering::Acquire));
        assert_eq!(
            handle.wait(Duration::ZERO),
            Some(GoalOutcome::Canceled {
                message: "Goal cancelled by client".to_string(),
            })
        );
        assert!(inner.current.lock().is_none());
        assert!(!inner.has_goal.load(Ordering::Acquire));
    }

    #[test]
    fn test_start_point_synthesized_from_feedback() {
        let inner = inner(CoordinatorConfig::default());
        let points = vec![TrajectoryPoint::new([1.0; 6], [0.0; 6], Duration::from_secs(1))];
        assert!(inner.with_start_point(&points).is_none());

        inner.ctx.publish_joints([0.2; 6], [0.01; 6], None);
        let full = inner.with_start_point(&points).unwrap();
        assert_eq!(full.len(), 2);
        assert_eq!(full[0].positions, [0.2; 6]);
        assert_eq!(full[0].velocities, [0.01; 6]);
        assert_eq!(full[0].time_from_start, Duration::ZERO);

        let at_zero = vec![TrajectoryPoint::new([1.0; 6], [0.0; 6], Duration::ZERO)];
        assert_eq!(inner.with_start_point(&at_zero).unwrap().len(), 1);
    }
}
