//! 协调器集成测试（假跟随器）
//!
//! 假跟随器记录每次调用；完成时可以把终点写回共享状态，模拟机器人到位。

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use ur_control::{
    CoordinatorConfig, FollowerError, Goal, GoalCoordinator, GoalEvent, GoalOutcome, GoalPoint,
    HangHandler, LogOnly, ResultCode, StreamOutcome, TrajectoryExecutor, TrajectoryPoint,
};
use ur_driver::RobotContext;
use ur_protocol::RobotState;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Behavior {
    /// 立即完成，并把终点写入共享状态
    Reach,
    /// 立即完成，但机器人没有到位
    Stall,
    /// 阻塞直到被打断
    Block,
    /// 连接丢失
    Hang,
    /// 下发耗时等于轨迹时长；开始下发 `after` 后机器人停在终点偏 `offset` 处，速度为 `speed`
    Arrive {
        after: Duration,
        offset: f64,
        speed: f64,
    },
}

struct FakeExecutor {
    behavior: Behavior,
    ctx: Arc<RobotContext>,
    interrupted: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    streamed: Mutex<Vec<(&'static str, Vec<TrajectoryPoint>)>>,
}

impl FakeExecutor {
    fn new(behavior: Behavior, ctx: Arc<RobotContext>) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ctx,
            interrupted: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            streamed: Mutex::new(Vec::new()),
        })
    }

    fn stream(
        &self,
        mode: &'static str,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError> {
        self.streamed.lock().push((mode, points.to_vec()));
        match self.behavior {
            Behavior::Reach => {
                if let Some(last) = points.last() {
                    self.ctx.publish_joints(last.positions, [0.0; 6], None);
                }
                Ok(StreamOutcome::Completed)
            },
            Behavior::Stall => Ok(StreamOutcome::Completed),
            Behavior::Block => {
                let deadline = Instant::now() + Duration::from_secs(5);
                while Instant::now() < deadline {
                    if self.interrupted.load(Ordering::Acquire) {
                        return Ok(StreamOutcome::Interrupted);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(StreamOutcome::Completed)
            },
            Behavior::Hang => Err(FollowerError::ConnectionLost),
            Behavior::Arrive {
                after,
                offset,
                speed,
            } => {
                let target = points.last().map_or([0.0; 6], |last| last.positions);
                let ctx = self.ctx.clone();
                thread::spawn(move || {
                    thread::sleep(after);
                    ctx.publish_joints(target.map(|q| q + offset), [speed; 6], None);
                });
                thread::sleep(points.last().map_or(Duration::ZERO, |last| last.time_from_start));
                Ok(StreamOutcome::Completed)
            },
        }
    }

    fn stream_count(&self) -> usize {
        self.streamed.lock().len()
    }
}

impl TrajectoryExecutor for FakeExecutor {
    fn start(&self) -> Result<(), FollowerError> {
        self.interrupted.store(false, Ordering::Release);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start_smooth_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError> {
        self.stream("smooth", points)
    }

    fn start_timed_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError> {
        self.stream("timed", points)
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    fn stop(&self) -> Result<(), FollowerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHangHandler {
    calls: AtomicUsize,
}

impl HangHandler for RecordingHangHandler {
    fn on_hang(&self, _error: &FollowerError) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

const WAIT: Duration = Duration::from_secs(3);

fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        settle_delay: Duration::from_millis(10),
        ..Default::default()
    }
}

fn running_context() -> Arc<RobotContext> {
    let ctx = Arc::new(RobotContext::new(Duration::from_secs(30)));
    ctx.publish_joints([0.0; 6], [0.0; 6], None);
    ctx.update_robot_state(RobotState::Running);
    ctx
}

fn goal(target: f64, ms: u64) -> Goal {
    Goal {
        joint_names: test_config().joint_names,
        points: vec![GoalPoint::new(
            vec![target; 6],
            vec![0.0; 6],
            Duration::from_millis(ms),
        )],
    }
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn start(
    config: CoordinatorConfig,
    behavior: Behavior,
) -> (GoalCoordinator, Arc<FakeExecutor>, Arc<RobotContext>) {
    let ctx = running_context();
    let executor = FakeExecutor::new(behavior, ctx.clone());
    let coordinator =
        GoalCoordinator::start(config, ctx.clone(), executor.clone(), Arc::new(LogOnly)).unwrap();
    (coordinator, executor, ctx)
}

#[test]
fn test_rejected_when_robot_not_running() {
    let (coordinator, executor, ctx) = start(test_config(), Behavior::Reach);
    ctx.update_robot_state(RobotState::ProtectiveStopped);

    let handle = coordinator.submit(goal(0.1, 100));
    assert_eq!(
        handle.next_event(WAIT),
        Some(GoalEvent::Finished(GoalOutcome::Rejected {
            code: ResultCode::Generic,
            message: "Robot is protective stopped".to_string(),
        }))
    );
    assert_eq!(executor.starts.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.current_goal(), None);
}

#[test]
fn test_joint_mismatch_never_reaches_follower() {
    let (coordinator, executor, _ctx) = start(test_config(), Behavior::Reach);

    let mut bad = goal(0.1, 100);
    bad.joint_names[0] = "gripper_joint".to_string();
    let outcome = coordinator.submit(bad).wait(WAIT).unwrap();
    assert_eq!(outcome.code(), ResultCode::InvalidJoints);
    assert!(outcome.message().contains("Found: gripper_joint"));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(executor.starts.load(Ordering::SeqCst), 0);
    assert_eq!(executor.stream_count(), 0);
}

#[test]
fn test_non_finite_values_rejected_before_streaming() {
    let (coordinator, executor, _ctx) = start(test_config(), Behavior::Reach);

    let mut bad = goal(0.1, 100);
    bad.points[0].positions[3] = f64::NAN;
    let outcome = coordinator.submit(bad).wait(WAIT).unwrap();
    assert_eq!(
        outcome,
        GoalOutcome::Rejected {
            code: ResultCode::InvalidGoal,
            message: "Received a goal with infinities or NaNs in positions".to_string(),
        }
    );
    thread::sleep(Duration::from_millis(50));
    assert_eq!(executor.stream_count(), 0);
}

#[test]
fn test_reaching_goal_succeeds() {
    let (coordinator, executor, _ctx) = start(test_config(), Behavior::Reach);

    // 关节顺序打乱，且第一个点不在 t=0
    let mut shuffled = goal(0.0, 100);
    shuffled.joint_names.swap(0, 5);
    shuffled.points[0].positions = vec![0.6, 0.2, 0.3, 0.4, 0.5, 0.1];

    let handle = coordinator.submit(shuffled);
    assert_eq!(handle.next_event(WAIT), Some(GoalEvent::Accepted));
    assert_eq!(handle.wait(WAIT), Some(GoalOutcome::Succeeded));

    assert!(wait_until(|| executor.stops.load(Ordering::SeqCst) == 1));
    let streamed = executor.streamed.lock();
    let (mode, points) = &streamed[0];
    assert_eq!(*mode, "smooth");
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].time_from_start, Duration::ZERO);
    assert_eq!(points[0].positions, [0.0; 6]);
    assert_eq!(points[1].positions, [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    drop(streamed);
    assert!(wait_until(|| coordinator.current_goal().is_none()));
}

#[test]
fn test_not_reaching_goal_times_out() {
    let (coordinator, executor, _ctx) = start(test_config(), Behavior::Stall);

    let started = Instant::now();
    let outcome = coordinator.submit(goal(0.5, 100)).wait(WAIT).unwrap();
    assert_eq!(
        outcome,
        GoalOutcome::Aborted {
            code: ResultCode::Generic,
            message: "Robot motion timed out or failed to reach goal.".to_string(),
        }
    );
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(wait_until(|| executor.stops.load(Ordering::SeqCst) == 1));
}

fn arrive(after_ms: u64, offset: f64, speed: f64) -> Behavior {
    Behavior::Arrive {
        after: Duration::from_millis(after_ms),
        offset,
        speed,
    }
}

fn timed_out() -> GoalOutcome {
    GoalOutcome::Aborted {
        code: ResultCode::Generic,
        message: "Robot motion timed out or failed to reach goal.".to_string(),
    }
}

#[test]
fn test_timeout_budget_counts_from_execution_start() {
    // 下发耗时 200ms，到位发生在 400ms，超过 1.5 倍时长（300ms）
    let (coordinator, _executor, _ctx) = start(test_config(), arrive(400, 0.0, 0.0));

    let outcome = coordinator.submit(goal(0.5, 200)).wait(WAIT).unwrap();
    assert_eq!(outcome, timed_out());
}

#[test]
fn test_arrival_within_budget_succeeds() {
    let (coordinator, _executor, _ctx) = start(test_config(), arrive(250, 0.0, 0.0));

    let outcome = coordinator.submit(goal(0.5, 200)).wait(WAIT).unwrap();
    assert_eq!(outcome, GoalOutcome::Succeeded);
}

#[test]
fn test_in_position_but_moving_times_out() {
    let (coordinator, _executor, _ctx) = start(test_config(), arrive(50, 0.0, 0.02));

    let outcome = coordinator.submit(goal(0.5, 100)).wait(WAIT).unwrap();
    assert_eq!(outcome, timed_out());
}

#[test]
fn test_just_outside_tolerance_times_out() {
    let (coordinator, _executor, _ctx) = start(test_config(), arrive(50, 0.003, 0.0));

    let outcome = coordinator.submit(goal(0.5, 100)).wait(WAIT).unwrap();
    assert_eq!(outcome, timed_out());
}

#[test]
fn test_just_inside_tolerance_and_slow_succeeds() {
    let (coordinator, _executor, _ctx) = start(test_config(), arrive(50, 0.002, 0.005));

    let outcome = coordinator.submit(goal(0.5, 100)).wait(WAIT).unwrap();
    assert_eq!(outcome, GoalOutcome::Succeeded);
}

#[test]
fn test_timed_mode_succeeds_after_streaming() {
    let config = CoordinatorConfig {
        use_smooth_trajectory: false,
        ..test_config()
    };
    let (coordinator, executor, _ctx) = start(config, Behavior::Stall);

    let outcome = coordinator.submit(goal(0.5, 100)).wait(WAIT).unwrap();
    assert!(outcome.is_success());
    assert_eq!(executor.streamed.lock()[0].0, "timed");
}

#[test]
fn test_safety_stop_aborts_executing_goal() {
    let (coordinator, executor, ctx) = start(test_config(), Behavior::Block);

    let handle = coordinator.submit(goal(0.5, 1000));
    assert_eq!(handle.next_event(WAIT), Some(GoalEvent::Accepted));
    assert!(wait_until(|| executor.stream_count() == 1));

    ctx.update_robot_state(RobotState::EmergencyStopped);
    assert_eq!(
        handle.wait(WAIT),
        Some(GoalOutcome::Aborted {
            code: ResultCode::Generic,
            message: "Robot safety stop".to_string(),
        })
    );

    assert!(wait_until(|| coordinator.current_goal().is_none()));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(executor.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_state_change_without_goal_is_ignored() {
    let (coordinator, executor, ctx) = start(test_config(), Behavior::Reach);
    ctx.update_robot_state(RobotState::EmergencyStopped);
    coordinator.on_robot_state_change(RobotState::Error);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(executor.stops.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.current_goal(), None);
}

#[test]
fn test_second_goal_supersedes_first() {
    let (coordinator, executor, _ctx) = start(test_config(), Behavior::Block);

    let first = coordinator.submit(goal(0.5, 1000));
    assert_eq!(first.next_event(WAIT), Some(GoalEvent::Accepted));
    assert!(wait_until(|| executor.stream_count() == 1));

    let second = coordinator.submit(goal(0.2, 1000));
    // submit 返回时旧目标已有结果
    assert_eq!(
        first.wait(Duration::ZERO),
        Some(GoalOutcome::Aborted {
            code: ResultCode::Generic,
            message: "Received another trajectory".to_string(),
        })
    );
    assert_eq!(coordinator.current_goal(), Some(second.id()));
    assert_eq!(second.next_event(WAIT), Some(GoalEvent::Accepted));
    assert!(wait_until(|| executor.stream_count() == 2));

    assert!(coordinator.cancel(second.id()));
    assert_eq!(
        second.wait(WAIT),
        Some(GoalOutcome::Canceled {
            message: "Goal cancelled by client".to_string(),
        })
    );
    assert!(wait_until(|| executor.stops.load(Ordering::SeqCst) == 2));
}

#[test]
fn test_cancel_unknown_goal_is_noop() {
    let (coordinator, executor, _ctx) = start(test_config(), Behavior::Block);

    let handle = coordinator.submit(goal(0.5, 1000));
    assert!(wait_until(|| executor.stream_count() == 1));
    assert!(!coordinator.cancel(handle.id() + 100));
    assert_eq!(coordinator.current_goal(), Some(handle.id()));
    assert!(!executor.interrupted.load(Ordering::Acquire));

    assert!(coordinator.cancel(handle.id()));
}

#[test]
fn test_hang_aborts_goal_and_invokes_policy() {
    let ctx = running_context();
    let executor = FakeExecutor::new(Behavior::Hang, ctx.clone());
    let hang = Arc::new(RecordingHangHandler::default());
    let coordinator =
        GoalCoordinator::start(test_config(), ctx, executor.clone(), hang.clone()).unwrap();

    let outcome = coordinator.submit(goal(0.5, 100)).wait(WAIT).unwrap();
    assert_eq!(outcome.code(), ResultCode::Generic);
    assert!(outcome.message().starts_with("Robot has hung."));

    assert!(wait_until(|| hang.calls.load(Ordering::SeqCst) == 1));
    assert_eq!(executor.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_interrupts_executing_goal() {
    let (mut coordinator, executor, _ctx) = start(test_config(), Behavior::Block);

    let handle = coordinator.submit(goal(0.5, 1000));
    assert!(wait_until(|| executor.stream_count() == 1));
    coordinator.shutdown();

    let outcome = handle.wait(WAIT).unwrap();
    assert!(!outcome.is_success());
    assert_eq!(executor.stops.load(Ordering::SeqCst), 1);
}
