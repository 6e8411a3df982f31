//! 轨迹跟随器
//!
//! 通过反向连接按控制周期（默认 8ms）向机器人控制程序发送伺服指令。
//!
//! 状态流转：`Idle → Connected → Streaming → (Completed | Interrupted | Hung)`。
//! 挂起后连接被丢弃，回到 `Idle`，需要重新 `start()`。
//!
//! `interrupt()` 只写原子标志，可以在任意线程、任意时刻调用；
//! `stop()` 需要取得连接锁，最多等待一个控制周期。

use crate::error::FollowerError;
use crate::server::ReverseServer;
use crate::trajectory::{SmoothProfile, TimedProfile, TrajectoryPoint, TrajectoryProfile};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use ur_protocol::{JOINT_COUNT, SERVO_ACK_SIZE, ServoCommand, decode_ack};

/// 跟随器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FollowerState {
    Idle = 0,
    Connected = 1,
    Streaming = 2,
    Completed = 3,
    Interrupted = 4,
    Hung = 5,
}

impl FollowerState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FollowerState::Connected,
            2 => FollowerState::Streaming,
            3 => FollowerState::Completed,
            4 => FollowerState::Interrupted,
            5 => FollowerState::Hung,
            _ => FollowerState::Idle,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// 跟随器状态（原子版本）
#[derive(Debug)]
pub struct AtomicFollowerState {
    inner: AtomicU8,
}

impl AtomicFollowerState {
    pub fn new(state: FollowerState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> FollowerState {
        FollowerState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: FollowerState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }
}

/// 一次流式发送的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// 轨迹全部发送完毕
    Completed,
    /// 被 `interrupt()` 提前终止（已发送保持位置指令）
    Interrupted,
}

/// 跟随器配置
#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// 反向连接监听地址
    pub reverse_ip: String,
    pub reverse_port: u16,
    /// 等待控制程序连入的最长时间
    pub accept_timeout: Duration,
    /// 控制周期
    pub servoj_time: Duration,
    /// 单条记录写超时
    pub write_timeout: Duration,
    /// 应答超时；`None` 表示控制程序不回显序号
    pub ack_timeout: Option<Duration>,
    /// 定时模式的速度上限（弧度/秒）
    pub max_velocity: f64,
    /// 定时模式的加速度上限（弧度/秒²）
    pub max_acceleration: f64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            reverse_ip: "0.0.0.0".to_string(),
            reverse_port: 50001,
            accept_timeout: Duration::from_secs(30),
            servoj_time: Duration::from_millis(8),
            write_timeout: Duration::from_millis(8),
            ack_timeout: None,
            max_velocity: 10.0,
            max_acceleration: 15.0,
        }
    }
}

/// 轨迹执行接口
///
/// 协调器通过它驱动跟随器；测试中可以替换为假实现。
pub trait TrajectoryExecutor: Send + Sync {
    /// 确保控制程序已连接，并清除上一次的中断请求
    fn start(&self) -> Result<(), FollowerError>;

    fn start_smooth_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError>;

    fn start_timed_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError>;

    /// 请求提前终止当前轨迹（非阻塞）
    fn interrupt(&self);

    /// 发送停止指令
    fn stop(&self) -> Result<(), FollowerError>;
}

/// 已建立的反向连接
struct Link {
    stream: TcpStream,
    /// 最近一次下发的目标位置（停止/保持指令使用）；尚未下发任何轨迹时为 `None`
    last_positions: Option<[f64; JOINT_COUNT]>,
}

/// 轨迹跟随器
pub struct TrajectoryFollower {
    config: FollowerConfig,
    server: ReverseServer,
    link: Mutex<Option<Link>>,
    state: AtomicFollowerState,
    interrupt: AtomicBool,
    sequence: AtomicU32,
}

impl TrajectoryFollower {
    /// 绑定反向连接端口（不等待连入）
    pub fn bind(config: FollowerConfig) -> Result<Self, FollowerError> {
        let server = ReverseServer::bind((config.reverse_ip.as_str(), config.reverse_port))?;
        Ok(Self {
            config,
            server,
            link: Mutex::new(None),
            state: AtomicFollowerState::new(FollowerState::Idle),
            interrupt: AtomicBool::new(false),
            sequence: AtomicU32::new(0),
        })
    }

    /// 实际监听地址
    pub fn local_addr(&self) -> Result<SocketAddr, FollowerError> {
        self.server.local_addr()
    }

    pub fn state(&self) -> FollowerState {
        self.state.get(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_some()
    }

    /// 等待控制程序连入
    ///
    /// 已连接时直接返回。无论是否已连接都会清除中断标志。
    pub fn start(&self) -> Result<(), FollowerError> {
        self.interrupt.store(false, Ordering::Release);

        let mut link = self.link.lock();
        if link.is_some() {
            self.state.set(FollowerState::Connected, Ordering::Release);
            return Ok(());
        }

        info!(
            "Waiting for robot control program to connect (timeout {:?})",
            self.config.accept_timeout
        );
        let (stream, peer) = self.server.accept(self.config.accept_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.config.write_timeout))?;
        stream.set_read_timeout(self.config.ack_timeout)?;

        *link = Some(Link {
            stream,
            last_positions: None,
        });
        self.state.set(FollowerState::Connected, Ordering::Release);
        info!("Robot control program connected from {}", peer);
        Ok(())
    }

    /// 平滑模式执行（阻塞直到完成、中断或挂起）
    pub fn start_smooth_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError> {
        self.remember_start(points);
        let profile = SmoothProfile::new(points)?;
        self.stream(&profile)
    }

    /// 定时模式执行；任一分段不可行时不发送任何指令
    pub fn start_timed_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError> {
        self.remember_start(points);
        let profile =
            TimedProfile::plan(points, self.config.max_velocity, self.config.max_acceleration)?;
        self.stream(&profile)
    }

    /// 请求中断，流式循环在下一个控制周期内响应
    pub fn interrupt(&self) {
        // Release: 与流式循环中的 Acquire 配对
        self.interrupt.store(true, Ordering::Release);
        debug!("Trajectory interrupt requested");
    }

    /// 停止当前轨迹并发送停止指令
    ///
    /// 成功后回到 `Connected`；写入失败视为挂起，丢弃连接回到 `Idle`。
    pub fn stop(&self) -> Result<(), FollowerError> {
        self.interrupt();

        let mut guard = self.link.lock();
        let Some(link) = guard.as_mut() else {
            self.state.set(FollowerState::Idle, Ordering::Release);
            return Ok(());
        };

        let Some(positions) = link.last_positions else {
            debug!("No trajectory streamed on this connection, skipping stop record");
            self.state.set(FollowerState::Connected, Ordering::Release);
            return Ok(());
        };
        let command = ServoCommand::stop(self.next_sequence(), positions);
        match self.send(link, &command) {
            Ok(()) => {
                self.state.set(FollowerState::Connected, Ordering::Release);
                debug!("Stop record sent");
                Ok(())
            },
            Err(e) => {
                warn!("Failed to send stop record: {}", e);
                *guard = None;
                self.state.set(FollowerState::Idle, Ordering::Release);
                Err(e)
            },
        }
    }

    /// 主动断开反向连接
    pub fn disconnect(&self) {
        if self.link.lock().take().is_some() {
            info!("Reverse connection closed");
        }
        self.state.set(FollowerState::Idle, Ordering::Release);
    }

    /// 记录轨迹起点：规划失败或首个周期前停止时，停止记录停在这里
    fn remember_start(&self, points: &[TrajectoryPoint]) {
        let mut guard = self.link.lock();
        if let (Some(link), Some(first)) = (guard.as_mut(), points.first()) {
            link.last_positions = Some(first.positions);
        }
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn stream(&self, profile: &impl TrajectoryProfile) -> Result<StreamOutcome, FollowerError> {
        let mut guard = self.link.lock();
        let link = guard.as_mut().ok_or(FollowerError::NotConnected)?;

        self.state.set(FollowerState::Streaming, Ordering::Release);
        match self.stream_on(link, profile) {
            Ok(outcome) => {
                let state = match outcome {
                    StreamOutcome::Completed => FollowerState::Completed,
                    StreamOutcome::Interrupted => FollowerState::Interrupted,
                };
                self.state.set(state, Ordering::Release);
                Ok(outcome)
            },
            Err(e) => {
                warn!("Robot has hung: {}", e);
                *guard = None;
                self.state.set(FollowerState::Hung, Ordering::Release);
                Err(e)
            },
        }
    }

    /// 控制周期循环（使用绝对时间锚点消除累积漂移）
    fn stream_on(
        &self,
        link: &mut Link,
        profile: &impl TrajectoryProfile,
    ) -> Result<StreamOutcome, FollowerError> {
        let period = self.config.servoj_time;
        let duration = profile.duration();
        let mut elapsed = Duration::ZERO;
        let mut next_tick = Instant::now();

        debug!("Streaming trajectory of {:?} at {:?} per tick", duration, period);

        // 首个周期之前被打断时，保持在轨迹起点
        let start = profile.sample(Duration::ZERO).positions;
        link.last_positions = Some(start);

        loop {
            // Acquire: 看到中断时必须能看到中断方之前的写入
            if self.interrupt.load(Ordering::Acquire) {
                let positions = link.last_positions.unwrap_or(start);
                let hold = ServoCommand::hold(self.next_sequence(), positions);
                self.send(link, &hold)?;
                info!("Trajectory interrupted at {:?}, holding position", elapsed);
                return Ok(StreamOutcome::Interrupted);
            }

            let finished = elapsed >= duration;
            let sample = if finished {
                profile.final_sample()
            } else {
                profile.sample(elapsed)
            };
            let command =
                ServoCommand::servo(self.next_sequence(), sample.positions, sample.velocities);
            self.send(link, &command)?;

            if finished {
                debug!("Trajectory streamed completely");
                return Ok(StreamOutcome::Completed);
            }

            elapsed += period;
            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            } else {
                warn!(
                    "Streaming loop overrun by {:?}, skipping sleep to catch up",
                    now - next_tick
                );
                next_tick = now;
            }
        }
    }

    fn send(&self, link: &mut Link, command: &ServoCommand) -> Result<(), FollowerError> {
        link.stream
            .write_all(&command.encode())
            .map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                    FollowerError::ConnectionLost
                },
                _ => FollowerError::WriteFailed(e),
            })?;
        link.last_positions = Some(command.positions);
        trace!("Sent record {} ({:?})", command.sequence, command.flag);

        if let Some(timeout) = self.config.ack_timeout {
            Self::await_ack(&mut link.stream, command.sequence, timeout)?;
        }
        Ok(())
    }

    fn await_ack(stream: &mut TcpStream, expected: u32, timeout: Duration) -> Result<(), FollowerError> {
        let mut buf = [0u8; SERVO_ACK_SIZE];
        stream.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset => FollowerError::ConnectionLost,
            ErrorKind::WouldBlock | ErrorKind::TimedOut => FollowerError::AckTimeout {
                sequence: expected,
                timeout,
            },
            _ => FollowerError::Io(e),
        })?;

        let actual = decode_ack(&buf)?;
        if actual != expected {
            return Err(FollowerError::AckMismatch { expected, actual });
        }
        Ok(())
    }
}

impl TrajectoryExecutor for TrajectoryFollower {
    fn start(&self) -> Result<(), FollowerError> {
        TrajectoryFollower::start(self)
    }

    fn start_smooth_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError> {
        TrajectoryFollower::start_smooth_trajectory(self, points)
    }

    fn start_timed_trajectory(
        &self,
        points: &[TrajectoryPoint],
    ) -> Result<StreamOutcome, FollowerError> {
        TrajectoryFollower::start_timed_trajectory(self, points)
    }

    fn interrupt(&self) {
        TrajectoryFollower::interrupt(self)
    }

    fn stop(&self) -> Result<(), FollowerError> {
        TrajectoryFollower::stop(self)
    }
}
