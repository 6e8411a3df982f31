//! 轨迹插值
//!
//! 两种执行策略：
//!
//! - **平滑**：相邻路点之间做三次 Hermite 插值，端点位置与速度精确保持，
//!   路点处 C¹ 连续；
//! - **定时（逐点）**：每段按梯形速度曲线独立规划，段末速度为 0，
//!   机器人在每个路点停下。
//!
//! # 算法
//!
//! 归一化时间 `s = τ / T ∈ [0, 1]` 上的三次多项式：
//! ```text
//! p(s) = a0 + a1*s + a2*s² + a3*s³
//! v(τ) = (a1 + 2*a2*s + 3*a3*s²) / T
//! ```
//! 端点速度需先乘以 `T` 换算到归一化时间。

use crate::error::FollowerError;
use std::time::Duration;
use ur_protocol::JOINT_COUNT;

/// 轨迹点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    /// 目标关节位置（弧度）
    pub positions: [f64; JOINT_COUNT],
    /// 目标关节速度（弧度/秒）
    pub velocities: [f64; JOINT_COUNT],
    /// 相对轨迹起点的时间（微秒精度）
    pub time_from_start: Duration,
}

impl TrajectoryPoint {
    pub fn new(
        positions: [f64; JOINT_COUNT],
        velocities: [f64; JOINT_COUNT],
        time_from_start: Duration,
    ) -> Self {
        Self {
            positions,
            velocities,
            time_from_start,
        }
    }
}

/// 某一时刻的插值结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub positions: [f64; JOINT_COUNT],
    pub velocities: [f64; JOINT_COUNT],
}

impl From<&TrajectoryPoint> for Sample {
    fn from(point: &TrajectoryPoint) -> Self {
        Self {
            positions: point.positions,
            velocities: point.velocities,
        }
    }
}

/// 可按时间采样的轨迹
pub trait TrajectoryProfile {
    /// 轨迹总时长
    fn duration(&self) -> Duration;

    /// 在 `t`（相对轨迹起点）处采样；超出总时长时返回终点
    fn sample(&self, t: Duration) -> Sample;

    /// 终点
    fn final_sample(&self) -> Sample {
        self.sample(self.duration())
    }
}

/// 轨迹总时长（最后一个点的时间）
pub fn total_duration(points: &[TrajectoryPoint]) -> Duration {
    points.last().map(|p| p.time_from_start).unwrap_or_default()
}

/// 找到包含 `t` 的分段起点下标
///
/// 返回 `None` 表示 `t` 早于第一个点。
fn segment_index(points: &[TrajectoryPoint], t: Duration) -> Option<usize> {
    points
        .partition_point(|p| p.time_from_start <= t)
        .checked_sub(1)
}

/// 三次多项式系数（归一化时间）
#[derive(Debug, Clone, Copy, Default)]
struct CubicCoeffs {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
}

impl CubicCoeffs {
    /// 由端点条件计算系数
    ///
    /// `p(0) = p0`, `p(1) = p1`, `p'(0) = v0·T`, `p'(1) = v1·T`
    fn hermite(p0: f64, v0: f64, p1: f64, v1: f64, length: f64) -> Self {
        let m0 = v0 * length;
        let m1 = v1 * length;
        Self {
            a0: p0,
            a1: m0,
            a2: 3.0 * (p1 - p0) - 2.0 * m0 - m1,
            a3: -2.0 * (p1 - p0) + m0 + m1,
        }
    }

    fn position(&self, s: f64) -> f64 {
        self.a0 + self.a1 * s + self.a2 * s * s + self.a3 * s * s * s
    }

    /// 对归一化时间的导数，需要除以分段时长
    fn velocity(&self, s: f64) -> f64 {
        self.a1 + 2.0 * self.a2 * s + 3.0 * self.a3 * s * s
    }
}

/// 单关节 Hermite 插值
///
/// # 参数
/// - `t`: 分段内时间（秒）
/// - `length`: 分段时长（秒）
///
/// # 返回
/// `(position, velocity)`
///
/// # Example
///
/// ```
/// use ur_control::interpolate;
///
/// let (p, _v) = interpolate(0.5, 1.0, 0.0, 1.0, 0.0, 0.0);
/// assert!((p - 0.5).abs() < 1e-12);
/// ```
pub fn interpolate(t: f64, length: f64, p0: f64, p1: f64, v0: f64, v1: f64) -> (f64, f64) {
    if length <= 0.0 {
        return (p1, v1);
    }
    let s = (t / length).clamp(0.0, 1.0);
    let coeffs = CubicCoeffs::hermite(p0, v0, p1, v1, length);
    (coeffs.position(s), coeffs.velocity(s) / length)
}

/// 平滑轨迹（分段三次 Hermite）
#[derive(Debug, Clone)]
pub struct SmoothProfile {
    points: Vec<TrajectoryPoint>,
}

impl SmoothProfile {
    pub fn new(points: &[TrajectoryPoint]) -> Result<Self, FollowerError> {
        if points.is_empty() {
            return Err(FollowerError::EmptyTrajectory);
        }
        Ok(Self {
            points: points.to_vec(),
        })
    }
}

impl TrajectoryProfile for SmoothProfile {
    fn duration(&self) -> Duration {
        total_duration(&self.points)
    }

    fn sample(&self, t: Duration) -> Sample {
        let Some(i) = segment_index(&self.points, t) else {
            return Sample::from(&self.points[0]);
        };
        let Some(end) = self.points.get(i + 1) else {
            return Sample::from(&self.points[i]);
        };
        let start = &self.points[i];

        let length = end.time_from_start.saturating_sub(start.time_from_start).as_secs_f64();
        let local = t.saturating_sub(start.time_from_start).as_secs_f64();

        let mut sample = Sample::from(end);
        for j in 0..JOINT_COUNT {
            let (p, v) = interpolate(
                local,
                length,
                start.positions[j],
                end.positions[j],
                start.velocities[j],
                end.velocities[j],
            );
            sample.positions[j] = p;
            sample.velocities[j] = v;
        }
        sample
    }
}

/// 单轴梯形速度曲线
///
/// 以 `|acceleration|` 加速到 `velocity`，匀速，再以同样的加速度减速到 0。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisProfile {
    /// 巡航速度（带符号）
    pub velocity: f64,
    /// 加速度（带符号，与速度同号）
    pub acceleration: f64,
}

impl AxisProfile {
    /// 在段内时间 `tau` 处采样（秒）
    pub fn sample(&self, p0: f64, p1: f64, tau: f64, length: f64) -> (f64, f64) {
        if self.velocity.abs() < f64::EPSILON || tau >= length {
            return (p1, 0.0);
        }
        if tau <= 0.0 {
            return (p0, 0.0);
        }

        let ramp = self.velocity / self.acceleration;
        if tau < ramp {
            (p0 + 0.5 * self.acceleration * tau * tau, self.acceleration * tau)
        } else if tau < length - ramp {
            (
                p0 + 0.5 * self.acceleration * ramp * ramp + self.velocity * (tau - ramp),
                self.velocity,
            )
        } else {
            let rest = length - tau;
            (p1 - 0.5 * self.acceleration * rest * rest, self.acceleration * rest)
        }
    }
}

/// 计算单轴在 `dt` 内移动 `dphi` 所需的巡航速度与加速度
///
/// 加速度取上限 `max_accel`，由 `dphi = v·(dt - v/a)` 解出较小的根
/// `v = (a·dt - sqrt(a²·dt² - 4·a·|dphi|)) / 2`。
/// 判别式为负（`a·dt² < 4·|dphi|`）或 `v > max_vel` 时不可行，返回 `None`。
pub fn compute_velocity_and_accel(
    dphi: f64,
    dt: f64,
    max_vel: f64,
    max_accel: f64,
) -> Option<AxisProfile> {
    let distance = dphi.abs();
    if distance < f64::EPSILON {
        return Some(AxisProfile::default());
    }
    if dt <= 0.0 || max_accel <= 0.0 || !dphi.is_finite() {
        return None;
    }

    let discriminant = max_accel * max_accel * dt * dt - 4.0 * max_accel * distance;
    if discriminant < 0.0 {
        return None;
    }
    let velocity = (max_accel * dt - discriminant.sqrt()) / 2.0;
    if velocity > max_vel {
        return None;
    }

    Some(AxisProfile {
        velocity: velocity.copysign(dphi),
        acceleration: max_accel.copysign(dphi),
    })
}

/// 定时轨迹（逐点停靠）
///
/// 所有分段在构造时一次规划完成，任何分段不可行都会在发送第一条指令前报错。
#[derive(Debug, Clone)]
pub struct TimedProfile {
    points: Vec<TrajectoryPoint>,
    segments: Vec<[AxisProfile; JOINT_COUNT]>,
}

impl TimedProfile {
    pub fn plan(
        points: &[TrajectoryPoint],
        max_velocity: f64,
        max_acceleration: f64,
    ) -> Result<Self, FollowerError> {
        if points.is_empty() {
            return Err(FollowerError::EmptyTrajectory);
        }

        let mut segments = Vec::with_capacity(points.len().saturating_sub(1));
        for (segment, pair) in points.windows(2).enumerate() {
            let (start, end) = (&pair[0], &pair[1]);
            let dt = end.time_from_start.saturating_sub(start.time_from_start).as_secs_f64();

            let mut axes = [AxisProfile::default(); JOINT_COUNT];
            for (joint, axis) in axes.iter_mut().enumerate() {
                let dphi = end.positions[joint] - start.positions[joint];
                *axis = compute_velocity_and_accel(dphi, dt, max_velocity, max_acceleration)
                    .ok_or(FollowerError::InfeasibleSegment { segment, joint })?;
            }
            segments.push(axes);
        }

        Ok(Self {
            points: points.to_vec(),
            segments,
        })
    }
}

impl TrajectoryProfile for TimedProfile {
    fn duration(&self) -> Duration {
        total_duration(&self.points)
    }

    fn sample(&self, t: Duration) -> Sample {
        let stopped = |p: &TrajectoryPoint| Sample {
            positions: p.positions,
            velocities: [0.0; JOINT_COUNT],
        };

        let Some(i) = segment_index(&self.points, t) else {
            return stopped(&self.points[0]);
        };
        let (Some(end), Some(axes)) = (self.points.get(i + 1), self.segments.get(i)) else {
            return stopped(&self.points[i]);
        };
        let start = &self.points[i];

        let length = end.time_from_start.saturating_sub(start.time_from_start).as_secs_f64();
        let local = t.saturating_sub(start.time_from_start).as_secs_f64();

        let mut sample = stopped(end);
        for (j, axis) in axes.iter().enumerate() {
            let (p, v) = axis.sample(start.positions[j], end.positions[j], local, length);
            sample.positions[j] = p;
            sample.velocities[j] = v;
        }
        sample
    }
}
