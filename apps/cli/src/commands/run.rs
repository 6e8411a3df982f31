//! run 命令
//!
//! 连接机器人 → 探测固件 → 启动接收、跟随器与协调器 → 执行轨迹文件。
//! 机器人上的控制程序需要已在运行，并连入反向连接端口。

use anyhow::{Context, Result};
use clap::Args;
use semver::Version;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use ur_control::{
    DriverConfig, GoalCoordinator, GoalEvent, GoalHandle, GoalOutcome, TrajectoryFollower,
    hang_handler,
};
use ur_driver::RobotDriverBuilder;

use crate::config_path;
use crate::trajectory_file::TrajectoryFile;

/// 事件轮询间隔（检查 Ctrl+C）
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 轨迹执行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 轨迹文件路径（JSON）
    #[arg(short, long)]
    pub trajectory: PathBuf,

    /// 机器人地址（覆盖配置）
    #[arg(long)]
    pub host: Option<String>,

    /// 反向连接端口（覆盖配置）
    #[arg(long)]
    pub reverse_port: Option<u16>,

    /// 使用定时模式（在每个路点停下）
    #[arg(long)]
    pub timed: bool,

    /// 机器人挂起时不退出进程
    #[arg(long)]
    pub no_kill_on_hang: bool,

    /// 固件版本（跳过探测，如 3.5.4）
    #[arg(long)]
    pub firmware: Option<String>,

    /// 等待首个反馈的时间（秒）
    #[arg(long, default_value_t = 5.0)]
    pub feedback_timeout: f64,
}

impl RunCommand {
    /// 命令行参数覆盖文件配置
    pub fn apply_overrides(&self, config: &mut DriverConfig) {
        if let Some(host) = &self.host {
            config.robot_host = host.clone();
        }
        if let Some(port) = self.reverse_port {
            config.reverse_port = port;
        }
        if self.timed {
            config.use_smooth_trajectory = false;
        }
        if self.no_kill_on_hang {
            config.kill_on_hang = false;
        }
    }

    pub fn execute(&self, config_path: &Path) -> Result<ExitCode> {
        let mut config = config_path::load(config_path)?;
        self.apply_overrides(&mut config);
        config.validate()?;

        let goal = TrajectoryFile::load(&self.trajectory)?
            .into_goal(&config.resolved_joint_names())?;
        println!(
            "📜 轨迹: {}（{} 个点）",
            self.trajectory.display(),
            goal.points.len()
        );

        let mut builder = RobotDriverBuilder::new(config.robot_host.clone())
            .primary_port(config.primary_port)
            .realtime_port(config.realtime_port)
            .telemetry_timeout(config.telemetry_timeout());
        if let Some(firmware) = &self.firmware {
            let version = Version::parse(firmware)
                .with_context(|| format!("无效的固件版本: {}", firmware))?;
            builder = builder.firmware(version);
        }

        println!("🔌 连接到机器人 {}...", config.robot_host);
        let driver = builder.build().context("连接机器人失败")?;
        driver
            .wait_for_feedback(Duration::from_secs_f64(self.feedback_timeout.max(0.0)))
            .context("等待机器人反馈失败")?;
        println!("✅ 已连接（固件 {}）", driver.versions().firmware);

        let follower = Arc::new(
            TrajectoryFollower::bind(config.follower_config()).context("绑定反向连接端口失败")?,
        );
        info!("Reverse connection listening on {}", follower.local_addr()?);

        let coordinator = GoalCoordinator::start(
            config.coordinator_config(),
            driver.context(),
            follower.clone(),
            hang_handler(config.kill_on_hang, config.hang_exit_delay()),
        )?;

        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let flag = interrupted.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
                .context("设置 Ctrl+C 处理失败")?;
        }

        let handle = coordinator.submit(goal);
        let outcome = wait_for_outcome(&coordinator, &handle, &interrupted);
        report(&outcome);

        drop(coordinator);
        follower.disconnect();
        Ok(ExitCode::from(exit_code(&outcome)))
    }
}

fn wait_for_outcome(
    coordinator: &GoalCoordinator,
    handle: &GoalHandle,
    interrupted: &AtomicBool,
) -> GoalOutcome {
    loop {
        match handle.next_event(POLL_INTERVAL) {
            Some(GoalEvent::Accepted) => println!("▶️  目标 {} 已接受，等待控制程序连入...", handle.id()),
            Some(GoalEvent::Finished(outcome)) => return outcome,
            None => {
                if interrupted.swap(false, Ordering::SeqCst) {
                    println!("⏹️  取消目标 {}", handle.id());
                    coordinator.cancel(handle.id());
                }
            },
        }
    }
}

fn report(outcome: &GoalOutcome) {
    match outcome {
        GoalOutcome::Succeeded => println!("✅ 轨迹执行成功"),
        GoalOutcome::Rejected { code, message } => {
            println!("❌ 目标被拒绝 ({}): {}", code.as_i32(), message)
        },
        GoalOutcome::Aborted { code, message } => {
            println!("❌ 目标中止 ({}): {}", code.as_i32(), message)
        },
        GoalOutcome::Canceled { message } => println!("⏹️  目标已取消: {}", message),
    }
}

/// 成功 0，拒绝 2，其他失败 1
fn exit_code(outcome: &GoalOutcome) -> u8 {
    match outcome {
        GoalOutcome::Succeeded => 0,
        GoalOutcome::Rejected { .. } => 2,
        GoalOutcome::Aborted { .. } | GoalOutcome::Canceled { .. } => 1,
    }
}
