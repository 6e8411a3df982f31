//! 驱动对象
//!
//! [`RobotDriver`] 拥有接收线程，对外提供共享状态与指标的只读访问。

use crate::error::DriverError;
use crate::metrics::{IngestMetrics, IngestMetricsSnapshot};
use crate::pipeline::{PipelineConfig, ingest_loop};
use crate::state::{RobotContext, StateListener};
use crate::stream::PacketSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::error;
use ur_protocol::{PrimaryParser, ProtocolVersions, RealtimeParser};

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        // 看门狗线程负责阻塞 join，超时后由进程退出回收
        std::thread::spawn(move || {
            let _ = tx.send(self.join().is_ok());
        });
        match rx.recv_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DriverError::IoThread("thread panicked".into())),
            Err(_) => Err(DriverError::IoThread(format!(
                "thread did not exit within {:?}",
                timeout
            ))),
        }
    }
}

/// 机器人驱动
///
/// 实时端口线程写入关节反馈；可选的主端口线程写入机器人状态。
/// 没有主端口线程时由实时端口推导机器人状态。
pub struct RobotDriver {
    ctx: Arc<RobotContext>,
    versions: ProtocolVersions,
    is_running: Arc<AtomicBool>,
    realtime_metrics: Arc<IngestMetrics>,
    primary_metrics: Arc<IngestMetrics>,
    realtime_thread: Option<JoinHandle<()>>,
    primary_thread: Option<JoinHandle<()>>,
}

impl RobotDriver {
    /// 用已建立的包来源启动接收线程
    ///
    /// # 参数
    /// - `realtime`: 实时端口
    /// - `primary`: 主端口（版本消息已被读走）；`None` 时由实时端口负责机器人状态
    /// - `versions`: 连接时确定的布局
    /// - `ctx`: 共享状态上下文
    pub fn start<R, P>(
        realtime: R,
        primary: Option<P>,
        versions: ProtocolVersions,
        ctx: Arc<RobotContext>,
    ) -> Result<Self, DriverError>
    where
        R: PacketSource + Send + 'static,
        P: PacketSource + Send + 'static,
    {
        ctx.set_versions(versions.clone());

        let is_running = Arc::new(AtomicBool::new(true));
        let realtime_metrics = Arc::new(IngestMetrics::new());
        let primary_metrics = Arc::new(IngestMetrics::new());

        let primary_thread = match primary {
            Some(source) => {
                let parser = PrimaryParser::from(&versions);
                let (ctx, running, metrics) =
                    (ctx.clone(), is_running.clone(), primary_metrics.clone());
                Some(
                    std::thread::Builder::new()
                        .name("ur-primary-ingest".into())
                        .spawn(move || {
                            ingest_loop(
                                source,
                                parser,
                                ctx,
                                PipelineConfig::primary(),
                                running,
                                metrics,
                            )
                        })?,
                )
            },
            None => None,
        };

        let rt_config = PipelineConfig::realtime(primary_thread.is_none());
        let parser = RealtimeParser::from(&versions);
        let (rt_ctx, running, metrics) =
            (ctx.clone(), is_running.clone(), realtime_metrics.clone());
        let realtime_thread = std::thread::Builder::new()
            .name("ur-rt-ingest".into())
            .spawn(move || ingest_loop(realtime, parser, rt_ctx, rt_config, running, metrics))?;

        Ok(Self {
            ctx,
            versions,
            is_running,
            realtime_metrics,
            primary_metrics,
            realtime_thread: Some(realtime_thread),
            primary_thread,
        })
    }

    /// 共享状态上下文
    pub fn context(&self) -> Arc<RobotContext> {
        self.ctx.clone()
    }

    pub fn versions(&self) -> &ProtocolVersions {
        &self.versions
    }

    /// 注册状态变化监听者
    pub fn add_state_listener(&self, listener: Arc<dyn StateListener>) {
        self.ctx.add_state_listener(listener);
    }

    pub fn realtime_metrics(&self) -> IngestMetricsSnapshot {
        self.realtime_metrics.snapshot()
    }

    pub fn primary_metrics(&self) -> IngestMetricsSnapshot {
        self.primary_metrics.snapshot()
    }

    /// 接收线程是否都在运行
    pub fn is_healthy(&self) -> bool {
        let alive = |h: &Option<JoinHandle<()>>| h.as_ref().map(|h| !h.is_finished()).unwrap_or(true);
        self.is_running.load(Ordering::Acquire)
            && alive(&self.realtime_thread)
            && alive(&self.primary_thread)
    }

    /// 等待第一份关节反馈（控制开始前调用）
    pub fn wait_for_feedback(&self, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        loop {
            if self.ctx.joints().is_some() && self.ctx.robot_state().is_some() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            if !self.is_running.load(Ordering::Acquire) {
                return Err(DriverError::ConnectionClosed);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// 通知接收线程退出并等待
    pub fn shutdown(&mut self) {
        self.is_running.store(false, Ordering::Release);

        let join_timeout = Duration::from_secs(2);
        for (name, handle) in [
            ("realtime", self.realtime_thread.take()),
            ("primary", self.primary_thread.take()),
        ] {
            if let Some(handle) = handle
                && let Err(e) = handle.join_timeout(join_timeout)
            {
                error!("{} ingest thread failed to shut down: {}", name, e);
            }
        }
    }
}

impl Drop for RobotDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
