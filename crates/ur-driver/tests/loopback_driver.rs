//! 回环控制器集成测试
//!
//! 在本机起两个监听端口模拟控制器：主端口发送版本消息，实时端口以 8ms 周期推送快照。

use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use ur_driver::{DriverError, RobotDriverBuilder};
use ur_protocol::{
    RealtimeVersion, RobotMessage, RobotMessageType, RobotState, StateVersion, VersionMessage,
};

fn version_packet() -> Vec<u8> {
    RobotMessage {
        timestamp: 0,
        source: -2,
        message_type: RobotMessageType::Version,
        version: Some(VersionMessage {
            project_name: "URControl".into(),
            major_version: 3,
            minor_version: 3,
            bugfix_version: 4,
            build_number: 310,
            build_date: "12-01-2017".into(),
        }),
    }
    .encode()
}

fn rt_packet(time: f64, q0: f64) -> Vec<u8> {
    let size = RealtimeVersion::V3_2_3.packet_size();
    let mut doubles = vec![0.0f64; (size - 4) / 8];
    doubles[0] = time;
    doubles[31] = q0;
    doubles[94] = 7.0; // robot_mode = RUNNING
    doubles[101] = 1.0; // safety_mode = NORMAL
    let mut out = (size as i32).to_be_bytes().to_vec();
    for d in doubles {
        out.extend_from_slice(&d.to_be_bytes());
    }
    out
}

struct FakeController {
    primary_port: u16,
    realtime_port: u16,
    stop: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl FakeController {
    fn start() -> Self {
        let primary = TcpListener::bind("127.0.0.1:0").unwrap();
        let realtime = TcpListener::bind("127.0.0.1:0").unwrap();
        let primary_port = primary.local_addr().unwrap().port();
        let realtime_port = realtime.local_addr().unwrap().port();
        let stop = Arc::new(AtomicBool::new(false));

        let stop_primary = stop.clone();
        let primary_handle = thread::spawn(move || {
            let (mut conn, _) = primary.accept().unwrap();
            conn.write_all(&version_packet()).unwrap();
            while !stop_primary.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(5));
            }
        });

        let stop_rt = stop.clone();
        let rt_handle = thread::spawn(move || {
            let (mut conn, _) = realtime.accept().unwrap();
            let mut t = 0.0;
            while !stop_rt.load(Ordering::Acquire) {
                if conn.write_all(&rt_packet(t, 0.25)).is_err() {
                    break;
                }
                t += 0.008;
                thread::sleep(Duration::from_millis(8));
            }
        });

        Self {
            primary_port,
            realtime_port,
            stop,
            handles: vec![primary_handle, rt_handle],
        }
    }

    fn shutdown(self) {
        self.stop.store(true, Ordering::Release);
        for h in self.handles {
            h.join().unwrap();
        }
    }
}

fn builder(controller: &FakeController) -> RobotDriverBuilder {
    RobotDriverBuilder::new("127.0.0.1")
        .primary_port(controller.primary_port)
        .realtime_port(controller.realtime_port)
        .read_timeout(Duration::from_millis(20))
        .version_timeout(Duration::from_secs(2))
        .ingest_primary(false)
}

#[test]
fn test_driver_receives_realtime_feedback() {
    let controller = FakeController::start();
    let driver = builder(&controller).build().unwrap();

    assert_eq!(driver.versions().realtime, RealtimeVersion::V3_2_3);
    assert_eq!(driver.versions().state, StateVersion::V3_2);

    driver.wait_for_feedback(Duration::from_secs(2)).unwrap();
    let ctx = driver.context();
    assert_eq!(ctx.robot_state(), Some(RobotState::Running));
    assert_eq!(ctx.joints().unwrap().q_actual[0], 0.25);
    assert!(ctx.is_alive());
    assert!(driver.is_healthy());
    assert!(driver.realtime_metrics().packets_decoded >= 1);
    assert_eq!(driver.realtime_metrics().malformed, 0);

    drop(driver);
    controller.shutdown();
}

#[test]
fn test_driver_detects_controller_disconnect() {
    let controller = FakeController::start();
    let driver = builder(&controller).build().unwrap();
    driver.wait_for_feedback(Duration::from_secs(2)).unwrap();

    controller.shutdown();

    let deadline = Instant::now() + Duration::from_secs(2);
    while driver.is_healthy() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!driver.is_healthy());
    assert_eq!(driver.context().robot_state(), None);
}

#[test]
fn test_build_fails_without_controller() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = RobotDriverBuilder::new("127.0.0.1")
        .primary_port(port)
        .connect_timeout(Duration::from_millis(200))
        .build();
    assert!(matches!(result, Err(DriverError::Io(_))));
}
