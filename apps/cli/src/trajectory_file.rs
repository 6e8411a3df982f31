//! 轨迹文件
//!
//! JSON 格式，时间单位为秒：
//!
//! ```json
//! {
//!   "joint_names": ["shoulder_pan_joint", "..."],
//!   "points": [
//!     { "positions": [0, 0, 0, 0, 0, 0], "velocities": [0, 0, 0, 0, 0, 0], "time_from_start": 2.0 }
//!   ]
//! }
//! ```
//!
//! 省略 `joint_names` 时使用配置中的关节顺序；省略 `velocities` 时为全 0。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use ur_control::{Goal, GoalPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryFile {
    #[serde(default)]
    pub joint_names: Option<Vec<String>>,
    pub points: Vec<FilePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePoint {
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Option<Vec<f64>>,
    /// 秒
    pub time_from_start: f64,
}

impl TrajectoryFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取轨迹文件失败: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("解析轨迹文件失败: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 转换为目标；数值校验交给协调器
    pub fn into_goal(self, default_joint_names: &[String]) -> Result<Goal> {
        let joint_names = self
            .joint_names
            .unwrap_or_else(|| default_joint_names.to_vec());

        let points = self
            .points
            .into_iter()
            .enumerate()
            .map(|(i, point)| {
                let time_from_start = Duration::try_from_secs_f64(point.time_from_start)
                    .with_context(|| format!("第 {} 个点的 time_from_start 无效", i))?;
                let velocities = point
                    .velocities
                    .unwrap_or_else(|| vec![0.0; point.positions.len()]);
                Ok(GoalPoint::new(point.positions, velocities, time_from_start))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Goal {
            joint_names,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ur_control::DEFAULT_JOINT_NAMES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_with_defaults() {
        let file = TrajectoryFile::parse(
            r#"{ "points": [ { "positions": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6], "time_from_start": 1.5 } ] }"#,
        )
        .unwrap();
        let goal = file.into_goal(&names()).unwrap();
        assert_eq!(goal.joint_names, names());
        assert_eq!(goal.points[0].velocities, vec![0.0; 6]);
        assert_eq!(goal.points[0].time_from_start, Duration::from_millis(1500));
    }

    #[test]
    fn test_negative_time_rejected() {
        let file = TrajectoryFile::parse(
            r#"{ "points": [ { "positions": [0, 0, 0, 0, 0, 0], "time_from_start": -1.0 } ] }"#,
        )
        .unwrap();
        assert!(file.into_goal(&names()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.json");
        std::fs::write(
            &path,
            r#"{ "joint_names": ["a", "b", "c", "d", "e", "f"],
                 "points": [ { "positions": [0, 0, 0, 0, 0, 0], "velocities": [0, 0, 0, 0, 0, 0], "time_from_start": 0.0 } ] }"#,
        )
        .unwrap();
        let goal = TrajectoryFile::load(&path).unwrap().into_goal(&names()).unwrap();
        assert_eq!(goal.joint_names[0], "a");
        assert_eq!(goal.points.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        assert!(TrajectoryFile::load("/nonexistent/traj.json").is_err());
    }
}
