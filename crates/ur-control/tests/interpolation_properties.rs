//! 插值性质测试

use proptest::prelude::*;
use std::time::Duration;
use ur_control::{
    SmoothProfile, TrajectoryPoint, TrajectoryProfile, compute_velocity_and_accel, interpolate,
};

fn point(p: f64, v: f64, ms: u64) -> TrajectoryPoint {
    TrajectoryPoint::new([p; 6], [v; 6], Duration::from_millis(ms))
}

proptest! {
    #[test]
    fn hermite_hits_both_endpoints(
        p0 in -3.0f64..3.0,
        p1 in -3.0f64..3.0,
        v0 in -2.0f64..2.0,
        v1 in -2.0f64..2.0,
        length in 0.01f64..5.0,
    ) {
        let (start_p, start_v) = interpolate(0.0, length, p0, p1, v0, v1);
        let (end_p, end_v) = interpolate(length, length, p0, p1, v0, v1);
        prop_assert!((start_p - p0).abs() < 1e-9);
        prop_assert!((start_v - v0).abs() < 1e-9);
        prop_assert!((end_p - p1).abs() < 1e-9);
        prop_assert!((end_v - v1).abs() < 1e-9);
    }

    #[test]
    fn hermite_rest_to_rest_is_symmetric(
        p0 in -3.0f64..3.0,
        p1 in -3.0f64..3.0,
        length in 0.01f64..5.0,
    ) {
        let (mid, _) = interpolate(length / 2.0, length, p0, p1, 0.0, 0.0);
        prop_assert!((mid - (p0 + p1) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn smooth_profile_is_continuous_across_waypoints(
        p in prop::collection::vec(-2.0f64..2.0, 3),
        v in prop::collection::vec(-1.0f64..1.0, 3),
        gap0 in 100u64..2000,
        gap1 in 100u64..2000,
    ) {
        let points = [
            point(p[0], v[0], 0),
            point(p[1], v[1], gap0),
            point(p[2], v[2], gap0 + gap1),
        ];
        let profile = SmoothProfile::new(&points).unwrap();
        let waypoint = Duration::from_millis(gap0);

        let at = profile.sample(waypoint);
        let before = profile.sample(waypoint - Duration::from_micros(1));
        for j in 0..6 {
            prop_assert!((at.positions[j] - p[1]).abs() < 1e-9);
            prop_assert!((at.velocities[j] - v[1]).abs() < 1e-9);
            prop_assert!((before.positions[j] - at.positions[j]).abs() < 1e-3);
            prop_assert!((before.velocities[j] - at.velocities[j]).abs() < 1e-2);
        }
    }

    #[test]
    fn feasible_axis_profile_respects_limits(
        dphi in -2.0f64..2.0,
        dt in 0.1f64..3.0,
        max_vel in 0.5f64..10.0,
        max_accel in 1.0f64..20.0,
    ) {
        if let Some(axis) = compute_velocity_and_accel(dphi, dt, max_vel, max_accel) {
            prop_assert!(axis.velocity.abs() <= max_vel + 1e-9);
            prop_assert!(axis.acceleration.abs() <= max_accel + 1e-9);

            let (end, end_v) = axis.sample(0.0, dphi, dt, dt);
            prop_assert!((end - dphi).abs() < 1e-9);
            prop_assert_eq!(end_v, 0.0);

            if axis.velocity != 0.0 {
                // 减速段起点两侧位置连续
                let decel = dt - axis.velocity / axis.acceleration;
                let (left, _) = axis.sample(0.0, dphi, decel - 1e-9, dt);
                let (right, _) = axis.sample(0.0, dphi, decel + 1e-9, dt);
                prop_assert!((left - right).abs() < 1e-6);
            }
        } else {
            // 不可行：加速度不足或所需速度超限
            let a = max_accel;
            let disc = a * a * dt * dt - 4.0 * a * dphi.abs();
            prop_assert!(disc < 0.0 || (a * dt - disc.sqrt()) / 2.0 > max_vel);
        }
    }
}
