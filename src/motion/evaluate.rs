use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use log::warn;
use rand::Rng;

use super::waypoint::{heading_towards, shortest_arc};
use super::{
    Behavior, DriftParams, FlightParams, MotionRecord, OrbitParams, PulseParams, SpinAxis,
    SpinParams, WanderParams, WanderState,
};
use crate::clock::FrameTime;
use crate::scene_graph::Transform;

/// Sampling offset used to estimate the flight direction and turn rate.
const FLIGHT_PROBE: f32 = 0.05;

/// Advances the record's local time and returns the pose for this frame.
///
/// No formula divides by a configurable value, so zero radii or heights
/// collapse to a fixed point. A non-finite result falls back to the base pose.
pub fn evaluate<R: Rng + ?Sized>(
    record: &mut MotionRecord,
    time: FrameTime,
    viewer: Vec3,
    rng: &mut R,
) -> Transform {
    record.tick(time.delta);
    let t = record.effective_time();
    let base = *record.base();
    let pose = match &mut record.behavior {
        Behavior::Orbit(params) => orbit(params, &base, t),
        Behavior::Pulse(params) => pulse(params, &base, t),
        Behavior::Wander { params, state } => wander(params, state, &base, t, time.delta, rng),
        Behavior::Spin(params) => spin(params, &base, t),
        Behavior::Drift(params) => drift(params, &base, t),
        Behavior::ComplexFlight(params) => flight(params, &base, t),
        Behavior::Billboard => billboard(&base, viewer),
        Behavior::Idle => base,
    };
    if pose.position.is_finite() && pose.rotation.is_finite() && pose.scale.is_finite() {
        pose
    } else {
        warn!(
            "{} motion produced a non-finite pose for node {}",
            record.behavior.name(),
            record.target()
        );
        base
    }
}

fn orbit(p: &OrbitParams, base: &Transform, t: f32) -> Transform {
    let angle = p.start_angle + t * p.angular_speed;
    let radius = p.radius + (t * p.sway_rate).sin() * p.radius_sway;
    let height = p.height.unwrap_or(base.position.y);
    Transform {
        position: Vec3::new(
            base.position.x + angle.cos() * radius,
            height + (t * p.bob_rate).sin() * p.bob_amplitude,
            base.position.z + angle.sin() * radius,
        ),
        rotation: Vec3::new(
            base.rotation.x,
            angle + FRAC_PI_2,
            (t * p.roll_rate).sin() * p.roll_amount,
        ),
        scale: base.scale,
    }
}

/// Upward offset contributed by the rectified pump term. Never negative.
pub fn pump_offset(p: &PulseParams, t: f32) -> f32 {
    (t * p.pulse_rate).sin().max(0.0) * p.pulse_height.abs()
}

fn pulse(p: &PulseParams, base: &Transform, t: f32) -> Transform {
    let pump = (t * p.pulse_rate).sin().max(0.0);
    let stretch = pump * p.squish;
    Transform {
        position: Vec3::new(
            base.position.x + (t * p.drift_rate_x).sin() * p.drift_radius,
            base.position.y + pump_offset(p, t) + (t * p.sway_rate).sin() * p.sway_height,
            base.position.z + (t * p.drift_rate_z).cos() * p.drift_radius,
        ),
        rotation: Vec3::new(
            base.rotation.x,
            base.rotation.y + t * p.spin_rate,
            base.rotation.z,
        ),
        scale: base.scale * Vec3::new(1.0 - stretch * 0.5, 1.0 + stretch, 1.0 - stretch * 0.5),
    }
}

fn wander<R: Rng + ?Sized>(
    p: &WanderParams,
    state: &mut WanderState,
    base: &Transform,
    t: f32,
    delta: f32,
    rng: &mut R,
) -> Transform {
    state.advance(delta, p, rng);
    state.steer(delta, p.turn_rate);

    let direction = state.target - state.current;
    let lateral = Vec3::new(direction.z, 0.0, -direction.x).normalize_or_zero();
    let wobble = t * p.wander_rate;
    let offset = lateral * wobble.sin() * p.wander_amplitude
        + Vec3::Y * (wobble * 0.7).cos() * p.wander_amplitude * 0.5;

    let speed = state.speed_factor();
    Transform {
        position: state.path_point() + offset,
        rotation: Vec3::new(
            (t * 0.6).cos() * p.tilt_amount * 0.5 * speed,
            state.heading,
            (t * 0.8).sin() * p.tilt_amount * speed,
        ),
        scale: base.scale,
    }
}

fn spin(p: &SpinParams, base: &Transform, t: f32) -> Transform {
    let mut rotation = base.rotation;
    match p.axis {
        SpinAxis::X => rotation.x += t * p.rate,
        SpinAxis::Y => rotation.y += t * p.rate,
        SpinAxis::Z => rotation.z += t * p.rate,
    }
    Transform { rotation, ..*base }
}

fn drift(p: &DriftParams, base: &Transform, t: f32) -> Transform {
    let mut pose = *base;
    pose.position.y += (t * p.rate).sin() * p.amplitude;
    pose.rotation.y += t * p.yaw_rate;
    pose
}

fn flight_point(p: &FlightParams, anchor: Vec3, t: f32) -> Vec3 {
    let angle = t * p.angular_speed;
    let radius = p.radius + (t * p.radius_rate).sin() * p.radius_sway;
    let altitude = p.altitude + (t * p.altitude_rate).sin() * p.altitude_sway;
    Vec3::new(
        anchor.x + angle.cos() * radius,
        altitude + (t * p.swoop_rate).sin() * p.swoop,
        anchor.z + (angle * p.axis_ratio).sin() * radius,
    )
}

fn flight(p: &FlightParams, base: &Transform, t: f32) -> Transform {
    let before = flight_point(p, base.position, t - FLIGHT_PROBE);
    let now = flight_point(p, base.position, t);
    let after = flight_point(p, base.position, t + FLIGHT_PROBE);

    let heading = heading_towards(after - before).unwrap_or(base.rotation.y);
    let turn_rate = match (heading_towards(now - before), heading_towards(after - now)) {
        (Some(h0), Some(h1)) => shortest_arc(h0, h1) / FLIGHT_PROBE,
        _ => 0.0,
    };
    let max_bank = p.max_bank.abs();
    Transform {
        position: now,
        rotation: Vec3::new(
            (t * p.pitch_rate).cos() * p.pitch_amount,
            heading,
            (-turn_rate * p.bank_gain).clamp(-max_bank, max_bank),
        ),
        scale: base.scale,
    }
}

fn billboard(base: &Transform, viewer: Vec3) -> Transform {
    let mut pose = *base;
    if let Some(yaw) = heading_towards(viewer - base.position) {
        pose.rotation.y = yaw;
    }
    pose
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::NodeId;
    use crate::scene_graph::{SceneGraph, SceneNode, Visual};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn node() -> NodeId {
        SceneGraph::new().insert(SceneNode::new("n", Transform::default(), Visual::Empty))
    }

    fn step(delta: f32) -> FrameTime {
        FrameTime {
            delta,
            elapsed: 0.0,
        }
    }

    fn run(record: &mut MotionRecord, frames: usize, delta: f32) -> Vec<Transform> {
        let mut rng = StdRng::seed_from_u64(5);
        (0..frames)
            .map(|_| evaluate(record, step(delta), Vec3::ZERO, &mut rng))
            .collect()
    }

    #[test]
    fn orbit_stays_on_its_ring() {
        let params = OrbitParams {
            radius: 40.0,
            radius_sway: 15.0,
            bob_amplitude: 6.0,
            bob_rate: 0.15,
            angular_speed: 0.06,
            ..OrbitParams::default()
        };
        let base = Transform::from_position(Vec3::new(-30.0, 18.0, 15.0));
        let mut record = MotionRecord::with_phase(node(), base, Behavior::Orbit(params), 42.0);
        for pose in run(&mut record, 2000, 0.05) {
            let horizontal = (pose.position - base.position) * Vec3::new(1.0, 0.0, 1.0);
            assert!(horizontal.length() <= 55.0 + 1e-3);
            assert!((pose.position.y - 18.0).abs() <= 6.0 + 1e-3);
        }
    }

    #[test]
    fn pulse_pump_is_never_negative() {
        let params = PulseParams {
            pulse_height: -4.0,
            ..PulseParams::default()
        };
        let mut t = 0.0;
        while t < 60.0 {
            assert!(pump_offset(&params, t) >= 0.0);
            t += 0.01;
        }
    }

    #[test]
    fn pulse_squish_tracks_the_pump() {
        let params = PulseParams::default();
        // sin(t * 1.2) peaks at t = PI / 2.4.
        let peak = std::f32::consts::PI / 2.4;
        let mut record =
            MotionRecord::with_phase(node(), Transform::default(), Behavior::Pulse(params), peak);
        let pose = run(&mut record, 1, 0.0)[0];
        assert!(pose.scale.y > 1.0);
        assert!(pose.scale.x < 1.0);
        assert!((pose.scale.y - (1.0 + params.squish)).abs() < 1e-4);
    }

    #[test]
    fn spin_only_rotates() {
        let base = Transform::from_position(Vec3::new(120.0, 60.0, -140.0));
        let mut record = MotionRecord::with_phase(
            node(),
            base,
            Behavior::Spin(SpinParams {
                rate: 0.5,
                axis: SpinAxis::Z,
            }),
            0.0,
        );
        let poses = run(&mut record, 10, 0.1);
        assert!(poses.iter().all(|p| p.position == base.position));
        assert!((poses[9].rotation.z - 0.5).abs() < 1e-5);
        assert_eq!(poses[9].rotation.y, 0.0);
    }

    #[test]
    fn flight_banks_and_stays_in_envelope() {
        let params = FlightParams::default();
        let base = Transform::from_position(Vec3::new(20.0, 90.0, 10.0));
        let mut record =
            MotionRecord::with_phase(node(), base, Behavior::ComplexFlight(params), 0.0);
        let mut banked = false;
        for pose in run(&mut record, 3000, 0.05) {
            let dx = pose.position.x - base.position.x;
            let dz = pose.position.z - base.position.z;
            assert!(dx.abs() <= 90.0 + 1e-3 && dz.abs() <= 90.0 + 1e-3);
            assert!(pose.position.y >= 2.0 - 1e-3 && pose.position.y <= 58.0 + 1e-3);
            assert!(pose.rotation.z.abs() <= params.max_bank + 1e-6);
            banked |= pose.rotation.z.abs() > 0.05;
        }
        assert!(banked);
    }

    #[test]
    fn zero_sized_parameters_collapse_to_a_point() {
        let params = OrbitParams {
            radius: 0.0,
            height: Some(0.0),
            ..OrbitParams::default()
        };
        let mut record =
            MotionRecord::with_phase(node(), Transform::default(), Behavior::Orbit(params), 0.0);
        for pose in run(&mut record, 50, 0.1) {
            assert_eq!(pose.position, Vec3::ZERO);
        }
    }

    #[test]
    fn non_finite_parameters_fall_back_to_base() {
        let params = DriftParams {
            amplitude: f32::NAN,
            ..DriftParams::default()
        };
        let base = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let mut record = MotionRecord::with_phase(node(), base, Behavior::Drift(params), 0.0);
        let pose = run(&mut record, 1, 0.1)[0];
        assert_eq!(pose, base);
    }

    #[test]
    fn billboard_faces_viewer() {
        let base = Transform::from_position(Vec3::new(0.0, 9.0, -7.0));
        let mut record = MotionRecord::with_phase(node(), base, Behavior::Billboard, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        let pose = evaluate(&mut record, step(0.016), Vec3::new(0.0, 2.0, 12.0), &mut rng);
        assert!(pose.rotation.y.abs() < 1e-6);
        let pose = evaluate(&mut record, step(0.016), Vec3::new(10.0, 2.0, -7.0), &mut rng);
        assert!((pose.rotation.y - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn wander_progress_stays_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(9);
        let params = WanderParams {
            flying: true,
            ..WanderParams::default()
        };
        let behavior = Behavior::wander(Vec3::new(0.0, 40.0, 0.0), params, &mut rng);
        let mut record = MotionRecord::with_phase(node(), Transform::default(), behavior, 0.0);
        let mut reassigned = 0;
        for _ in 0..1000 {
            evaluate(&mut record, step(0.016), Vec3::ZERO, &mut rng);
            let Behavior::Wander { state, .. } = &record.behavior else {
                unreachable!()
            };
            assert!((0.0..=1.0).contains(&state.progress));
            reassigned = state.reassignments;
        }
        assert!(reassigned >= 1);
    }
}
