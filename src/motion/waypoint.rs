use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest waypoint radius. Keeps the squared radii finite.
pub const MAX_WANDER_RADIUS: f32 = 10_000.0;

/// Vertical band new waypoints are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightBand {
    pub min: f32,
    pub max: f32,
}

impl HeightBand {
    pub const SKY: Self = Self {
        min: 25.0,
        max: 60.0,
    };
    pub const MID: Self = Self {
        min: 6.0,
        max: 20.0,
    };

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let (lo, hi) = ordered(self.min, self.max);
        if hi - lo <= f32::EPSILON {
            lo
        } else {
            rng.gen_range(lo..hi)
        }
    }
}

/// Tunables of the waypoint wanderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WanderParams {
    /// Progress gained per second; one leg takes `1 / waypoint_speed` seconds.
    pub waypoint_speed: f32,
    pub inner_radius: f32,
    pub outer_radius: f32,
    /// Flying wanderers pick waypoints in the sky band, others in the mid band.
    pub flying: bool,
    pub wander_amplitude: f32,
    pub wander_rate: f32,
    pub tilt_amount: f32,
    /// Exponential approach rate of the heading towards the travel direction.
    pub turn_rate: f32,
}

impl Default for WanderParams {
    fn default() -> Self {
        Self {
            waypoint_speed: 0.2,
            inner_radius: 10.0,
            outer_radius: 40.0,
            flying: false,
            wander_amplitude: 0.6,
            wander_rate: 1.3,
            tilt_amount: 0.3,
            turn_rate: 2.0,
        }
    }
}

impl WanderParams {
    pub fn band(&self) -> HeightBand {
        if self.flying {
            HeightBand::SKY
        } else {
            HeightBand::MID
        }
    }

    /// Uniform point in the annulus around the origin, height from the band.
    pub fn sample_waypoint<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let (inner, outer) = ordered(
            self.inner_radius.abs().min(MAX_WANDER_RADIUS),
            self.outer_radius.abs().min(MAX_WANDER_RADIUS),
        );
        let r_squared = if outer - inner <= f32::EPSILON {
            outer * outer
        } else {
            rng.gen_range(inner * inner..outer * outer)
        };
        let radius = r_squared.sqrt();
        let theta = rng.gen_range(0.0..TAU);
        Vec3::new(
            radius * theta.cos(),
            self.band().sample(rng),
            radius * theta.sin(),
        )
    }
}

/// Mutable leg state of a wanderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WanderState {
    pub current: Vec3,
    pub target: Vec3,
    /// Always within `[0, 1]`.
    pub progress: f32,
    pub heading: f32,
    pub reassignments: u32,
}

impl WanderState {
    pub fn new<R: Rng + ?Sized>(start: Vec3, params: &WanderParams, rng: &mut R) -> Self {
        let target = params.sample_waypoint(rng);
        Self {
            current: start,
            target,
            progress: 0.0,
            heading: heading_towards(target - start).unwrap_or(0.0),
            reassignments: 0,
        }
    }

    /// Point on the eased path between the two waypoints.
    pub fn path_point(&self) -> Vec3 {
        self.current
            .lerp(self.target, ease_in_out_cubic(self.progress))
    }

    /// Advances the leg by `delta` seconds and starts a new leg on arrival.
    ///
    /// Returns `true` if a new waypoint was assigned.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        delta: f32,
        params: &WanderParams,
        rng: &mut R,
    ) -> bool {
        let step = (delta * params.waypoint_speed.abs()).max(0.0);
        self.progress = (self.progress + step).min(1.0);
        if self.progress < 1.0 {
            return false;
        }
        self.current = self.target;
        self.target = params.sample_waypoint(rng);
        self.progress = 0.0;
        self.reassignments += 1;
        true
    }

    /// Turns the heading towards the travel direction without snapping.
    pub fn steer(&mut self, delta: f32, turn_rate: f32) {
        let Some(desired) = heading_towards(self.target - self.current) else {
            return;
        };
        let blend = 1.0 - (-turn_rate.abs() * delta.max(0.0)).exp();
        self.heading += shortest_arc(self.heading, desired) * blend;
    }

    /// Relative speed along the eased path, 0 at the waypoints and 1 mid-leg.
    pub fn speed_factor(&self) -> f32 {
        (ease_in_out_cubic_slope(self.progress) / 1.5).clamp(0.0, 1.0)
    }
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

fn ease_in_out_cubic_slope(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        12.0 * t * t
    } else {
        3.0 * (-2.0 * t + 2.0).powi(2)
    }
}

/// Yaw that faces along `direction` in the horizontal plane.
pub fn heading_towards(direction: Vec3) -> Option<f32> {
    if direction.x.abs() <= f32::EPSILON && direction.z.abs() <= f32::EPSILON {
        None
    } else {
        Some(direction.x.atan2(direction.z))
    }
}

/// Signed angle from `from` to `to`, wrapped into `(-PI, PI]`.
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    let diff = (to - from).rem_euclid(TAU);
    if diff > PI {
        diff - TAU
    } else {
        diff
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn easing_hits_endpoints_and_midpoint() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-6);
        assert!(ease_in_out_cubic(0.25) < 0.25);
    }

    #[test]
    fn sampled_waypoints_stay_in_annulus_and_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for flying in [false, true] {
            let params = WanderParams {
                flying,
                ..WanderParams::default()
            };
            let band = params.band();
            for _ in 0..500 {
                let p = params.sample_waypoint(&mut rng);
                let horizontal = (p.x * p.x + p.z * p.z).sqrt();
                assert!(horizontal >= params.inner_radius - 1e-3);
                assert!(horizontal <= params.outer_radius + 1e-3);
                assert!(p.y >= band.min && p.y <= band.max);
            }
        }
    }

    #[test]
    fn huge_radii_are_capped() {
        let mut rng = StdRng::seed_from_u64(12);
        let params = WanderParams {
            inner_radius: 1e19,
            outer_radius: 1e20,
            ..WanderParams::default()
        };
        let p = params.sample_waypoint(&mut rng);
        assert!(p.is_finite());
        assert!((p.x * p.x + p.z * p.z).sqrt() <= MAX_WANDER_RADIUS * 1.001);
    }

    #[test]
    fn arrival_resets_progress_to_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = WanderParams {
            waypoint_speed: 0.5,
            ..WanderParams::default()
        };
        let mut state = WanderState::new(Vec3::ZERO, &params, &mut rng);
        let goal = state.target;
        assert!(!state.advance(1.0, &params, &mut rng));
        assert!((state.progress - 0.5).abs() < 1e-6);
        assert!(state.advance(1.5, &params, &mut rng));
        assert_eq!(state.progress, 0.0);
        assert_eq!(state.current, goal);
        assert_eq!(state.reassignments, 1);
    }

    #[test]
    fn steering_approaches_heading_smoothly() {
        let mut state = WanderState {
            current: Vec3::ZERO,
            target: Vec3::new(10.0, 0.0, 0.0),
            progress: 0.0,
            heading: 0.0,
            reassignments: 0,
        };
        let desired = std::f32::consts::FRAC_PI_2;
        state.steer(0.016, 2.0);
        assert!(state.heading > 0.0 && state.heading < desired);
        for _ in 0..1000 {
            state.steer(0.016, 2.0);
        }
        assert!((state.heading - desired).abs() < 1e-3);
    }

    #[test]
    fn shortest_arc_wraps() {
        assert!((shortest_arc(3.0, -3.0) - (TAU - 6.0)).abs() < 1e-5);
        assert!((shortest_arc(-3.0, 3.0) + (TAU - 6.0)).abs() < 1e-5);
    }
}
