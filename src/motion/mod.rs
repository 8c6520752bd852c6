mod evaluate;
mod waypoint;

use glam::Vec3;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::FrameTime;
use crate::scene_graph::{NodeId, SceneGraph, Transform};

pub use evaluate::{evaluate, pump_offset};
pub use waypoint::{
    ease_in_out_cubic, heading_towards, shortest_arc, HeightBand, WanderParams, WanderState,
    MAX_WANDER_RADIUS,
};

/// Upper bound of the random phase offset, in seconds of local time.
pub const PHASE_SPAN: f32 = 100.0;

/// Circle (optionally breathing in radius) around the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitParams {
    pub radius: f32,
    /// Absolute height of the circle. `None` keeps the base height.
    pub height: Option<f32>,
    pub angular_speed: f32,
    pub start_angle: f32,
    pub radius_sway: f32,
    pub sway_rate: f32,
    pub bob_amplitude: f32,
    pub bob_rate: f32,
    pub roll_amount: f32,
    pub roll_rate: f32,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            radius: 15.0,
            height: None,
            angular_speed: 0.25,
            start_angle: 0.0,
            radius_sway: 0.0,
            sway_rate: 0.2,
            bob_amplitude: 0.0,
            bob_rate: 0.4,
            roll_amount: 0.0,
            roll_rate: 0.2,
        }
    }
}

/// Jellyfish style drift with a rectified vertical pump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseParams {
    /// Per-axis amplitude of the horizontal drift.
    pub drift_radius: f32,
    pub drift_rate_x: f32,
    pub drift_rate_z: f32,
    pub pulse_rate: f32,
    pub pulse_height: f32,
    pub sway_height: f32,
    pub sway_rate: f32,
    pub spin_rate: f32,
    /// Fractional stretch applied at the top of each pump.
    pub squish: f32,
}

impl Default for PulseParams {
    fn default() -> Self {
        Self {
            drift_radius: 12.0,
            drift_rate_x: 0.15,
            drift_rate_z: 0.12,
            pulse_rate: 1.2,
            pulse_height: 4.0,
            sway_height: 3.0,
            sway_rate: 0.2,
            spin_rate: 0.08,
            squish: 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpinAxis {
    X,
    #[default]
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinParams {
    pub rate: f32,
    pub axis: SpinAxis,
}

impl Default for SpinParams {
    fn default() -> Self {
        Self {
            rate: 0.02,
            axis: SpinAxis::Y,
        }
    }
}

/// Gentle vertical float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftParams {
    pub amplitude: f32,
    pub rate: f32,
    pub yaw_rate: f32,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            amplitude: 0.3,
            rate: 0.5,
            yaw_rate: 0.0,
        }
    }
}

/// Free flight: a wide open loop with swoops, banking and pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightParams {
    pub radius: f32,
    pub radius_sway: f32,
    pub radius_rate: f32,
    pub altitude: f32,
    pub altitude_sway: f32,
    pub altitude_rate: f32,
    pub swoop: f32,
    pub swoop_rate: f32,
    pub angular_speed: f32,
    /// Angular rate of the second horizontal axis relative to the first.
    pub axis_ratio: f32,
    pub bank_gain: f32,
    pub max_bank: f32,
    pub pitch_amount: f32,
    pub pitch_rate: f32,
}

impl Default for FlightParams {
    fn default() -> Self {
        Self {
            radius: 60.0,
            radius_sway: 30.0,
            radius_rate: 0.05,
            altitude: 30.0,
            altitude_sway: 20.0,
            altitude_rate: 0.08,
            swoop: 8.0,
            swoop_rate: 0.5,
            angular_speed: 0.3,
            axis_ratio: 0.7,
            bank_gain: 1.5,
            max_bank: 0.6,
            pitch_amount: 0.2,
            pitch_rate: 0.6,
        }
    }
}

/// Closed set of motion behaviors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Behavior {
    Orbit(OrbitParams),
    Pulse(PulseParams),
    Wander {
        params: WanderParams,
        state: WanderState,
    },
    Spin(SpinParams),
    Drift(DriftParams),
    ComplexFlight(FlightParams),
    /// Turns to face the viewer every frame.
    Billboard,
    Idle,
}

impl Behavior {
    pub fn wander<R: Rng + ?Sized>(start: Vec3, params: WanderParams, rng: &mut R) -> Self {
        Self::Wander {
            state: WanderState::new(start, &params, rng),
            params,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Orbit(_) => "orbit",
            Self::Pulse(_) => "pulse",
            Self::Wander { .. } => "wander",
            Self::Spin(_) => "spin",
            Self::Drift(_) => "drift",
            Self::ComplexFlight(_) => "flight",
            Self::Billboard => "billboard",
            Self::Idle => "idle",
        }
    }
}

/// Binds one scene node to the behavior that moves it.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRecord {
    target: NodeId,
    pub behavior: Behavior,
    base: Transform,
    phase: f32,
    local_time: f32,
}

impl MotionRecord {
    /// Creates a record with a random phase in `[0, PHASE_SPAN)`.
    pub fn new<R: Rng + ?Sized>(
        target: NodeId,
        base: Transform,
        behavior: Behavior,
        rng: &mut R,
    ) -> Self {
        Self::with_phase(target, base, behavior, rng.gen_range(0.0..PHASE_SPAN))
    }

    pub fn with_phase(target: NodeId, base: Transform, behavior: Behavior, phase: f32) -> Self {
        Self {
            target,
            behavior,
            base,
            phase: if phase.is_finite() { phase } else { 0.0 },
            local_time: 0.0,
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn base(&self) -> &Transform {
        &self.base
    }

    pub fn base_position(&self) -> Vec3 {
        self.base.position
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn local_time(&self) -> f32 {
        self.local_time
    }

    /// Time fed into the periodic formulas.
    pub fn effective_time(&self) -> f32 {
        self.local_time + self.phase
    }

    pub(crate) fn tick(&mut self, delta: f32) {
        self.local_time += delta.max(0.0);
    }
}

/// Every motion record of the scene. Each node is driven by at most one record.
#[derive(Debug, Default, Clone)]
pub struct MotionRegistry {
    records: Vec<MotionRecord>,
}

impl MotionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record. Returns `false` if the node already has one.
    pub fn insert(&mut self, record: MotionRecord) -> bool {
        if self.records.iter().any(|r| r.target == record.target) {
            warn!("node {} already has a motion record", record.target);
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn get(&self, target: NodeId) -> Option<&MotionRecord> {
        self.records.iter().find(|r| r.target == target)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Evaluates every record and writes the results into `graph`.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        graph: &mut SceneGraph,
        time: FrameTime,
        viewer: Vec3,
        rng: &mut R,
    ) {
        for record in &mut self.records {
            let pose = evaluate(record, time, viewer, rng);
            if !graph.set_transform(record.target, pose) {
                debug!("motion target {} is missing from the scene", record.target);
            }
        }
    }
}
