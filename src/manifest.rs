use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use rand::Rng;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::assets::LoadPolicy;
use crate::clock::ClockSettings;
use crate::effects::{CelebrationSettings, SpawnerSettings, MIN_SPAWN_INTERVAL};
use crate::interaction::{ActivationKind, InteractionSettings, Label};
use crate::motion::{
    Behavior, DriftParams, FlightParams, OrbitParams, PulseParams, SpinAxis, SpinParams,
    WanderParams, MAX_WANDER_RADIUS,
};
use crate::player::PlayerSettings;
use crate::scene_graph::{Shape, Transform};

/// Every tunable of a scene. Missing elements keep their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub interaction: InteractionSettings,
    pub player: PlayerSettings,
    pub clock: ClockSettings,
    pub loading: LoadPolicy,
    pub celebration: CelebrationSettings,
    pub shooting_stars: SpawnerSettings,
}

/// Motion as written in the manifest. Wander state is only created when the
/// object is placed, see [`MotionSpec::instantiate`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MotionSpec {
    Orbit(OrbitParams),
    Pulse(PulseParams),
    Wander(WanderParams),
    Spin(SpinParams),
    Drift(DriftParams),
    Flight(FlightParams),
    Billboard,
    #[default]
    Idle,
}

impl MotionSpec {
    pub fn instantiate<R: Rng + ?Sized>(&self, start: Vec3, rng: &mut R) -> Behavior {
        match *self {
            Self::Orbit(p) => Behavior::Orbit(p),
            Self::Pulse(p) => Behavior::Pulse(p),
            Self::Wander(p) => Behavior::wander(start, p, rng),
            Self::Spin(p) => Behavior::Spin(p),
            Self::Drift(p) => Behavior::Drift(p),
            Self::Flight(p) => Behavior::ComplexFlight(p),
            Self::Billboard => Behavior::Billboard,
            Self::Idle => Behavior::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProceduralSpec {
    pub shape: Shape,
    /// Shown while the model loads and superseded by it on success.
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractSpec {
    pub kind: ActivationKind,
    pub label: Label,
}

/// Extra instance of a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloneSpec {
    pub position: Vec3,
    pub scale_min: f32,
    pub scale_max: f32,
}

impl CloneSpec {
    pub fn sample_scale<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let (lo, hi) = if self.scale_min <= self.scale_max {
            (self.scale_min, self.scale_max)
        } else {
            (self.scale_max, self.scale_min)
        };
        if hi - lo <= f32::EPSILON {
            lo
        } else {
            rng.gen_range(lo..=hi)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    /// Ordered fallback candidates; the first that loads wins.
    pub models: Vec<String>,
    pub procedural: Option<ProceduralSpec>,
    pub transform: Transform,
    pub animate: bool,
    pub motion: MotionSpec,
    pub interact: Option<InteractSpec>,
    pub clones: Vec<CloneSpec>,
}

/// Parsed scene manifest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneManifest {
    pub settings: SceneSettings,
    pub objects: Vec<ObjectSpec>,
    /// Ambient track candidates, probed in order.
    pub tracks: Vec<String>,
}

impl SceneManifest {
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene manifest XML")?;
        let root = document.root_element();

        let settings = match child(&root, "settings") {
            Some(node) => parse_settings(&node).context("invalid <settings>")?,
            None => SceneSettings::default(),
        };

        let mut seen = HashSet::new();
        let mut objects = Vec::new();
        for (index, node) in root
            .descendants()
            .filter(|n| n.has_tag_name("object"))
            .enumerate()
        {
            let object =
                parse_object(&node).with_context(|| format!("invalid <object> #{}", index + 1))?;
            if !seen.insert(object.name.clone()) {
                bail!("duplicate object name `{}`", object.name);
            }
            objects.push(object);
        }

        let tracks = child(&root, "audio")
            .map(|audio| {
                audio
                    .children()
                    .filter(|n| n.has_tag_name("track"))
                    .filter_map(|n| n.text())
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            settings,
            objects,
            tracks,
        })
    }

    pub fn object(&self, name: &str) -> Option<&ObjectSpec> {
        self.objects.iter().find(|object| object.name == name)
    }
}

fn parse_settings(node: &Node<'_, '_>) -> Result<SceneSettings> {
    let mut settings = SceneSettings::default();

    if let Some(n) = child(node, "interaction") {
        let a = Attrs(n);
        let s = &mut settings.interaction;
        s.range = a.f32("range", s.range)?;
        s.alignment = a.f32("alignment", s.alignment)?;
        if let Some(prompt) = n.attribute("prompt") {
            s.prompt_suffix = prompt.to_string();
        }
    }

    if let Some(n) = child(node, "player") {
        let a = Attrs(n);
        let s = &mut settings.player;
        s.start = a.vec3("start", s.start)?;
        s.start_yaw = a.f32("yaw", s.start_yaw)?;
        s.speed = a.f32("speed", s.speed)?;
        s.boundary_radius = a.f32("boundary", s.boundary_radius)?;
        s.inner_radius = a.f32("inner", s.inner_radius)?;
        s.pitch_limit = a.f32("pitch-limit", s.pitch_limit)?;
        s.look_sensitivity = a.f32("sensitivity", s.look_sensitivity)?;
        if s.inner_radius > s.boundary_radius {
            bail!("player inner radius exceeds the boundary");
        }
    }

    if let Some(n) = child(node, "clock") {
        let a = Attrs(n);
        settings.clock.max_delta = a.f32("max-delta", settings.clock.max_delta)?;
    }

    if let Some(n) = child(node, "loading") {
        let a = Attrs(n);
        let seconds = a.f32("deadline", settings.loading.deadline.as_secs_f32())?;
        settings.loading.deadline = Duration::try_from_secs_f32(seconds.max(0.0))
            .context("loading deadline out of range")?;
    }

    if let Some(n) = child(node, "celebration") {
        let a = Attrs(n);
        let s = &mut settings.celebration;
        s.delay = a.f32("delay", s.delay)?;
        s.banner = a.f32("banner", s.banner)?;
        s.bursts = a.u32("bursts", s.bursts)?;
        s.burst_interval = a.f32("interval", s.burst_interval)?;
        s.burst_lifetime = a.f32("lifetime", s.burst_lifetime)?;
        s.particles = a.u32("particles", s.particles)?;
    }

    if let Some(n) = child(node, "shooting-stars") {
        let a = Attrs(n);
        let s = &mut settings.shooting_stars;
        s.enabled = a.bool("enabled", s.enabled)?;
        s.interval = a.f32("interval", s.interval)?;
        s.lifetime = a.f32("lifetime", s.lifetime)?;
        if s.interval < MIN_SPAWN_INTERVAL {
            bail!("shooting-star interval must be at least {MIN_SPAWN_INTERVAL}s");
        }
    }

    Ok(settings)
}

fn parse_object(node: &Node<'_, '_>) -> Result<ObjectSpec> {
    let name = node
        .attribute("name")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("object is missing a name attribute"))?
        .to_string();

    parse_object_body(node, &name).with_context(|| format!("object `{name}`"))
}

fn parse_object_body(node: &Node<'_, '_>, name: &str) -> Result<ObjectSpec> {
    let models = node
        .children()
        .filter(|n| n.has_tag_name("model"))
        .filter_map(|n| n.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect();

    let procedural = child(node, "procedural")
        .map(|n| parse_procedural(&n))
        .transpose()
        .context("invalid <procedural>")?;

    let mut transform = Transform::default();
    transform.position = parse_vec3(optional_text(node, "position"), transform.position)
        .context("invalid <position>")?;
    transform.rotation = parse_vec3(optional_text(node, "rotation"), transform.rotation)
        .context("invalid <rotation>")?;
    transform.scale =
        parse_scale(optional_text(node, "scale"), transform.scale).context("invalid <scale>")?;

    let animate = parse_bool(optional_text(node, "animate"), true).context("invalid <animate>")?;

    let motion = match child(node, "motion") {
        Some(n) => parse_motion(&n).context("invalid <motion>")?,
        None => MotionSpec::Idle,
    };

    let interact = child(node, "interact")
        .map(|n| parse_interact(&n))
        .transpose()
        .context("invalid <interact>")?;

    let clones = node
        .children()
        .filter(|n| n.has_tag_name("clone"))
        .map(|n| parse_clone(&n))
        .collect::<Result<Vec<_>>>()
        .context("invalid <clone>")?;

    Ok(ObjectSpec {
        name: name.to_string(),
        models,
        procedural,
        transform,
        animate,
        motion,
        interact,
        clones,
    })
}

fn parse_procedural(node: &Node<'_, '_>) -> Result<ProceduralSpec> {
    let a = Attrs(*node);
    let shape = match node.attribute("shape").unwrap_or("sphere") {
        "sphere" => Shape::Sphere {
            radius: a.f32("radius", 1.0)?,
        },
        "ring" => Shape::Ring {
            inner: a.f32("inner", 1.0)?,
            outer: a.f32("outer", 2.0)?,
        },
        "plane" => Shape::Plane {
            width: a.f32("width", 1.0)?,
            height: a.f32("height", 1.0)?,
        },
        other => bail!("unknown shape `{other}`"),
    };
    Ok(ProceduralSpec {
        shape,
        placeholder: a.bool("placeholder", false)?,
    })
}

fn parse_motion(node: &Node<'_, '_>) -> Result<MotionSpec> {
    let a = Attrs(*node);
    let kind = node.attribute("kind").unwrap_or("idle");
    let spec = match kind {
        "orbit" => {
            let d = OrbitParams::default();
            MotionSpec::Orbit(OrbitParams {
                radius: a.f32("radius", d.radius)?,
                height: a.opt_f32("height")?,
                angular_speed: a.f32("speed", d.angular_speed)?,
                start_angle: a.f32("start-angle", d.start_angle)?,
                radius_sway: a.f32("radius-sway", d.radius_sway)?,
                sway_rate: a.f32("sway-rate", d.sway_rate)?,
                bob_amplitude: a.f32("bob", d.bob_amplitude)?,
                bob_rate: a.f32("bob-rate", d.bob_rate)?,
                roll_amount: a.f32("roll", d.roll_amount)?,
                roll_rate: a.f32("roll-rate", d.roll_rate)?,
            })
        }
        "pulse" => {
            let d = PulseParams::default();
            MotionSpec::Pulse(PulseParams {
                drift_radius: a.f32("drift-radius", d.drift_radius)?,
                drift_rate_x: a.f32("drift-rate-x", d.drift_rate_x)?,
                drift_rate_z: a.f32("drift-rate-z", d.drift_rate_z)?,
                pulse_rate: a.f32("pulse-rate", d.pulse_rate)?,
                pulse_height: a.f32("pulse-height", d.pulse_height)?,
                sway_height: a.f32("sway-height", d.sway_height)?,
                sway_rate: a.f32("sway-rate", d.sway_rate)?,
                spin_rate: a.f32("spin-rate", d.spin_rate)?,
                squish: a.f32("squish", d.squish)?,
            })
        }
        "wander" => {
            let d = WanderParams::default();
            let params = WanderParams {
                waypoint_speed: a.f32("speed", d.waypoint_speed)?,
                inner_radius: a.f32("inner", d.inner_radius)?,
                outer_radius: a.f32("outer", d.outer_radius)?,
                flying: a.bool("flying", d.flying)?,
                wander_amplitude: a.f32("amplitude", d.wander_amplitude)?,
                wander_rate: a.f32("rate", d.wander_rate)?,
                tilt_amount: a.f32("tilt", d.tilt_amount)?,
                turn_rate: a.f32("turn-rate", d.turn_rate)?,
            };
            for radius in [params.inner_radius, params.outer_radius] {
                if radius.abs() > MAX_WANDER_RADIUS {
                    bail!("wander radius {radius} exceeds {MAX_WANDER_RADIUS}");
                }
            }
            MotionSpec::Wander(params)
        }
        "spin" => {
            let d = SpinParams::default();
            let axis = match node.attribute("axis").unwrap_or("y") {
                "x" | "X" => SpinAxis::X,
                "y" | "Y" => SpinAxis::Y,
                "z" | "Z" => SpinAxis::Z,
                other => bail!("unknown spin axis `{other}`"),
            };
            MotionSpec::Spin(SpinParams {
                rate: a.f32("rate", d.rate)?,
                axis,
            })
        }
        "drift" | "float" => {
            let d = DriftParams::default();
            MotionSpec::Drift(DriftParams {
                amplitude: a.f32("amplitude", d.amplitude)?,
                rate: a.f32("rate", d.rate)?,
                yaw_rate: a.f32("yaw-rate", d.yaw_rate)?,
            })
        }
        "flight" => {
            let d = FlightParams::default();
            MotionSpec::Flight(FlightParams {
                radius: a.f32("radius", d.radius)?,
                radius_sway: a.f32("radius-sway", d.radius_sway)?,
                radius_rate: a.f32("radius-rate", d.radius_rate)?,
                altitude: a.f32("altitude", d.altitude)?,
                altitude_sway: a.f32("altitude-sway", d.altitude_sway)?,
                altitude_rate: a.f32("altitude-rate", d.altitude_rate)?,
                swoop: a.f32("swoop", d.swoop)?,
                swoop_rate: a.f32("swoop-rate", d.swoop_rate)?,
                angular_speed: a.f32("speed", d.angular_speed)?,
                axis_ratio: a.f32("axis-ratio", d.axis_ratio)?,
                bank_gain: a.f32("bank-gain", d.bank_gain)?,
                max_bank: a.f32("max-bank", d.max_bank)?,
                pitch_amount: a.f32("pitch", d.pitch_amount)?,
                pitch_rate: a.f32("pitch-rate", d.pitch_rate)?,
            })
        }
        "billboard" => MotionSpec::Billboard,
        "idle" | "none" => MotionSpec::Idle,
        other => bail!("unknown motion kind `{other}`"),
    };
    Ok(spec)
}

fn parse_interact(node: &Node<'_, '_>) -> Result<InteractSpec> {
    let kind = match node.attribute("kind").unwrap_or("info") {
        "info" => ActivationKind::ShowNarrative,
        "letter" => ActivationKind::OpenSpecialModal,
        other => bail!("unknown interaction kind `{other}`"),
    };
    let name = node
        .attribute("name")
        .ok_or_else(|| anyhow!("interaction is missing a name attribute"))?;
    Ok(InteractSpec {
        kind,
        label: Label {
            name: name.to_string(),
            description: node.attribute("description").unwrap_or_default().to_string(),
            fact: node
                .attribute("fact")
                .filter(|fact| !fact.is_empty())
                .map(str::to_string),
        },
    })
}

fn parse_clone(node: &Node<'_, '_>) -> Result<CloneSpec> {
    let a = Attrs(*node);
    let position = node
        .attribute("position")
        .ok_or_else(|| anyhow!("clone is missing a position"))?;
    Ok(CloneSpec {
        position: parse_vec3(Some(position.to_string()), Vec3::ZERO)?,
        scale_min: a.f32("scale-min", 1.0)?,
        scale_max: a.f32("scale-max", 1.0)?,
    })
}

/// Attribute accessors that keep defaults for missing attributes.
struct Attrs<'a, 'input>(Node<'a, 'input>);

impl Attrs<'_, '_> {
    fn f32(&self, name: &str, default: f32) -> Result<f32> {
        Ok(self.opt_f32(name)?.unwrap_or(default))
    }

    fn opt_f32(&self, name: &str) -> Result<Option<f32>> {
        self.0
            .attribute(name)
            .map(|value| parse_f32(value).with_context(|| format!("attribute `{name}`")))
            .transpose()
    }

    fn u32(&self, name: &str, default: u32) -> Result<u32> {
        match self.0.attribute(name) {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|err| anyhow!("attribute `{name}`: {err}")),
            None => Ok(default),
        }
    }

    fn bool(&self, name: &str, default: bool) -> Result<bool> {
        parse_bool(self.0.attribute(name).map(str::to_string), default)
            .with_context(|| format!("attribute `{name}`"))
    }

    fn vec3(&self, name: &str, default: Vec3) -> Result<Vec3> {
        parse_vec3(self.0.attribute(name).map(str::to_string), default)
            .with_context(|| format!("attribute `{name}`"))
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_f32(value: &str) -> Result<f32> {
    let number = value
        .trim()
        .parse::<f32>()
        .map_err(|err| anyhow!("failed to parse float `{value}`: {err}"))?;
    if !number.is_finite() {
        bail!("`{value}` is not a finite number");
    }
    Ok(number)
}

fn parse_components(value: &str) -> Result<Vec<f32>> {
    value.split_whitespace().map(parse_f32).collect()
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_components(&value)?.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("expected three components, got `{value}`")),
    }
}

/// Accepts a single uniform factor or three components.
fn parse_scale(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    match parse_components(&value)?.as_slice() {
        [s] => Ok(Vec3::splat(*s)),
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("expected one or three components, got `{value}`")),
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(anyhow!("expected a boolean, got `{other}`")),
    }
}
