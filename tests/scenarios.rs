use std::f32::consts::FRAC_PI_2;

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use home_walkthrough::audio::SilentAudioSink;
use home_walkthrough::motion::{
    pump_offset, DriftParams, OrbitParams, PulseParams, SpinParams, WanderParams, WanderState,
};
use home_walkthrough::{
    evaluate, resolve_target, Action, ActivationKind, Behavior, CameraPose, FrameTime,
    InputFrame, InteractableEntry, InteractionRegistry, Label, MotionRecord, MoveIntent, NodeId,
    PlayerPose, PlayerSettings, RenderSink, SceneContext, SceneGraph, SceneNode, SceneSettings,
    Transform, UiCommand, Visual,
};

fn step(delta: f32) -> FrameTime {
    FrameTime {
        delta,
        elapsed: 0.0,
    }
}

fn place(graph: &mut SceneGraph, name: &str, position: Vec3) -> NodeId {
    graph.insert(SceneNode::new(
        name,
        Transform::from_position(position),
        Visual::Empty,
    ))
}

fn info_entry(target: NodeId, name: &str) -> InteractableEntry {
    InteractableEntry::new(target, Label::named(name), ActivationKind::ShowNarrative)
}

#[test]
fn orbit_starts_on_its_radius_and_turns_a_quarter() {
    let mut graph = SceneGraph::new();
    let base = Transform::from_position(Vec3::new(-2.0, 0.0, 5.0));
    let node = graph.insert(SceneNode::new("balloon", base, Visual::Empty));
    let params = OrbitParams {
        radius: 15.0,
        height: Some(8.0),
        ..OrbitParams::default()
    };
    let mut record = MotionRecord::with_phase(node, base, Behavior::Orbit(params), 0.0);
    let mut rng = StdRng::seed_from_u64(1);

    let start = evaluate(&mut record, step(0.0), Vec3::ZERO, &mut rng);
    assert!((start.position - Vec3::new(13.0, 8.0, 5.0)).length() < 1e-4);

    let quarter = FRAC_PI_2 / params.angular_speed;
    let turned = evaluate(&mut record, step(quarter), Vec3::ZERO, &mut rng);
    assert!((turned.position - Vec3::new(-2.0, 8.0, 20.0)).length() < 1e-3);
}

#[test]
fn nearest_aligned_entry_wins_regardless_of_order() {
    let mut graph = SceneGraph::new();
    let far = place(&mut graph, "far", Vec3::new(0.0, 0.0, -9.0));
    let near = place(&mut graph, "near", Vec3::new(0.0, 0.0, -5.0));

    let mut registry = InteractionRegistry::new();
    registry.register(info_entry(far, "far"));
    let near_id = registry.register(info_entry(near, "near"));

    let hit = resolve_target(Vec3::ZERO, Vec3::NEG_Z, &registry, &graph, 12.0, 0.4)
        .expect("both entries are in range");
    assert_eq!(hit.entry, near_id);
    assert!((hit.distance - 5.0).abs() < 1e-5);
    assert!((hit.alignment - 1.0).abs() < 1e-5);
}

#[test]
fn off_axis_or_distant_entries_are_never_returned() {
    let mut graph = SceneGraph::new();
    let beside = place(&mut graph, "beside", Vec3::new(3.0, 0.0, 0.0));
    let mut registry = InteractionRegistry::new();
    registry.register(info_entry(beside, "beside"));
    assert_eq!(
        resolve_target(Vec3::ZERO, Vec3::NEG_Z, &registry, &graph, 12.0, 0.5),
        None
    );

    let mut graph = SceneGraph::new();
    let distant = place(&mut graph, "distant", Vec3::new(0.0, 0.0, -20.0));
    let mut registry = InteractionRegistry::new();
    registry.register(info_entry(distant, "distant"));
    assert_eq!(
        resolve_target(Vec3::ZERO, Vec3::NEG_Z, &registry, &graph, 15.0, 0.4),
        None
    );
    assert!(resolve_target(Vec3::ZERO, Vec3::NEG_Z, &registry, &graph, 20.0, 0.4).is_some());
}

#[test]
fn wander_reassigns_waypoints_over_a_thousand_frames() {
    let mut rng = StdRng::seed_from_u64(21);
    let params = WanderParams {
        waypoint_speed: 0.2,
        ..WanderParams::default()
    };
    let mut graph = SceneGraph::new();
    let node = place(&mut graph, "dog", Vec3::ZERO);
    let behavior = Behavior::wander(Vec3::new(0.0, 10.0, 0.0), params, &mut rng);
    let mut record = MotionRecord::new(node, Transform::default(), behavior, &mut rng);

    let mut reassignments = 0;
    for _ in 0..1000 {
        evaluate(&mut record, step(0.016), Vec3::ZERO, &mut rng);
        let Behavior::Wander { state, .. } = &record.behavior else {
            panic!("behavior changed kind");
        };
        assert!((0.0..=1.0).contains(&state.progress));
        reassignments = state.reassignments;
    }
    assert!(reassignments >= 1);
}

#[test]
fn periodic_behaviors_stay_in_their_bounds() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut graph = SceneGraph::new();
    let base = Transform::from_position(Vec3::new(4.0, 6.0, -3.0));
    let node = graph.insert(SceneNode::new("thing", base, Visual::Empty));

    let orbit = OrbitParams {
        radius: 15.0,
        height: Some(8.0),
        ..OrbitParams::default()
    };
    let pulse = PulseParams::default();
    let drift = DriftParams::default();

    for behavior in [
        Behavior::Orbit(orbit),
        Behavior::Pulse(pulse),
        Behavior::Drift(drift),
        Behavior::Spin(SpinParams::default()),
    ] {
        let mut record = MotionRecord::new(node, base, behavior, &mut rng);
        for _ in 0..2000 {
            let delta = rng.gen_range(0.0..0.1);
            let pose = evaluate(&mut record, step(delta), Vec3::ZERO, &mut rng);
            let offset = pose.position - base.position;
            match &record.behavior {
                Behavior::Orbit(_) => {
                    let ring = Vec2::new(offset.x, offset.z).length();
                    assert!((ring - 15.0).abs() < 1e-3);
                    assert!((pose.position.y - 8.0).abs() < 1e-5);
                }
                Behavior::Pulse(p) => {
                    assert!(offset.x.abs() <= p.drift_radius + 1e-3);
                    assert!(offset.z.abs() <= p.drift_radius + 1e-3);
                    assert!(offset.y >= -p.sway_height - 1e-3);
                    assert!(offset.y <= p.pulse_height + p.sway_height + 1e-3);
                }
                Behavior::Drift(p) => {
                    assert_eq!((offset.x, offset.z), (0.0, 0.0));
                    assert!(offset.y.abs() <= p.amplitude + 1e-5);
                }
                _ => assert_eq!(pose.position, base.position),
            }
        }
    }
}

#[test]
fn pump_term_is_rectified() {
    let params = PulseParams::default();
    let mut t = -50.0;
    while t < 50.0 {
        assert!(pump_offset(&params, t) >= 0.0);
        t += 0.037;
    }
}

#[test]
fn wander_leg_completes_and_resets_progress() {
    let mut rng = StdRng::seed_from_u64(8);
    let params = WanderParams::default();
    let mut state = WanderState::new(Vec3::ZERO, &params, &mut rng);
    let target = state.target;

    let mut steps = 0;
    let mut last = state.progress;
    loop {
        steps += 1;
        assert!(steps < 1000, "leg never finished");
        if state.advance(0.016, &params, &mut rng) {
            break;
        }
        assert!(state.progress > last);
        last = state.progress;
    }
    assert_eq!(state.progress, 0.0);
    assert_eq!(state.current, target);
    assert_eq!(state.reassignments, 1);
}

#[test]
fn player_never_leaves_the_platform() {
    let settings = PlayerSettings::default();
    let mut pose = PlayerPose::new(&settings);
    let mut rng = StdRng::seed_from_u64(77);
    for _ in 0..5000 {
        let intent = MoveIntent {
            forward: rng.gen_bool(0.7),
            back: rng.gen_bool(0.1),
            left: rng.gen_bool(0.3),
            right: rng.gen_bool(0.3),
        };
        pose.look(rng.gen_range(-40.0..40.0), rng.gen_range(-5.0..5.0), &settings);
        pose.walk(intent, rng.gen_range(0.0..0.1), &settings);
        assert!(pose.horizontal_distance() <= settings.boundary_radius + 1e-3);
    }
}

struct NoRender;

impl RenderSink for NoRender {
    fn render(&mut self, _camera: &CameraPose, _scene: &SceneGraph) {}
}

#[test]
fn celebration_runs_once_across_repeated_letter_reads() {
    let mut ctx = SceneContext::new(SceneSettings::default(), StdRng::seed_from_u64(2));
    let node = place(&mut ctx.graph, "postbox", Vec3::new(0.0, 2.0, 6.0));
    ctx.interactions.register(InteractableEntry::new(
        node,
        Label::named("Postbox"),
        ActivationKind::OpenSpecialModal,
    ));

    let mut ui = Vec::<UiCommand>::new();
    ctx.finish_loading(&mut ui);
    assert!(ctx.enter(&mut SilentAudioSink::default(), &mut ui));

    let press = |action: Action| InputFrame {
        pressed: vec![action],
        look_locked: true,
        ..InputFrame::default()
    };
    for _ in 0..2 {
        ctx.frame(1.0 / 60.0, &press(Action::Interact), &mut ui, &mut NoRender);
        assert!(ctx.modal.is_open());
        ctx.frame(1.0 / 60.0, &press(Action::Cancel), &mut ui, &mut NoRender);
        assert!(!ctx.modal.is_open());
    }
    for _ in 0..600 {
        ctx.frame(1.0 / 60.0, &InputFrame::default(), &mut ui, &mut NoRender);
    }

    let banners = ui.iter().filter(|c| **c == UiCommand::ShowBanner).count();
    assert_eq!(banners, 1);
    assert!(ui.contains(&UiCommand::ShowPrompt {
        text: "Postbox - Press E".into()
    }));
    assert!(ctx.celebration.is_finished());
}
