use std::fmt;

use glam::Vec3;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::audio::{AmbientPlaylist, AudioSink};
use crate::clock::{Clock, FrameTime};
use crate::effects::{Celebration, PeriodicSpawner};
use crate::input::{Action, InputFrame};
use crate::interaction::{activate, resolve_target, InteractableEntry, InteractionRegistry, Targeting};
use crate::manifest::SceneSettings;
use crate::motion::MotionRegistry;
use crate::player::PlayerPose;
use crate::scene_graph::SceneGraph;
use crate::ui::{ModalClosed, ModalController, UiCommand, UiSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    /// Models are still settling.
    #[default]
    Loading,
    /// Loaded, waiting for the player to enter.
    Menu,
    Active,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Menu => "menu",
            Self::Active => "active",
        })
    }
}

/// Camera handed to the renderer each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub forward: Vec3,
}

impl CameraPose {
    pub fn from_player(player: &PlayerPose) -> Self {
        Self {
            position: player.position,
            yaw: player.yaw,
            pitch: player.pitch,
            forward: player.forward(),
        }
    }
}

/// Consumer of the finished frame. Drawing is entirely its business.
pub trait RenderSink {
    fn render(&mut self, camera: &CameraPose, scene: &SceneGraph);
}

/// All mutable state of a running walkthrough.
///
/// Owned by one controller (the CLI loop or the web front end) and passed
/// explicitly to every update.
#[derive(Debug)]
pub struct SceneContext {
    pub settings: SceneSettings,
    pub graph: SceneGraph,
    pub motions: MotionRegistry,
    pub interactions: InteractionRegistry,
    pub player: PlayerPose,
    pub clock: Clock,
    pub modal: ModalController,
    pub targeting: Targeting,
    pub celebration: Celebration,
    pub shooting_stars: PeriodicSpawner,
    pub playlist: AmbientPlaylist,
    pub rng: StdRng,
    phase: GamePhase,
}

impl SceneContext {
    pub fn new(settings: SceneSettings, rng: StdRng) -> Self {
        Self {
            graph: SceneGraph::new(),
            motions: MotionRegistry::new(),
            interactions: InteractionRegistry::new(),
            player: PlayerPose::new(&settings.player),
            clock: Clock::new(settings.clock),
            modal: ModalController::new(),
            targeting: Targeting::default(),
            celebration: Celebration::new(settings.celebration),
            shooting_stars: PeriodicSpawner::new(settings.shooting_stars),
            playlist: AmbientPlaylist::default(),
            rng,
            phase: GamePhase::Loading,
            settings,
        }
    }

    /// Context with an entropy-seeded generator.
    pub fn from_entropy(settings: SceneSettings) -> Self {
        Self::new(settings, StdRng::from_entropy())
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == GamePhase::Active
    }

    fn set_phase(&mut self, phase: GamePhase) {
        if self.phase != phase {
            info!("scene phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Loading -> Menu.
    pub fn finish_loading(&mut self, ui: &mut dyn UiSink) {
        if self.phase == GamePhase::Loading {
            self.set_phase(GamePhase::Menu);
            ui.send(UiCommand::LoadProgress {
                fraction: 1.0,
                status: "Ready".to_string(),
            });
            ui.send(UiCommand::ShowMenu);
        }
    }

    /// Menu -> Active: engages look lock and starts ambient audio if a track is known.
    pub fn enter(&mut self, audio: &mut dyn AudioSink, ui: &mut dyn UiSink) -> bool {
        if self.phase != GamePhase::Menu {
            return false;
        }
        self.set_phase(GamePhase::Active);
        ui.send(UiCommand::EnterScene);
        ui.send(UiCommand::SetLookLock(true));
        if !self.playlist.tracks().is_empty() {
            if let Err(err) = self.playlist.play(audio, ui) {
                debug!("ambient audio did not start: {err}");
            }
        }
        true
    }

    /// Closes the open modal. The first close of the letter starts the celebration.
    pub fn close_modal(&mut self, ui: &mut dyn UiSink) -> Option<ModalClosed> {
        let closed = self.modal.close(self.is_active(), ui)?;
        if closed.first_letter_close {
            self.celebration.trigger(f64::from(self.clock.elapsed()));
        }
        Some(closed)
    }

    pub fn current_target(&self) -> Option<&InteractableEntry> {
        self.targeting
            .current()
            .and_then(|id| self.interactions.get(id))
    }

    pub fn camera(&self) -> CameraPose {
        CameraPose::from_player(&self.player)
    }

    /// Runs one frame.
    ///
    /// Order: clock, player, motion, target resolution, activation, effects,
    /// render. Resolution sees this frame's motion, so the prompt is never a
    /// frame behind the objects.
    pub fn frame(
        &mut self,
        raw_delta: f32,
        input: &InputFrame,
        ui: &mut dyn UiSink,
        render: &mut dyn RenderSink,
    ) -> FrameTime {
        let time = self.clock.advance(raw_delta);
        self.step(time, input, ui, render)
    }

    /// Like [`frame`](Self::frame), timed from an absolute timestamp in
    /// seconds such as `performance.now() / 1000`.
    pub fn frame_at(
        &mut self,
        now_seconds: f64,
        input: &InputFrame,
        ui: &mut dyn UiSink,
        render: &mut dyn RenderSink,
    ) -> FrameTime {
        let time = self.clock.tick_at(now_seconds);
        self.step(time, input, ui, render)
    }

    fn step(
        &mut self,
        time: FrameTime,
        input: &InputFrame,
        ui: &mut dyn UiSink,
        render: &mut dyn RenderSink,
    ) -> FrameTime {
        let active = self.is_active();

        if active && !self.modal.is_open() {
            if input.look_locked {
                let delta = input.pointer_delta;
                self.player.look(delta.x, delta.y, &self.settings.player);
            }
            self.player
                .walk(input.move_intent(), time.delta, &self.settings.player);
        }

        self.graph.advance_clips(time.delta);
        self.motions
            .update(&mut self.graph, time, self.player.position, &mut self.rng);

        if active {
            let candidate = resolve_target(
                self.player.position,
                self.player.forward(),
                &self.interactions,
                &self.graph,
                self.settings.interaction.range,
                self.settings.interaction.alignment,
            );
            self.targeting.update(
                candidate,
                &self.interactions,
                &self.settings.interaction.prompt_suffix,
                ui,
            );
        } else {
            self.targeting.clear(ui);
        }

        for action in &input.pressed {
            match action {
                Action::Interact => {
                    activate(
                        self.targeting.current(),
                        &mut self.interactions,
                        active,
                        &mut self.modal,
                        ui,
                    );
                }
                Action::Cancel => {
                    if self.modal.is_open() {
                        self.close_modal(ui);
                    } else if active && input.look_locked {
                        ui.send(UiCommand::SetLookLock(false));
                    }
                }
                _ => {}
            }
        }

        let now = f64::from(time.elapsed);
        self.celebration.update(now, &mut self.rng, ui);
        if self.phase != GamePhase::Loading {
            self.shooting_stars.update(now, &mut self.rng, ui);
        }

        render.render(&self.camera(), &self.graph);
        time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilentAudioSink;
    use std::f32::consts::FRAC_PI_2;

    use crate::interaction::{ActivationKind, Label};
    use crate::motion::{Behavior, MotionRecord, OrbitParams};
    use crate::scene_graph::{SceneNode, Transform, Visual};
    use crate::ui::ModalKind;

    struct CountingRenderer(usize);

    impl RenderSink for CountingRenderer {
        fn render(&mut self, _camera: &CameraPose, _scene: &SceneGraph) {
            self.0 += 1;
        }
    }

    fn scene_with_letter() -> SceneContext {
        let mut ctx = SceneContext::new(SceneSettings::default(), StdRng::seed_from_u64(1));
        // Player starts at (0, 2, 12) looking down -Z.
        let node = ctx.graph.insert(SceneNode::new(
            "postbox",
            Transform::from_position(Vec3::new(0.0, 2.0, 6.0)),
            Visual::Empty,
        ));
        ctx.interactions.register(InteractableEntry::new(
            node,
            Label::named("Love Letter"),
            ActivationKind::OpenSpecialModal,
        ));
        ctx
    }

    fn press(action: Action) -> InputFrame {
        InputFrame {
            pressed: vec![action],
            look_locked: true,
            ..InputFrame::default()
        }
    }

    #[test]
    fn phases_progress_in_order() {
        let mut ctx = scene_with_letter();
        let mut ui: Vec<UiCommand> = Vec::new();
        let mut audio = SilentAudioSink::default();
        assert!(!ctx.enter(&mut audio, &mut ui));
        ctx.finish_loading(&mut ui);
        assert_eq!(ctx.phase(), GamePhase::Menu);
        assert!(ctx.enter(&mut audio, &mut ui));
        assert_eq!(ctx.phase(), GamePhase::Active);
        assert!(ui.contains(&UiCommand::SetLookLock(true)));
    }

    #[test]
    fn nothing_is_targeted_before_entering() {
        let mut ctx = scene_with_letter();
        let mut ui: Vec<UiCommand> = Vec::new();
        let mut renderer = CountingRenderer(0);
        ctx.finish_loading(&mut ui);
        ctx.frame(0.016, &press(Action::Interact), &mut ui, &mut renderer);
        assert!(ctx.current_target().is_none());
        assert!(!ctx.modal.is_open());
        assert_eq!(renderer.0, 1);
    }

    #[test]
    fn interact_then_cancel_runs_the_letter_flow() {
        let mut ctx = scene_with_letter();
        let mut ui: Vec<UiCommand> = Vec::new();
        let mut audio = SilentAudioSink::default();
        let mut renderer = CountingRenderer(0);
        ctx.finish_loading(&mut ui);
        ctx.enter(&mut audio, &mut ui);

        ctx.frame(0.016, &press(Action::Interact), &mut ui, &mut renderer);
        assert_eq!(
            ctx.current_target().map(|e| e.label.name.as_str()),
            Some("Love Letter")
        );
        assert!(ctx.modal.is_open());

        ctx.frame(0.016, &press(Action::Cancel), &mut ui, &mut renderer);
        assert!(!ctx.modal.is_open());
        assert!(ctx.celebration.is_triggered());
        assert!(matches!(
            ui.last(),
            Some(UiCommand::SetLookLock(true))
        ));
        let opened = ui
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    UiCommand::OpenModal {
                        kind: ModalKind::Letter,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(opened, 1);
    }

    #[test]
    fn prompt_follows_motion_in_the_same_frame() {
        let mut ctx = SceneContext::new(SceneSettings::default(), StdRng::seed_from_u64(2));
        let base = Transform::from_position(Vec3::new(0.0, 2.0, -12.0));
        let params = OrbitParams {
            radius: 15.0,
            height: Some(2.0),
            angular_speed: FRAC_PI_2 / 0.05,
            ..OrbitParams::default()
        };
        // Starts at (15, 2, -12): out of range and well off the view axis.
        let node = ctx.graph.insert(SceneNode::new(
            "whale",
            Transform::from_position(Vec3::new(15.0, 2.0, -12.0)),
            Visual::Empty,
        ));
        ctx.motions
            .insert(MotionRecord::with_phase(node, base, Behavior::Orbit(params), 0.0));
        ctx.interactions.register(InteractableEntry::new(
            node,
            Label::named("Whale"),
            ActivationKind::ShowNarrative,
        ));

        let mut ui: Vec<UiCommand> = Vec::new();
        let mut audio = SilentAudioSink::default();
        ctx.finish_loading(&mut ui);
        ctx.enter(&mut audio, &mut ui);
        ui.clear();

        // A quarter turn puts the whale at (0, 2, 3), straight ahead.
        ctx.frame(0.05, &InputFrame::default(), &mut ui, &mut CountingRenderer(0));
        let position = ctx.graph.transform(node).unwrap().position;
        assert!((position - Vec3::new(0.0, 2.0, 3.0)).length() < 1e-3);
        assert_eq!(
            ctx.current_target().map(|e| e.label.name.as_str()),
            Some("Whale")
        );
        assert!(ui.iter().any(
            |c| matches!(c, UiCommand::ShowPrompt { text } if text.starts_with("Whale"))
        ));
    }

    #[test]
    fn cancel_without_modal_releases_look_lock() {
        let mut ctx = scene_with_letter();
        let mut ui: Vec<UiCommand> = Vec::new();
        let mut audio = SilentAudioSink::default();
        ctx.finish_loading(&mut ui);
        ctx.enter(&mut audio, &mut ui);
        ui.clear();
        ctx.frame(0.016, &press(Action::Cancel), &mut ui, &mut CountingRenderer(0));
        assert!(ui.contains(&UiCommand::SetLookLock(false)));
    }

    #[test]
    fn large_gaps_are_capped() {
        let mut ctx = scene_with_letter();
        let time = ctx.frame(
            30.0,
            &InputFrame::default(),
            &mut Vec::<UiCommand>::new(),
            &mut CountingRenderer(0),
        );
        assert!((time.delta - 0.1).abs() < 1e-6);
    }
}
