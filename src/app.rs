use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::assets::LoadReport;
use crate::audio::{AudioError, AudioSink};
use crate::frame::{CameraPose, RenderSink, SceneContext};
use crate::input::InputState;
use crate::scene_graph::{SceneGraph, Visual};
use crate::ui::{UiCommand, UiSink};

/// Renderer stand-in for headless runs: remembers the last camera.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    pub frames: u64,
    pub last_camera: Option<CameraPose>,
}

impl RenderSink for HeadlessRenderer {
    fn render(&mut self, camera: &CameraPose, scene: &SceneGraph) {
        self.frames += 1;
        self.last_camera = Some(*camera);
        debug!("frame {} with {} nodes", self.frames, scene.len());
    }
}

/// Prints every UI command and mirrors look lock into the input state, the
/// way a browser reports pointer lock changes back.
#[derive(Debug)]
pub struct ConsoleUiSink {
    input: Arc<InputState>,
    quiet_effects: bool,
}

impl ConsoleUiSink {
    pub fn new(input: Arc<InputState>) -> Self {
        Self {
            input,
            quiet_effects: false,
        }
    }

    /// Suppresses the per-burst firework and shooting star lines.
    pub fn quiet_effects(mut self, quiet: bool) -> Self {
        self.quiet_effects = quiet;
        self
    }
}

impl UiSink for ConsoleUiSink {
    fn send(&mut self, command: UiCommand) {
        if let UiCommand::SetLookLock(locked) = command {
            self.input.set_look_locked(locked);
        }
        let noisy = matches!(
            command,
            UiCommand::FireworkBurst { .. }
                | UiCommand::RemoveFireworkBurst { .. }
                | UiCommand::ShootingStar { .. }
                | UiCommand::RemoveShootingStar { .. }
                | UiCommand::LoadProgress { .. }
        );
        if noisy && self.quiet_effects {
            debug!("ui: {command}");
        } else {
            println!("ui: {command}");
        }
    }
}

/// Audio sink without output. A track exists if the file exists.
#[derive(Debug, Clone)]
pub struct FileProbeAudioSink {
    root: PathBuf,
    source: Option<String>,
    volume: f32,
}

impl FileProbeAudioSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source: None,
            volume: 1.0,
        }
    }
}

impl AudioSink for FileProbeAudioSink {
    fn probe(&mut self, path: &str) -> bool {
        self.root.join(path).is_file()
    }

    fn set_source(&mut self, path: &str) {
        self.source = Some(path.to_string());
    }

    fn play(&mut self) -> Result<(), AudioError> {
        match &self.source {
            Some(source) => {
                debug!("playing {source} at volume {:.2}", self.volume);
                Ok(())
            }
            None => Err(AudioError::NoTracks),
        }
    }

    fn pause(&mut self) {}

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}

pub fn print_load_summary(objects: usize, report: &LoadReport) {
    println!(
        "Loaded scene with {} objects ({} failed)",
        objects,
        report.failures().count()
    );
    for (object, err) in report.failures() {
        println!(" ! {object}: {err}");
    }
}

pub fn print_final_state(graph: &SceneGraph) {
    println!("Final object states:");
    for (_, node) in graph.iter() {
        if matches!(node.visual, Visual::Empty) && node.name.ends_with("-placeholder") {
            continue;
        }
        let t = &node.transform;
        println!(
            " - {} pos=({:.2}, {:.2}, {:.2}) rot=({:.2}, {:.2}, {:.2})",
            node.name,
            t.position.x,
            t.position.y,
            t.position.z,
            t.rotation.x,
            t.rotation.y,
            t.rotation.z
        );
    }
}

pub fn print_player(ctx: &SceneContext) {
    let p = &ctx.player;
    println!(
        "Player pos=({:.2}, {:.2}, {:.2}) yaw={:.2} pitch={:.2}",
        p.position.x, p.position.y, p.position.z, p.yaw, p.pitch
    );
    match ctx.current_target() {
        Some(entry) => println!("Target: {}", entry.label.name),
        None => println!("Target: none"),
    }
}
