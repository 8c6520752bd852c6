//! Frame-driven core of a first-person walkthrough scene.
//!
//! The crate moves the animated objects of a small themed scene, works out
//! which interactable object the player is looking at, and turns key presses
//! into UI commands. Rendering, DOM work and audio output stay outside: the
//! core talks to them only through [`RenderSink`], [`UiSink`] and
//! [`AudioSink`], so every piece can be driven headless from tests or the CLI
//! and from the browser through the `web` module.

pub mod app;
pub mod assets;
pub mod audio;
pub mod builder;
pub mod clock;
pub mod effects;
pub mod frame;
pub mod input;
pub mod interaction;
pub mod manifest;
pub mod motion;
pub mod player;
pub mod scene_graph;
pub mod ui;
#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use assets::{FsModelProvider, InstantTimeSource};
pub use assets::{
    load_all, resolve_candidates, AssetError, LoadPolicy, LoadReport, LoadRequest,
    MemoryModelProvider, ModelData, ModelProvider, TimeSource,
};
pub use audio::{AmbientPlaylist, AudioError, AudioSink, DEFAULT_TRACK_CANDIDATES};
pub use builder::{build_scene, BuiltScene};
pub use clock::{Clock, ClockSettings, FrameTime};
pub use effects::{Celebration, CelebrationSettings, PeriodicSpawner, SpawnerSettings};
pub use frame::{CameraPose, GamePhase, RenderSink, SceneContext};
pub use input::{Action, InputFrame, InputState, KeyBindings, KeyCode, NamedKey};
pub use interaction::{
    activate, resolve_target, ActivationKind, Candidate, EntryId, InteractableEntry,
    InteractionRegistry, InteractionSettings, Label, Targeting,
};
pub use manifest::{ObjectSpec, SceneManifest, SceneSettings};
pub use motion::{evaluate, Behavior, MotionRecord, MotionRegistry};
pub use player::{MoveIntent, PlayerPose, PlayerSettings};
pub use scene_graph::{NodeId, SceneGraph, SceneNode, Shape, Transform, Visual};
pub use ui::{ModalController, ModalKind, ModalState, UiCommand, UiSink};
