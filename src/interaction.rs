use std::fmt;

use glam::Vec3;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::scene_graph::{NodeId, SceneGraph};
use crate::ui::{ModalController, ModalKind, UiCommand, UiSink};

/// Display content of an interactable object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fact: Option<String>,
}

impl Label {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Which modal an activation opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationKind {
    /// Info card describing the object.
    ShowNarrative,
    /// The letter.
    OpenSpecialModal,
}

impl ActivationKind {
    pub fn modal(self) -> ModalKind {
        match self {
            Self::ShowNarrative => ModalKind::InfoCard,
            Self::OpenSpecialModal => ModalKind::Letter,
        }
    }
}

/// Handle to an entry of an [`InteractionRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

pub type ActivationHook = Box<dyn FnMut()>;

/// Object the player can aim at and activate.
///
/// `target` is only used to look up the world position; the entry does not
/// own the node.
pub struct InteractableEntry {
    pub target: NodeId,
    pub label: Label,
    pub kind: ActivationKind,
    on_activate: Option<ActivationHook>,
    placeholder: bool,
}

impl fmt::Debug for InteractableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractableEntry")
            .field("target", &self.target)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

impl InteractableEntry {
    pub fn new(target: NodeId, label: Label, kind: ActivationKind) -> Self {
        Self {
            target,
            label,
            kind,
            on_activate: None,
            placeholder: false,
        }
    }

    /// Adds a callback that runs once per activation, before the modal opens.
    pub fn with_hook(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_activate = Some(Box::new(hook));
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    fn fire(&mut self) {
        if let Some(hook) = self.on_activate.as_mut() {
            hook();
        }
    }
}

/// Append-only list of interactables.
///
/// The only mutation after construction is [`supersede_placeholder`], which
/// swaps a procedural stand-in for the loaded model exactly once.
///
/// [`supersede_placeholder`]: InteractionRegistry::supersede_placeholder
#[derive(Debug, Default)]
pub struct InteractionRegistry {
    entries: Vec<InteractableEntry>,
}

impl InteractionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: InteractableEntry) -> EntryId {
        self.entries.push(entry);
        EntryId(self.entries.len() - 1)
    }

    pub fn register_placeholder(&mut self, mut entry: InteractableEntry) -> EntryId {
        entry.placeholder = true;
        self.register(entry)
    }

    /// Points a placeholder at its real node. Fails if the entry is not (or no
    /// longer) a placeholder.
    pub fn supersede_placeholder(
        &mut self,
        id: EntryId,
        target: NodeId,
        label: Option<Label>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(id.0) else {
            return false;
        };
        if !entry.placeholder {
            return false;
        }
        entry.target = target;
        if let Some(label) = label {
            entry.label = label;
        }
        entry.placeholder = false;
        true
    }

    pub fn get(&self, id: EntryId) -> Option<&InteractableEntry> {
        self.entries.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &InteractableEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (EntryId(i), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Range and view-cone tunables read from the scene manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    pub range: f32,
    /// Minimum dot product between the view direction and the direction to the object.
    pub alignment: f32,
    pub prompt_suffix: String,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            range: 15.0,
            alignment: 0.4,
            prompt_suffix: " - Press E".to_string(),
        }
    }
}

/// Entry selected by the resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub entry: EntryId,
    pub distance: f32,
    pub alignment: f32,
}

/// Picks the nearest entry that is within `range` and inside the view cone.
///
/// Alignment only filters; among the survivors the smallest distance wins and
/// equal distances keep registration order. An entry exactly at the viewer
/// has no direction and passes only when `alignment <= 0`.
pub fn resolve_target(
    origin: Vec3,
    forward: Vec3,
    registry: &InteractionRegistry,
    graph: &SceneGraph,
    range: f32,
    alignment: f32,
) -> Option<Candidate> {
    let forward = forward.normalize_or_zero();
    let mut best: Option<Candidate> = None;
    for (id, entry) in registry.iter() {
        let Some(position) = graph.world_position(entry.target) else {
            continue;
        };
        let offset = position - origin;
        let distance = offset.length();
        if !(distance <= range) {
            continue;
        }
        let dot = offset.normalize_or_zero().dot(forward);
        if !(dot >= alignment) {
            continue;
        }
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(Candidate {
                entry: id,
                distance,
                alignment: dot,
            });
        }
    }
    best
}

/// Remembers the current target and keeps the prompt in sync with it.
#[derive(Debug, Default, Clone)]
pub struct Targeting {
    current: Option<EntryId>,
}

impl Targeting {
    pub fn current(&self) -> Option<EntryId> {
        self.current
    }

    /// Stores the new target; emits prompt commands only when it changes.
    pub fn update(
        &mut self,
        candidate: Option<Candidate>,
        registry: &InteractionRegistry,
        prompt_suffix: &str,
        ui: &mut dyn UiSink,
    ) {
        let next = candidate.map(|c| c.entry);
        if next == self.current {
            return;
        }
        self.current = next;
        match next.and_then(|id| registry.get(id)) {
            Some(entry) => ui.send(UiCommand::ShowPrompt {
                text: format!("{}{prompt_suffix}", entry.label.name),
            }),
            None => ui.send(UiCommand::HidePrompt),
        }
    }

    pub fn clear(&mut self, ui: &mut dyn UiSink) {
        if self.current.take().is_some() {
            ui.send(UiCommand::HidePrompt);
        }
    }
}

/// Runs the targeted entry's action once.
///
/// Only valid during gameplay, with no modal open and a target present.
/// Returns the kind of modal that was opened.
pub fn activate(
    target: Option<EntryId>,
    registry: &mut InteractionRegistry,
    gameplay_active: bool,
    modal: &mut ModalController,
    ui: &mut dyn UiSink,
) -> Option<ModalKind> {
    if !gameplay_active || modal.is_open() {
        return None;
    }
    let id = target?;
    let entry = registry.entries.get_mut(id.0)?;
    info!("activating {}", entry.label.name);
    entry.fire();
    let kind = entry.kind.modal();
    if modal.open(kind, &entry.label, ui) {
        Some(kind)
    } else {
        debug!("modal refused activation of {id}");
        None
    }
}
