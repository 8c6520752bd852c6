use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::player::MoveIntent;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    /// Accepts DOM `KeyboardEvent.code` names ("KeyW", "ArrowUp") as well as
    /// short names ("W", "Up", "Esc").
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(Self::Named(key));
        }
        let letter = name.strip_prefix("Key").unwrap_or(name);
        let mut chars = letter.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphanumeric() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<NamedKey> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Escape" | "Esc" => Escape,
        "ArrowUp" | "Up" => Up,
        "ArrowDown" | "Down" => Down,
        "ArrowLeft" | "Left" => Left,
        "ArrowRight" | "Right" => Right,
        _ => return None,
    };
    Some(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Escape,
    Up,
    Down,
    Left,
    Right,
}

/// Named actions the walkthrough reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    Interact,
    Cancel,
}

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        let action = match name.to_ascii_lowercase().as_str() {
            "forward" | "move-forward" => Self::MoveForward,
            "back" | "backward" | "move-back" => Self::MoveBack,
            "left" | "move-left" => Self::MoveLeft,
            "right" | "move-right" => Self::MoveRight,
            "interact" => Self::Interact,
            "cancel" => Self::Cancel,
            _ => return None,
        };
        Some(action)
    }
}

/// Key to action table. Several keys may map to the same action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    bindings: Vec<(KeyCode, Action)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use Action::*;
        let ch = KeyCode::Character;
        let named = KeyCode::Named;
        Self {
            bindings: vec![
                (ch('W'), MoveForward),
                (named(NamedKey::Up), MoveForward),
                (ch('S'), MoveBack),
                (named(NamedKey::Down), MoveBack),
                (ch('A'), MoveLeft),
                (named(NamedKey::Left), MoveLeft),
                (ch('D'), MoveRight),
                (named(NamedKey::Right), MoveRight),
                (ch('E'), Interact),
                (named(NamedKey::Escape), Cancel),
            ],
        }
    }
}

impl KeyBindings {
    pub fn action(&self, key: KeyCode) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| *action)
    }

    /// First key bound to `action`.
    pub fn key_for(&self, action: Action) -> Option<KeyCode> {
        self.bindings
            .iter()
            .find(|(_, bound)| *bound == action)
            .map(|(key, _)| *key)
    }
}

/// Input sampled for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    pub held: HashSet<Action>,
    /// Press edges since the previous frame, in arrival order.
    pub pressed: Vec<Action>,
    pub pointer_delta: Vec2,
    pub look_locked: bool,
}

impl InputFrame {
    pub fn is_held(&self, action: Action) -> bool {
        self.held.contains(&action)
    }

    pub fn move_intent(&self) -> MoveIntent {
        MoveIntent {
            forward: self.is_held(Action::MoveForward),
            back: self.is_held(Action::MoveBack),
            left: self.is_held(Action::MoveLeft),
            right: self.is_held(Action::MoveRight),
        }
    }
}

/// Input shared between platform event handlers and the frame driver.
#[derive(Debug, Default)]
pub struct InputState {
    bindings: KeyBindings,
    keys: RwLock<HashSet<KeyCode>>,
    pressed: RwLock<Vec<Action>>,
    pointer_delta: RwLock<Vec2>,
    look_locked: RwLock<bool>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            ..Self::default()
        }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Records a key press. Auto-repeat of a held key is not a new edge.
    pub fn set_key_down(&self, key: KeyCode) {
        let newly_down = self.keys.write().insert(key);
        if newly_down {
            if let Some(action) = self.bindings.action(key) {
                self.pressed.write().push(action);
            }
        }
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    pub fn is_action_held(&self, action: Action) -> bool {
        self.keys
            .read()
            .iter()
            .any(|key| self.bindings.action(*key) == Some(action))
    }

    /// Pointer movement only counts while look lock is engaged.
    pub fn add_pointer_delta(&self, delta: Vec2) {
        if *self.look_locked.read() && delta.is_finite() {
            *self.pointer_delta.write() += delta;
        }
    }

    pub fn set_look_locked(&self, locked: bool) {
        *self.look_locked.write() = locked;
        if !locked {
            *self.pointer_delta.write() = Vec2::ZERO;
        }
    }

    pub fn is_look_locked(&self) -> bool {
        *self.look_locked.read()
    }

    /// Returns held actions and drains press edges and accumulated pointer motion.
    pub fn take_frame(&self) -> InputFrame {
        let held = self
            .keys
            .read()
            .iter()
            .filter_map(|key| self.bindings.action(*key))
            .collect();
        InputFrame {
            held,
            pressed: std::mem::take(&mut *self.pressed.write()),
            pointer_delta: std::mem::take(&mut *self.pointer_delta.write()),
            look_locked: self.is_look_locked(),
        }
    }
}
