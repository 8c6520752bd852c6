use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::interaction::Label;

/// Fact shown on an info card whose label has none.
pub const DEFAULT_FACT: &str = "Part of the magic!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModalKind {
    /// The primary narrative: the letter.
    Letter,
    InfoCard,
}

impl fmt::Display for ModalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Letter => "letter",
            Self::InfoCard => "info-card",
        })
    }
}

/// Presentation commands emitted by the core. The core never touches UI elements itself.
///
/// Serializes as `{ "kind": "open-modal", "data": { .. } }`, the shape the web
/// front end hands to the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum UiCommand {
    LoadProgress { fraction: f32, status: String },
    ShowMenu,
    EnterScene,
    ShowPrompt { text: String },
    HidePrompt,
    OpenModal { kind: ModalKind, label: Label },
    CloseModal { kind: ModalKind },
    SetLookLock(bool),
    ShowBanner,
    HideBanner,
    FireworkBurst {
        id: u32,
        x_percent: f32,
        y_percent: f32,
        color: u32,
        particles: u32,
    },
    RemoveFireworkBurst { id: u32 },
    ShootingStar { id: u32, from: [f32; 3], to: [f32; 3] },
    RemoveShootingStar { id: u32 },
    NowPlaying { track: Option<String>, playing: bool },
    ShowHint(String),
}

impl fmt::Display for UiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadProgress { fraction, status } => {
                write!(f, "load-progress {:.0}% {status}", fraction * 100.0)
            }
            Self::ShowMenu => f.write_str("show-menu"),
            Self::EnterScene => f.write_str("enter-scene"),
            Self::ShowPrompt { text } => write!(f, "show-prompt \"{text}\""),
            Self::HidePrompt => f.write_str("hide-prompt"),
            Self::OpenModal { kind, label } => write!(f, "open-modal {kind} \"{}\"", label.name),
            Self::CloseModal { kind } => write!(f, "close-modal {kind}"),
            Self::SetLookLock(locked) => write!(f, "look-lock {locked}"),
            Self::ShowBanner => f.write_str("show-banner"),
            Self::HideBanner => f.write_str("hide-banner"),
            Self::FireworkBurst {
                id,
                x_percent,
                y_percent,
                color,
                ..
            } => write!(
                f,
                "firework {id} at ({x_percent:.0}%, {y_percent:.0}%) #{color:06x}"
            ),
            Self::RemoveFireworkBurst { id } => write!(f, "remove-firework {id}"),
            Self::ShootingStar { id, .. } => write!(f, "shooting-star {id}"),
            Self::RemoveShootingStar { id } => write!(f, "remove-shooting-star {id}"),
            Self::NowPlaying { track, playing } => match track {
                Some(track) => write!(f, "now-playing \"{track}\" playing={playing}"),
                None => write!(f, "now-playing none"),
            },
            Self::ShowHint(text) => write!(f, "hint \"{text}\""),
        }
    }
}

/// Receiver of [`UiCommand`]s, e.g. a DOM bridge or a log.
pub trait UiSink {
    fn send(&mut self, command: UiCommand);
}

impl UiSink for Vec<UiCommand> {
    fn send(&mut self, command: UiCommand) {
        self.push(command);
    }
}

impl<S: UiSink + ?Sized> UiSink for &mut S {
    fn send(&mut self, command: UiCommand) {
        (**self).send(command);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUiSink;

impl UiSink for NullUiSink {
    fn send(&mut self, _command: UiCommand) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalState {
    #[default]
    Closed,
    Open(ModalKind),
}

/// What closing a modal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalClosed {
    pub kind: ModalKind,
    /// True only the first time the letter is closed.
    pub first_letter_close: bool,
}

/// Modal state machine: `Closed -> Open(kind) -> Closed`.
#[derive(Debug, Clone, Default)]
pub struct ModalController {
    state: ModalState,
    letter_closed_before: bool,
}

impl ModalController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ModalState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ModalState::Open(_))
    }

    /// Opens a modal and releases look lock. Ignored while another modal is open.
    pub fn open(&mut self, kind: ModalKind, label: &Label, ui: &mut dyn UiSink) -> bool {
        if self.is_open() {
            return false;
        }
        debug!("opening {kind} modal for {}", label.name);
        let mut label = label.clone();
        if kind == ModalKind::InfoCard && label.fact.as_deref().map_or(true, str::is_empty) {
            label.fact = Some(DEFAULT_FACT.to_string());
        }
        self.state = ModalState::Open(kind);
        ui.send(UiCommand::SetLookLock(false));
        ui.send(UiCommand::OpenModal { kind, label });
        true
    }

    /// Closes the open modal, re-engaging look lock if `relock` is set.
    pub fn close(&mut self, relock: bool, ui: &mut dyn UiSink) -> Option<ModalClosed> {
        let ModalState::Open(kind) = self.state else {
            return None;
        };
        debug!("closing {kind} modal");
        self.state = ModalState::Closed;
        ui.send(UiCommand::CloseModal { kind });
        if relock {
            ui.send(UiCommand::SetLookLock(true));
        }
        let first_letter_close = kind == ModalKind::Letter && !self.letter_closed_before;
        if kind == ModalKind::Letter {
            self.letter_closed_before = true;
        }
        Some(ModalClosed {
            kind,
            first_letter_close,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(fact: Option<&str>) -> Label {
        Label {
            name: "Moon".into(),
            description: "Lights up the night.".into(),
            fact: fact.map(str::to_string),
        }
    }

    #[test]
    fn open_then_close_round_trip() {
        let mut ui: Vec<UiCommand> = Vec::new();
        let mut modal = ModalController::new();
        assert!(modal.open(ModalKind::InfoCard, &label(Some("x")), &mut ui));
        assert_eq!(modal.state(), ModalState::Open(ModalKind::InfoCard));
        assert!(!modal.open(ModalKind::Letter, &label(None), &mut ui));

        let closed = modal.close(true, &mut ui).unwrap();
        assert_eq!(closed.kind, ModalKind::InfoCard);
        assert!(!closed.first_letter_close);
        assert!(modal.close(true, &mut ui).is_none());
        assert_eq!(
            ui,
            vec![
                UiCommand::SetLookLock(false),
                UiCommand::OpenModal {
                    kind: ModalKind::InfoCard,
                    label: label(Some("x")),
                },
                UiCommand::CloseModal {
                    kind: ModalKind::InfoCard
                },
                UiCommand::SetLookLock(true),
            ]
        );
    }

    #[test]
    fn info_card_gets_default_fact() {
        let mut ui: Vec<UiCommand> = Vec::new();
        let mut modal = ModalController::new();
        modal.open(ModalKind::InfoCard, &label(Some("")), &mut ui);
        let Some(UiCommand::OpenModal { label, .. }) = ui.last() else {
            panic!("expected modal command");
        };
        assert_eq!(label.fact.as_deref(), Some(DEFAULT_FACT));
    }

    #[test]
    fn only_first_letter_close_is_flagged() {
        let mut ui: Vec<UiCommand> = Vec::new();
        let mut modal = ModalController::new();
        let mut flagged = 0;
        for _ in 0..3 {
            modal.open(ModalKind::Letter, &label(None), &mut ui);
            if modal.close(false, &mut ui).unwrap().first_letter_close {
                flagged += 1;
            }
        }
        assert_eq!(flagged, 1);
    }

    #[test]
    fn serialized_commands_carry_their_payload() {
        let open = UiCommand::OpenModal {
            kind: ModalKind::InfoCard,
            label: label(Some("Made of cheese.")),
        };
        let value = serde_json::to_value(&open).unwrap();
        assert_eq!(value["kind"], "open-modal");
        assert_eq!(value["data"]["kind"], "info-card");
        assert_eq!(value["data"]["label"]["description"], "Lights up the night.");
        assert_eq!(value["data"]["label"]["fact"], "Made of cheese.");

        let star = UiCommand::ShootingStar {
            id: 3,
            from: [1.0, 2.0, 3.0],
            to: [4.0, 5.0, 6.0],
        };
        let value = serde_json::to_value(&star).unwrap();
        assert_eq!(value["data"]["to"], serde_json::json!([4.0, 5.0, 6.0]));

        let lock = serde_json::to_value(UiCommand::SetLookLock(true)).unwrap();
        assert_eq!(lock, serde_json::json!({ "kind": "set-look-lock", "data": true }));
        let menu = serde_json::to_value(UiCommand::ShowMenu).unwrap();
        assert_eq!(menu, serde_json::json!({ "kind": "show-menu" }));
    }
}
