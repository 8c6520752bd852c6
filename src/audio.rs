use log::{info, warn};
use thiserror::Error;

use crate::ui::{UiCommand, UiSink};

pub const NO_MUSIC_HINT: &str = "No music found, add .mp3 files to sounds/";
pub const PLAYBACK_HINT: &str = "Click the play button to start the music";

/// Track paths probed when the manifest lists none.
pub const DEFAULT_TRACK_CANDIDATES: [&str; 7] = [
    "sounds/music.mp3",
    "sounds/song.mp3",
    "sounds/background.mp3",
    "sounds/ambient.mp3",
    "sounds/1.mp3",
    "sounds/2.mp3",
    "sounds/3.mp3",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The platform refused to start playback, e.g. an autoplay policy.
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),
    #[error("no ambient tracks available")]
    NoTracks,
}

/// Platform audio output.
pub trait AudioSink {
    /// Returns true if `path` can be played.
    fn probe(&mut self, path: &str) -> bool;
    fn set_source(&mut self, path: &str);
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
}

/// Ambient music controller. Never affects motion or interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientPlaylist {
    tracks: Vec<String>,
    current: usize,
    playing: bool,
    volume: f32,
}

impl Default for AmbientPlaylist {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            current: 0,
            playing: false,
            volume: 0.5,
        }
    }
}

impl AmbientPlaylist {
    pub fn new(tracks: Vec<String>) -> Self {
        Self {
            tracks,
            ..Self::default()
        }
    }

    /// Keeps the candidates the sink can play, in candidate order.
    pub fn probe<S, I>(sink: &mut S, candidates: I, ui: &mut dyn UiSink) -> Self
    where
        S: AudioSink + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut tracks: Vec<String> = Vec::new();
        for candidate in candidates {
            let path = candidate.as_ref();
            if tracks.iter().any(|known| known == path) {
                continue;
            }
            if sink.probe(path) {
                info!("found ambient track {path}");
                tracks.push(path.to_string());
            }
        }
        let playlist = Self::new(tracks);
        if let Some(first) = playlist.current_track() {
            sink.set_source(first);
            sink.set_volume(playlist.volume);
        } else {
            ui.send(UiCommand::ShowHint(NO_MUSIC_HINT.to_string()));
        }
        playlist.announce(ui);
        playlist
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn current_track(&self) -> Option<&str> {
        self.tracks.get(self.current).map(String::as_str)
    }

    /// File name of the current track.
    pub fn current_title(&self) -> Option<&str> {
        self.current_track()
            .map(|path| path.rsplit('/').next().unwrap_or(path))
    }

    /// Starts playback. On failure the controller stays paused and a hint is shown.
    pub fn play<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        ui: &mut dyn UiSink,
    ) -> Result<(), AudioError> {
        if self.tracks.is_empty() {
            ui.send(UiCommand::ShowHint(NO_MUSIC_HINT.to_string()));
            return Err(AudioError::NoTracks);
        }
        match sink.play() {
            Ok(()) => {
                self.playing = true;
                self.announce(ui);
                Ok(())
            }
            Err(err) => {
                self.playback_rejected(&err, ui);
                Err(err)
            }
        }
    }

    /// Records a rejection reported after `play` returned, e.g. by a browser
    /// promise. Leaves the controller paused.
    pub fn playback_rejected(&mut self, err: &AudioError, ui: &mut dyn UiSink) {
        warn!("ambient audio: {err}");
        self.playing = false;
        ui.send(UiCommand::ShowHint(PLAYBACK_HINT.to_string()));
        self.announce(ui);
    }

    pub fn pause<S: AudioSink + ?Sized>(&mut self, sink: &mut S, ui: &mut dyn UiSink) {
        sink.pause();
        self.playing = false;
        self.announce(ui);
    }

    pub fn toggle<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        ui: &mut dyn UiSink,
    ) -> Result<(), AudioError> {
        if self.playing {
            self.pause(sink, ui);
            Ok(())
        } else {
            self.play(sink, ui)
        }
    }

    pub fn next<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        ui: &mut dyn UiSink,
    ) -> Result<(), AudioError> {
        self.skip(1, sink, ui)
    }

    pub fn previous<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        ui: &mut dyn UiSink,
    ) -> Result<(), AudioError> {
        self.skip(-1, sink, ui)
    }

    /// Call when the platform reports the current track ended.
    pub fn track_ended<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        ui: &mut dyn UiSink,
    ) -> Result<(), AudioError> {
        self.skip(1, sink, ui)
    }

    /// Clamps to `0..=1`. Non-finite values are ignored.
    pub fn set_volume<S: AudioSink + ?Sized>(&mut self, sink: &mut S, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        sink.set_volume(self.volume);
    }

    fn skip<S: AudioSink + ?Sized>(
        &mut self,
        step: isize,
        sink: &mut S,
        ui: &mut dyn UiSink,
    ) -> Result<(), AudioError> {
        let len = self.tracks.len();
        if len == 0 {
            return Ok(());
        }
        let len = len as isize;
        self.current = (self.current as isize + step).rem_euclid(len) as usize;
        if let Some(track) = self.current_track() {
            sink.set_source(track);
        }
        if self.playing {
            self.play(sink, ui)
        } else {
            self.announce(ui);
            Ok(())
        }
    }

    fn announce(&self, ui: &mut dyn UiSink) {
        ui.send(UiCommand::NowPlaying {
            track: self.current_title().map(str::to_string),
            playing: self.playing,
        });
    }
}

/// Sink with no output device. Probes fail unless tracks are preloaded.
#[derive(Debug, Default, Clone)]
pub struct SilentAudioSink {
    pub available: Vec<String>,
    pub source: Option<String>,
    pub volume: f32,
}

impl AudioSink for SilentAudioSink {
    fn probe(&mut self, path: &str) -> bool {
        self.available.iter().any(|known| known == path)
    }

    fn set_source(&mut self, path: &str) {
        self.source = Some(path.to_string());
    }

    fn play(&mut self) -> Result<(), AudioError> {
        match self.source {
            Some(_) => Ok(()),
            None => Err(AudioError::NoTracks),
        }
    }

    fn pause(&mut self) {}

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}
