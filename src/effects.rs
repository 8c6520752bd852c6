//! Timed visual effects driven by the frame clock.
//!
//! Both effects only emit [`UiCommand`]s. They never touch motion records or
//! scene nodes, so the frame driver can run them after interaction without
//! any coordination.

use glam::Vec3;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ui::{UiCommand, UiSink};

/// Firework colours, `0xRRGGBB`.
pub const FIREWORK_PALETTE: [u32; 4] = [0xff6b8b, 0xffcc00, 0xff8e53, 0x9966ff];

/// Shortest shooting star interval, in seconds.
pub const MIN_SPAWN_INTERVAL: f32 = 0.01;

/// Spawns allowed in one update. Anything further behind is skipped.
const MAX_SPAWNS_PER_UPDATE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CelebrationSettings {
    /// Seconds between the trigger and the first burst.
    pub delay: f32,
    /// Seconds the banner stays visible.
    pub banner: f32,
    pub bursts: u32,
    pub burst_interval: f32,
    pub burst_lifetime: f32,
    pub particles: u32,
}

impl Default for CelebrationSettings {
    fn default() -> Self {
        Self {
            delay: 2.0,
            banner: 5.0,
            bursts: 20,
            burst_interval: 0.25,
            burst_lifetime: 1.5,
            particles: 20,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveBurst {
    id: u32,
    expires_at: f64,
}

/// One-shot fireworks and banner sequence.
///
/// `trigger` is latched: only the first call schedules anything.
#[derive(Debug, Clone, Default)]
pub struct Celebration {
    settings: CelebrationSettings,
    start: Option<f64>,
    emitted: u32,
    live: Vec<LiveBurst>,
    banner_shown: bool,
    banner_hidden: bool,
}

impl Celebration {
    pub fn new(settings: CelebrationSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.start.is_some()
    }

    /// True once every burst has been shown and removed and the banner is hidden.
    pub fn is_finished(&self) -> bool {
        self.is_triggered()
            && self.emitted >= self.settings.bursts
            && self.live.is_empty()
            && self.banner_hidden
    }

    /// Schedules the sequence relative to `now` (seconds of elapsed frame
    /// time). Returns false if it was already triggered.
    pub fn trigger(&mut self, now: f64) -> bool {
        if self.start.is_some() {
            return false;
        }
        info!(
            "celebration scheduled in {:.1}s ({} bursts)",
            self.settings.delay, self.settings.bursts
        );
        self.start = Some(now + f64::from(self.settings.delay.max(0.0)));
        true
    }

    pub fn update<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R, ui: &mut dyn UiSink) {
        let Some(start) = self.start else {
            return;
        };
        if now < start {
            return;
        }
        let settings = self.settings;

        if !self.banner_shown {
            self.banner_shown = true;
            ui.send(UiCommand::ShowBanner);
        }

        while self.emitted < settings.bursts {
            let at = start + f64::from(settings.burst_interval) * f64::from(self.emitted);
            if now < at {
                break;
            }
            let id = self.emitted;
            self.emitted += 1;
            ui.send(UiCommand::FireworkBurst {
                id,
                x_percent: rng.gen_range(15.0..85.0),
                y_percent: rng.gen_range(15.0..65.0),
                color: FIREWORK_PALETTE[rng.gen_range(0..FIREWORK_PALETTE.len())],
                particles: settings.particles,
            });
            self.live.push(LiveBurst {
                id,
                expires_at: at + f64::from(settings.burst_lifetime),
            });
        }

        self.live.retain(|burst| {
            if now >= burst.expires_at {
                ui.send(UiCommand::RemoveFireworkBurst { id: burst.id });
                false
            } else {
                true
            }
        });

        if !self.banner_hidden && now >= start + f64::from(settings.banner) {
            self.banner_hidden = true;
            ui.send(UiCommand::HideBanner);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerSettings {
    pub enabled: bool,
    /// Seconds between spawns.
    pub interval: f32,
    /// Seconds each spawned object lives.
    pub lifetime: f32,
}

impl Default for SpawnerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 8.0,
            lifetime: 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transient {
    id: u32,
    expires_at: f64,
}

/// Spawns shooting stars on its own interval. The stars are transient and
/// owned by the spawner alone.
#[derive(Debug, Clone)]
pub struct PeriodicSpawner {
    settings: SpawnerSettings,
    next_spawn: Option<f64>,
    next_id: u32,
    live: Vec<Transient>,
}

impl PeriodicSpawner {
    pub fn new(settings: SpawnerSettings) -> Self {
        Self {
            settings,
            next_spawn: None,
            next_id: 0,
            live: Vec::new(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn spawned(&self) -> u32 {
        self.next_id
    }

    pub fn update<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R, ui: &mut dyn UiSink) {
        self.live.retain(|star| {
            if now >= star.expires_at {
                ui.send(UiCommand::RemoveShootingStar { id: star.id });
                false
            } else {
                true
            }
        });

        if !self.settings.enabled || !(self.settings.interval > 0.0) {
            return;
        }
        let interval = f64::from(self.settings.interval.max(MIN_SPAWN_INTERVAL));
        // The first spawn waits one full interval.
        let mut next = *self.next_spawn.get_or_insert(now + interval);
        let mut spawned = 0;
        while now >= next && spawned < MAX_SPAWNS_PER_UPDATE {
            self.spawn(next, rng, ui);
            next += interval;
            spawned += 1;
        }
        if now >= next {
            let missed = ((now - next) / interval).floor() + 1.0;
            debug!("shooting stars fell behind, skipping {missed} spawn(s)");
            next += missed * interval;
        }
        self.next_spawn = Some(next);
    }

    fn spawn<R: Rng + ?Sized>(&mut self, at: f64, rng: &mut R, ui: &mut dyn UiSink) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let from = Vec3::new(
            rng.gen_range(-120.0..120.0),
            rng.gen_range(60.0..110.0),
            rng.gen_range(-150.0..-60.0),
        );
        let travel = Vec3::new(rng.gen_range(-80.0..-30.0), rng.gen_range(-40.0..-15.0), 0.0);
        debug!("shooting star {id}");
        ui.send(UiCommand::ShootingStar {
            id,
            from: from.to_array(),
            to: (from + travel).to_array(),
        });
        let expires_at = at + f64::from(self.settings.lifetime.max(0.0));
        self.live.push(Transient { id, expires_at });
    }
}
