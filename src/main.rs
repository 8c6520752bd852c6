#[cfg(not(target_arch = "wasm32"))]
use std::{env, fs, path::Path, sync::Arc};

#[cfg(not(target_arch = "wasm32"))]
use anyhow::{anyhow, Context, Result};
#[cfg(not(target_arch = "wasm32"))]
use glam::Vec2;
#[cfg(not(target_arch = "wasm32"))]
use pollster::block_on;
#[cfg(not(target_arch = "wasm32"))]
use rand::{rngs::StdRng, SeedableRng};

#[cfg(not(target_arch = "wasm32"))]
use home_walkthrough::app::{
    print_final_state, print_load_summary, print_player, ConsoleUiSink, FileProbeAudioSink,
    HeadlessRenderer,
};
#[cfg(not(target_arch = "wasm32"))]
use home_walkthrough::{
    build_scene, Action, AmbientPlaylist, FsModelProvider, InputState, InstantTimeSource,
    SceneManifest, DEFAULT_TRACK_CANDIDATES,
};

#[cfg(not(target_arch = "wasm32"))]
const FRAME_DELTA: f32 = 1.0 / 60.0;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read manifest {}", options.path))?;
    let manifest = SceneManifest::from_xml(&xml)
        .with_context(|| format!("failed to parse manifest {}", options.path))?;
    let root = Path::new(&options.path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let input = Arc::new(InputState::new());
    let mut ui = ConsoleUiSink::new(Arc::clone(&input)).quiet_effects(!options.verbose_ui);
    let rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let provider = FsModelProvider::new(root);
    let built = block_on(build_scene(
        &manifest,
        &provider,
        &InstantTimeSource::new(),
        rng,
        &mut ui,
    ));
    print_load_summary(manifest.objects.len(), &built.report);
    let mut ctx = built.context;

    let mut audio = FileProbeAudioSink::new(root);
    ctx.playlist = if manifest.tracks.is_empty() {
        AmbientPlaylist::probe(&mut audio, DEFAULT_TRACK_CANDIDATES, &mut ui)
    } else {
        AmbientPlaylist::probe(&mut audio, &manifest.tracks, &mut ui)
    };
    ctx.enter(&mut audio, &mut ui);

    let bindings = input.bindings().clone();
    let key = |action: Action| {
        bindings
            .key_for(action)
            .ok_or_else(|| anyhow!("no key is bound to {action:?}"))
    };
    for action in &options.hold {
        input.set_key_down(key(*action)?);
    }
    let interact = key(Action::Interact)?;
    let cancel = key(Action::Cancel)?;

    let mut renderer = HeadlessRenderer::default();
    for frame in 0..options.frames {
        let pressed = [
            (interact, options.interact_at.contains(&frame)),
            (cancel, options.cancel_at.contains(&frame)),
        ];
        for (key, down) in pressed {
            if down {
                input.set_key_down(key);
            }
        }
        input.add_pointer_delta(options.look);
        let sample = input.take_frame();
        ctx.frame(FRAME_DELTA, &sample, &mut ui, &mut renderer);
        for (key, down) in pressed {
            if down {
                input.set_key_up(key);
            }
        }
    }

    println!(
        "Simulated {} frame(s), {:.2}s elapsed",
        renderer.frames,
        ctx.clock.elapsed()
    );
    print_final_state(&ctx.graph);
    print_player(&ctx);
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    path: String,
    frames: u64,
    hold: Vec<Action>,
    interact_at: Vec<u64>,
    cancel_at: Vec<u64>,
    look: Vec2,
    seed: Option<u64>,
    verbose_ui: bool,
}

#[cfg(not(target_arch = "wasm32"))]
const USAGE: &str = "Usage: home-walkthrough <scene.xml> [--frames N] [--hold ACTION]... \
[--interact-at FRAME]... [--cancel-at FRAME]... [--look DX,DY] [--seed N] [--verbose-ui]";

#[cfg(not(target_arch = "wasm32"))]
impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(path) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            path,
            frames: 60,
            hold: Vec::new(),
            interact_at: Vec::new(),
            cancel_at: Vec::new(),
            look: Vec2::ZERO,
            seed: None,
            verbose_ui: false,
        };
        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| anyhow!("{arg} expects a value"))
            };
            match arg.as_str() {
                "--frames" => options.frames = parse_number(&value()?)?,
                "--hold" => {
                    let name = value()?;
                    let action = Action::from_name(&name)
                        .ok_or_else(|| anyhow!("unknown action `{name}`"))?;
                    options.hold.push(action);
                }
                "--interact-at" => options.interact_at.push(parse_number(&value()?)?),
                "--cancel-at" => options.cancel_at.push(parse_number(&value()?)?),
                "--look" => options.look = parse_look(&value()?)?,
                "--seed" => options.seed = Some(parse_number(&value()?)?),
                "--verbose-ui" => options.verbose_ui = true,
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn parse_number(value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("`{value}` is not a whole number"))
}

#[cfg(not(target_arch = "wasm32"))]
fn parse_look(value: &str) -> Result<Vec2> {
    let (dx, dy) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("--look expects DX,DY"))?;
    let dx: f32 = dx.trim().parse().context("invalid DX")?;
    let dy: f32 = dy.trim().parse().context("invalid DY")?;
    if !dx.is_finite() || !dy.is_finite() {
        return Err(anyhow!("--look values must be finite"));
    }
    Ok(Vec2::new(dx, dy))
}
