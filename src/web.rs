#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use crate::assets::{AssetError, ModelData, ModelProvider, TimeSource};
use crate::audio::{AmbientPlaylist, AudioError, AudioSink};
use crate::builder::build_scene;
use crate::frame::{CameraPose, RenderSink, SceneContext};
use crate::input::{InputState, KeyCode};
use crate::manifest::SceneManifest;
use crate::scene_graph::SceneGraph;
use crate::ui::{UiCommand, UiSink};

/// Floats per node in [`WebWalkthrough::transforms`]: position, rotation, scale.
const TRANSFORM_STRIDE: usize = 9;

/// Calls a JS loader `(id) => Promise<Uint8Array | { bytes, clips }>`.
struct JsModelProvider {
    loader: js_sys::Function,
}

impl ModelProvider for JsModelProvider {
    async fn load(&self, id: &str) -> Result<ModelData, AssetError> {
        let decode = |reason: String| AssetError::Decode {
            asset: id.to_string(),
            reason,
        };
        let value = self
            .loader
            .call1(&JsValue::NULL, &JsValue::from_str(id))
            .map_err(|err| decode(format!("loader threw: {err:?}")))?;
        let promise: js_sys::Promise = value
            .dyn_into()
            .map_err(|_| decode("loader did not return a Promise".into()))?;
        let loaded = JsFuture::from(promise)
            .await
            .map_err(|err| {
                log::debug!("loader rejected {id}: {err:?}");
                AssetError::NotFound(id.to_string())
            })?;

        if let Some(bytes) = loaded.dyn_ref::<js_sys::Uint8Array>() {
            return Ok(ModelData::new(id, bytes.to_vec(), Vec::new()));
        }
        let bytes = js_sys::Reflect::get(&loaded, &JsValue::from_str("bytes"))
            .ok()
            .and_then(|bytes| bytes.dyn_into::<js_sys::Uint8Array>().ok())
            .ok_or_else(|| decode("result has no `bytes` Uint8Array".into()))?;
        let clips = js_sys::Reflect::get(&loaded, &JsValue::from_str("clips"))
            .ok()
            .and_then(|clips| clips.dyn_into::<js_sys::Array>().ok())
            .map(|clips| clips.iter().filter_map(|clip| clip.as_string()).collect())
            .unwrap_or_default();
        Ok(ModelData::new(id, bytes.to_vec(), clips))
    }
}

struct PerformanceTimeSource {
    performance: Option<web_sys::Performance>,
}

impl PerformanceTimeSource {
    fn new() -> Self {
        Self {
            performance: web_sys::window().and_then(|window| window.performance()),
        }
    }
}

impl TimeSource for PerformanceTimeSource {
    fn now(&self) -> Duration {
        let millis = self.performance.as_ref().map_or(0.0, |p| p.now());
        Duration::from_secs_f64(millis.max(0.0) / 1000.0)
    }

    async fn sleep(&self, duration: Duration) {
        let Some(window) = web_sys::window() else {
            log::debug!("no window, load deadlines are not enforced");
            return std::future::pending().await;
        };
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let timer = js_sys::Promise::new(&mut |resolve, _reject| {
            if let Err(err) =
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
            {
                log::warn!("setTimeout failed: {err:?}");
            }
        });
        let _ = JsFuture::from(timer).await;
    }
}

/// Forwards each command to a JS callback as a `{ kind, data }` object.
struct JsUiSink {
    callback: js_sys::Function,
}

impl UiSink for JsUiSink {
    fn send(&mut self, command: UiCommand) {
        let value = match serde_wasm_bindgen::to_value(&command) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("failed to serialize `{command}`: {err}");
                return;
            }
        };
        if let Err(err) = self.callback.call1(&JsValue::NULL, &value) {
            log::warn!("ui callback failed: {err:?}");
        }
    }
}

/// `<audio>` element playback. The page probes tracks and passes the playable ones in.
struct WebAudioSink {
    element: Option<web_sys::HtmlAudioElement>,
    available: Vec<String>,
    rejected: Rc<RefCell<Option<AudioError>>>,
}

impl AudioSink for WebAudioSink {
    fn probe(&mut self, path: &str) -> bool {
        self.available.iter().any(|known| known == path)
    }

    fn set_source(&mut self, path: &str) {
        if let Some(element) = &self.element {
            element.set_src(path);
        }
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let element = self.element.as_ref().ok_or(AudioError::NoTracks)?;
        let promise = element
            .play()
            .map_err(|err| AudioError::PlaybackRejected(format!("{err:?}")))?;
        let rejected = Rc::clone(&self.rejected);
        spawn_local(async move {
            if let Err(err) = JsFuture::from(promise).await {
                *rejected.borrow_mut() = Some(AudioError::PlaybackRejected(format!("{err:?}")));
            }
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(element) = &self.element {
            let _ = element.pause();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(element) = &self.element {
            element.set_volume(f64::from(volume));
        }
    }
}

/// The page draws from [`WebWalkthrough::transforms`] itself.
#[derive(Default)]
struct CameraOnly {
    camera: Option<CameraPose>,
}

impl RenderSink for CameraOnly {
    fn render(&mut self, camera: &CameraPose, _scene: &SceneGraph) {
        self.camera = Some(*camera);
    }
}

#[wasm_bindgen]
pub struct WebWalkthrough {
    ctx: SceneContext,
    input: InputState,
    ui: JsUiSink,
    audio: WebAudioSink,
    render: CameraOnly,
}

/// Parses the manifest, loads every model through `loader` and returns the
/// walkthrough in its menu phase.
#[wasm_bindgen(js_name = loadWalkthrough)]
pub async fn load_walkthrough(
    manifest_xml: String,
    loader: js_sys::Function,
    ui_callback: js_sys::Function,
    tracks: js_sys::Array,
) -> Result<WebWalkthrough, JsValue> {
    console_error_panic_hook::set_once();

    let manifest = SceneManifest::from_xml(&manifest_xml)
        .map_err(|err| JsValue::from_str(&format!("failed to parse manifest: {err:#}")))?;
    let mut ui = JsUiSink {
        callback: ui_callback,
    };
    let provider = JsModelProvider { loader };
    let built = build_scene(
        &manifest,
        &provider,
        &PerformanceTimeSource::new(),
        StdRng::from_entropy(),
        &mut ui,
    )
    .await;
    for (object, err) in built.report.failures() {
        log_to_console(&format!("skipped {object}: {err}"));
    }

    let mut audio = WebAudioSink {
        element: web_sys::HtmlAudioElement::new().ok(),
        available: tracks.iter().filter_map(|t| t.as_string()).collect(),
        rejected: Rc::new(RefCell::new(None)),
    };
    let mut ctx = built.context;
    let candidates = audio.available.clone();
    ctx.playlist = AmbientPlaylist::probe(&mut audio, &candidates, &mut ui);

    Ok(WebWalkthrough {
        ctx,
        input: InputState::new(),
        ui,
        audio,
        render: CameraOnly::default(),
    })
}

#[wasm_bindgen]
impl WebWalkthrough {
    /// `code` is a DOM `KeyboardEvent.code`.
    pub fn key_down(&self, code: &str) {
        if let Some(key) = KeyCode::from_name(code) {
            self.input.set_key_down(key);
        }
    }

    pub fn key_up(&self, code: &str) {
        if let Some(key) = KeyCode::from_name(code) {
            self.input.set_key_up(key);
        }
    }

    pub fn pointer_move(&self, dx: f32, dy: f32) {
        self.input.add_pointer_delta(Vec2::new(dx, dy));
    }

    /// Call from `pointerlockchange`.
    pub fn set_look_locked(&self, locked: bool) {
        self.input.set_look_locked(locked);
    }

    pub fn enter(&mut self) -> bool {
        self.ctx.enter(&mut self.audio, &mut self.ui)
    }

    pub fn close_modal(&mut self) {
        self.ctx.close_modal(&mut self.ui);
    }

    pub fn toggle_music(&mut self) {
        let _ = self.ctx.playlist.toggle(&mut self.audio, &mut self.ui);
    }

    pub fn next_track(&mut self) {
        let _ = self.ctx.playlist.next(&mut self.audio, &mut self.ui);
    }

    pub fn previous_track(&mut self) {
        let _ = self.ctx.playlist.previous(&mut self.audio, &mut self.ui);
    }

    pub fn track_ended(&mut self) {
        let _ = self.ctx.playlist.track_ended(&mut self.audio, &mut self.ui);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.ctx.playlist.set_volume(&mut self.audio, volume);
    }

    /// Runs one frame; `now_ms` is the `requestAnimationFrame` timestamp.
    pub fn frame(&mut self, now_ms: f64) {
        if let Some(err) = self.audio.rejected.borrow_mut().take() {
            self.ctx.playlist.playback_rejected(&err, &mut self.ui);
        }
        let sample = self.input.take_frame();
        self.ctx
            .frame_at(now_ms / 1000.0, &sample, &mut self.ui, &mut self.render);
    }

    /// Node transforms in graph order, nine floats per node.
    pub fn transforms(&self) -> js_sys::Float32Array {
        let mut data = Vec::with_capacity(self.ctx.graph.len() * TRANSFORM_STRIDE);
        for (_, node) in self.ctx.graph.iter() {
            let t = &node.transform;
            data.extend_from_slice(&t.position.to_array());
            data.extend_from_slice(&t.rotation.to_array());
            data.extend_from_slice(&t.scale.to_array());
        }
        js_sys::Float32Array::from(data.as_slice())
    }

    pub fn node_names(&self) -> js_sys::Array {
        self.ctx
            .graph
            .iter()
            .map(|(_, node)| JsValue::from_str(&node.name))
            .collect()
    }

    /// Camera as `[x, y, z, yaw, pitch]`.
    pub fn camera(&self) -> js_sys::Float32Array {
        let camera = self.render.camera.unwrap_or_else(|| self.ctx.camera());
        let p = camera.position;
        js_sys::Float32Array::from(&[p.x, p.y, p.z, camera.yaw, camera.pitch][..])
    }

    pub fn target_name(&self) -> Option<String> {
        self.ctx
            .current_target()
            .map(|entry| entry.label.name.clone())
    }

    pub fn phase(&self) -> String {
        self.ctx.phase().to_string()
    }
}

fn log_to_console(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}
