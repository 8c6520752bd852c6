use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{select, Either};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw model data returned by a [`ModelProvider`].
///
/// The bytes are opaque to the core; only the renderer interprets them. They
/// are reference counted so every clone of a model shares one copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub source: String,
    pub bytes: Arc<[u8]>,
    pub clips: Vec<String>,
}

impl ModelData {
    pub fn new(source: impl Into<String>, bytes: Vec<u8>, clips: Vec<String>) -> Self {
        Self {
            source: source.into(),
            bytes: Arc::from(bytes.into_boxed_slice()),
            clips,
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset `{0}` not found")]
    NotFound(String),
    #[error("failed to read `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode `{asset}`: {reason}")]
    Decode { asset: String, reason: String },
    #[error("object `{object}` lists no model candidates")]
    NoCandidates { object: String },
    #[error("object `{object}`: every candidate failed ({})", .attempts.join("; "))]
    AllCandidatesFailed {
        object: String,
        attempts: Vec<String>,
    },
    #[error("object `{object}`: load deadline of {deadline:?} passed after {tried} candidate(s)")]
    DeadlineExceeded {
        object: String,
        deadline: Duration,
        tried: usize,
    },
}

/// Source of model data, e.g. the filesystem or a browser fetch.
#[allow(async_fn_in_trait)]
pub trait ModelProvider {
    async fn load(&self, id: &str) -> Result<ModelData, AssetError>;
}

/// Monotonic time used to enforce load deadlines.
#[allow(async_fn_in_trait)]
pub trait TimeSource {
    fn now(&self) -> Duration;

    /// Completes once `duration` has passed.
    async fn sleep(&self, duration: Duration);
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy)]
pub struct InstantTimeSource {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl InstantTimeSource {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for InstantTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl TimeSource for InstantTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        let (done, fired) = futures::channel::oneshot::channel();
        std::thread::spawn(move || {
            std::thread::sleep(duration);
            let _ = done.send(());
        });
        let _ = fired.await;
    }
}

/// Loading tunables read from the scene manifest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadPolicy {
    /// Budget per object for working through its candidate list.
    pub deadline: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(10),
        }
    }
}

/// The candidate that loaded successfully.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub candidate: String,
    pub model: Arc<ModelData>,
}

/// Tries `candidates` in order and returns the first one that loads.
///
/// All attempts share one deadline. Each attempt races a timer for whatever
/// is left of it, so a provider that never settles still ends in
/// [`AssetError::DeadlineExceeded`]. The abandoned attempt is dropped.
pub async fn resolve_candidates<P, T>(
    provider: &P,
    object: &str,
    candidates: &[String],
    policy: &LoadPolicy,
    time: &T,
) -> Result<Resolved, AssetError>
where
    P: ModelProvider + ?Sized,
    T: TimeSource + ?Sized,
{
    if candidates.is_empty() {
        return Err(AssetError::NoCandidates {
            object: object.to_string(),
        });
    }
    let exceeded = |tried| AssetError::DeadlineExceeded {
        object: object.to_string(),
        deadline: policy.deadline,
        tried,
    };
    let started = time.now();
    let mut attempts = Vec::new();
    for (tried, candidate) in candidates.iter().enumerate() {
        let elapsed = time.now().saturating_sub(started);
        let remaining = policy.deadline.saturating_sub(elapsed);
        if remaining.is_zero() {
            return Err(exceeded(tried));
        }
        let load = pin!(provider.load(candidate));
        let timer = pin!(time.sleep(remaining));
        match select(load, timer).await {
            Either::Left((Ok(model), _)) => {
                return Ok(Resolved {
                    candidate: candidate.clone(),
                    model: Arc::new(model),
                })
            }
            Either::Left((Err(err), _)) => {
                debug!("{object}: candidate {candidate} failed: {err}");
                attempts.push(format!("{candidate}: {err}"));
            }
            Either::Right(((), _)) => {
                debug!("{object}: candidate {candidate} still pending at the deadline");
                return Err(exceeded(tried + 1));
            }
        }
    }
    Err(AssetError::AllCandidatesFailed {
        object: object.to_string(),
        attempts,
    })
}

/// One object that needs a model before the scene can start.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub object: String,
    pub candidates: Vec<String>,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub object: String,
    pub result: Result<Resolved, AssetError>,
}

/// Aggregated result of a loading phase. Every request has exactly one outcome.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub outcomes: Vec<LoadOutcome>,
}

impl LoadReport {
    pub fn model_for(&self, object: &str) -> Option<&Resolved> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.object == object)
            .and_then(|outcome| outcome.result.as_ref().ok())
    }

    pub fn loaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &AssetError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (o.object.as_str(), err)))
    }
}

/// Loads every request in order, best effort.
///
/// Failures are logged and recorded; they never abort the remaining loads.
/// `progress` receives `(finished, total, object)` after each request settles.
pub async fn load_all<P, T, F>(
    provider: &P,
    requests: &[LoadRequest],
    policy: &LoadPolicy,
    time: &T,
    mut progress: F,
) -> LoadReport
where
    P: ModelProvider + ?Sized,
    T: TimeSource + ?Sized,
    F: FnMut(usize, usize, &str),
{
    let mut report = LoadReport::default();
    for (index, request) in requests.iter().enumerate() {
        let result =
            resolve_candidates(provider, &request.object, &request.candidates, policy, time).await;
        match &result {
            Ok(resolved) => info!("loaded {} from {}", request.object, resolved.candidate),
            Err(err) => warn!("skipping {}: {err}", request.object),
        }
        report.outcomes.push(LoadOutcome {
            object: request.object.clone(),
            result,
        });
        progress(index + 1, requests.len(), &request.object);
    }
    report
}

/// Provider backed by an in-memory table; handy for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryModelProvider {
    models: HashMap<String, ModelData>,
}

impl MemoryModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, model: ModelData) {
        self.models.insert(id.into(), model);
    }

    pub fn with(mut self, id: impl Into<String>, clips: &[&str]) -> Self {
        let id = id.into();
        let clips = clips.iter().map(|c| c.to_string()).collect();
        self.models
            .insert(id.clone(), ModelData::new(id, vec![0u8; 4], clips));
        self
    }
}

impl ModelProvider for MemoryModelProvider {
    async fn load(&self, id: &str) -> Result<ModelData, AssetError> {
        self.models
            .get(id)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(id.to_string()))
    }
}

/// Reads model files relative to a root directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FsModelProvider {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FsModelProvider {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ModelProvider for FsModelProvider {
    async fn load(&self, id: &str) -> Result<ModelData, AssetError> {
        let path = self.root.join(id);
        if !path.is_file() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(&path).map_err(|source| AssetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(AssetError::Decode {
                asset: id.to_string(),
                reason: "file is empty".into(),
            });
        }
        Ok(ModelData::new(id, bytes, Vec::new()))
    }
}
