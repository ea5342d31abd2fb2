//! Lazily initialised, process-wide model instance.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::detection_runners::Detector;
use crate::error::LoadError;
use crate::provisioning::ModelProvisioner;

/// Shared handle to the one loaded detector.
pub type ModelHandle = Arc<dyn Detector>;

/// Builds a detector from an artifact that is already on local disk.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<ModelHandle, LoadError>;
}

enum Slot {
    Empty,
    Loading,
    Ready(ModelHandle),
}

struct State {
    slot: Slot,
    /// Incremented every time an initialisation attempt starts.
    attempt: u64,
    last_failure: Option<(u64, LoadError)>,
}

pub struct ModelCache {
    provisioner: ModelProvisioner,
    loader: Arc<dyn ModelLoader>,
    artifact_path: PathBuf,
    state: Mutex<State>,
    settled: Condvar,
    loads: AtomicUsize,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("artifact_path", &self.artifact_path)
            .field("provisioner", &self.provisioner)
            .field("loaded", &self.is_loaded())
            .field("load_count", &self.load_count())
            .finish()
    }
}

/// Puts the cache back to `Empty` if the attempt unwinds before settling.
struct AttemptGuard<'a> {
    cache: &'a ModelCache,
    attempt: u64,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::error!("Model initialisation attempt {} panicked", self.attempt);
            let mut state = self.cache.state.lock();
            state.slot = Slot::Empty;
            state.last_failure = Some((self.attempt, LoadError::Panicked));
            self.cache.settled.notify_all();
        }
    }
}

impl ModelCache {
    pub fn new(provisioner: ModelProvisioner, loader: Arc<dyn ModelLoader>, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            provisioner,
            loader,
            artifact_path: artifact_path.into(),
            state: Mutex::new(State {
                slot: Slot::Empty,
                attempt: 0,
                last_failure: None,
            }),
            settled: Condvar::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Returns the loaded model, provisioning and loading it on first use.
    ///
    /// Concurrent first callers share a single attempt and all observe its
    /// outcome. A failed attempt is not remembered as the cached state: the
    /// next call starts a new one.
    pub fn get_model(&self) -> Result<ModelHandle, LoadError> {
        let mut state = self.state.lock();
        loop {
            match &state.slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Loading => {
                    let attempt = state.attempt;
                    while matches!(state.slot, Slot::Loading) && state.attempt == attempt {
                        self.settled.wait(&mut state);
                    }
                    if let Some((failed, err)) = &state.last_failure {
                        if *failed == attempt {
                            return Err(err.clone());
                        }
                    }
                }
                Slot::Empty => break,
            }
        }

        state.attempt += 1;
        let attempt = state.attempt;
        state.slot = Slot::Loading;
        drop(state);

        let mut guard = AttemptGuard {
            cache: self,
            attempt,
            armed: true,
        };
        let result = self.initialise();
        guard.armed = false;

        let mut state = self.state.lock();
        match &result {
            Ok(handle) => {
                state.slot = Slot::Ready(handle.clone());
                state.last_failure = None;
            }
            Err(err) => {
                state.slot = Slot::Empty;
                state.last_failure = Some((attempt, err.clone()));
            }
        }
        self.settled.notify_all();
        result
    }

    fn initialise(&self) -> Result<ModelHandle, LoadError> {
        let now = Instant::now();
        self.provisioner.ensure_artifact(&self.artifact_path)?;

        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.loader.load(&self.artifact_path) {
            Ok(handle) => {
                log::info!("Loaded {} from {} in {:?}", handle.name(), self.artifact_path.display(), now.elapsed());
                Ok(handle)
            }
            Err(err) => {
                log::error!("Failed to load model from {}: {err}", self.artifact_path.display());
                Err(err)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state.lock().slot, Slot::Ready(_))
    }

    /// How many times the loader has been invoked.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}
