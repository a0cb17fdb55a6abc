use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use bytes::Bytes;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, instrument, warn};

use super::{
    client::InferenceClient,
    dto::FoodAnalysis,
    errors::AnalysisError,
    request::{build_request, ModelSelection},
    response::decode_body,
};
use crate::captures::CaptureStore;
use crate::entries::{
    repo::EntryStore,
    repo_types::{FoodEntry, NewEntry},
};

/// What the analyzer is doing right now, as rendered by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum AnalysisState {
    Idle,
    Loading,
    Success(FoodAnalysis),
    Error(String),
}

/// Owns the Idle → Loading → Success | Error lifecycle and the single-step undo slot.
///
/// Only the newest attempt may settle: each call to [`Analyzer::analyze_food`]
/// takes a generation number, and a completion from an older generation
/// leaves the state alone and removes whatever it persisted.
///
/// Each attempt's task resolves to that attempt's own outcome. A superseded
/// attempt resolves to `Error("Superseded by a newer analysis")`, which is
/// never published.
#[derive(Clone)]
pub struct Analyzer {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn InferenceClient>,
    store: EntryStore,
    captures: Arc<dyn CaptureStore>,
    models: ModelSelection,
    state: watch::Sender<AnalysisState>,
    generation: AtomicU64,
    last_inserted: Mutex<Option<i64>>,
}

impl Analyzer {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        store: EntryStore,
        captures: Arc<dyn CaptureStore>,
        models: ModelSelection,
    ) -> Self {
        let (state, _) = watch::channel(AnalysisState::Idle);
        Self {
            inner: Arc::new(Inner {
                client,
                store,
                captures,
                models,
                state,
                generation: AtomicU64::new(0),
                last_inserted: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> AnalysisState {
        self.inner.state.borrow().clone()
    }

    /// Id that [`Analyzer::undo_last_action`] would delete.
    pub fn last_inserted(&self) -> Option<i64> {
        *self.inner.slot()
    }

    /// Start an analysis. The state is `Loading` by the time this returns.
    pub fn analyze_food(&self, text: Option<String>, image: Option<Bytes>) -> JoinHandle<AnalysisState> {
        let generation = self.inner.begin();
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(generation, text, image, None).await })
    }

    /// Like [`Analyzer::analyze_food`], reading the image from a stored capture first.
    /// The capture is removed again unless an entry ends up referring to it.
    pub fn analyze_food_from_capture(&self, path: PathBuf) -> JoinHandle<AnalysisState> {
        let generation = self.inner.begin();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let image = match tokio::fs::read(&path).await {
                Ok(bytes) => Bytes::from(bytes),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "capture read failed");
                    inner.discard_capture(Some(path.as_path())).await;
                    return inner.fail(generation, AnalysisError::Capture(e.to_string()));
                }
            };
            inner.run(generation, None, Some(image), Some(path)).await
        })
    }

    /// Delete the entry recorded by the last successful analysis, once.
    #[instrument(skip(self))]
    pub async fn undo_last_action(&self) -> anyhow::Result<Option<i64>> {
        let Some(id) = self.inner.slot().take() else {
            debug!("nothing to undo");
            return Ok(None);
        };
        let entry = self.inner.store.get(id).await?;
        self.inner.store.delete_by_id(id).await?;
        if let Some(path) = entry.and_then(|e| e.image_path) {
            self.inner.discard_capture(Some(Path::new(&path))).await;
        }
        info!(id, "last entry undone");
        Ok(Some(id))
    }

    /// Remove an entry directly; the undo slot is cleared if it pointed at it.
    #[instrument(skip(self, entry), fields(id = entry.id))]
    pub async fn delete_entry(&self, entry: &FoodEntry) -> anyhow::Result<bool> {
        {
            let mut slot = self.inner.slot();
            if *slot == Some(entry.id) {
                *slot = None;
            }
        }
        let removed = self.inner.store.delete(entry).await?;
        if removed {
            self.inner
                .discard_capture(entry.image_path.as_deref().map(Path::new))
                .await;
        }
        Ok(removed)
    }
}

fn superseded() -> AnalysisState {
    AnalysisState::Error(AnalysisError::Superseded.to_string())
}

impl Inner {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<i64>> {
        self.last_inserted.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = AnalysisState::Loading;
        });
        debug!(generation, "analysis started");
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Publish `next` if `generation` is still the newest attempt.
    fn settle(&self, generation: u64, next: AnalysisState) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            *state = next;
            true
        })
    }

    fn fail(&self, generation: u64, err: AnalysisError) -> AnalysisState {
        let kind = err.kind();
        let outcome = AnalysisState::Error(err.to_string());
        if self.settle(generation, outcome.clone()) {
            warn!(generation, kind, error = %err, "analysis failed");
            outcome
        } else {
            debug!(generation, kind, "superseded analysis failed; ignored");
            superseded()
        }
    }

    async fn discard_capture(&self, path: Option<&Path>) {
        let Some(path) = path else { return };
        if let Err(e) = self.captures.remove(path).await {
            warn!(error = %e, path = %path.display(), "capture cleanup failed");
        }
    }

    async fn run(
        &self,
        generation: u64,
        text: Option<String>,
        image: Option<Bytes>,
        capture: Option<PathBuf>,
    ) -> AnalysisState {
        let request = build_request(text.as_deref(), image.as_deref(), &self.models);
        debug!(generation, model = %request.model, "dispatching analysis");

        let analysis = match self.client.complete(&request).await.and_then(|body| decode_body(&body)) {
            Ok(analysis) => analysis,
            Err(e) => {
                self.discard_capture(capture.as_deref()).await;
                return self.fail(generation, e);
            }
        };

        if !self.is_current(generation) {
            debug!(generation, "analysis superseded before saving; dropped");
            self.discard_capture(capture.as_deref()).await;
            return superseded();
        }

        let image_path = capture.as_ref().map(|p| p.to_string_lossy().into_owned());
        let id = match self.store.insert(NewEntry::from_analysis(&analysis, image_path)).await {
            Ok(id) => id,
            Err(e) => {
                self.discard_capture(capture.as_deref()).await;
                return self.fail(generation, AnalysisError::Persistence(format!("{e:#}")));
            }
        };

        let calories = analysis.calories;
        let outcome = AnalysisState::Success(analysis);
        let accepted = {
            let mut slot = self.slot();
            let accepted = self.settle(generation, outcome.clone());
            if accepted {
                *slot = Some(id);
            }
            accepted
        };

        if accepted {
            info!(generation, id, calories, "analysis saved");
            return outcome;
        }
        match self.store.delete_by_id(id).await {
            Ok(_) => {
                debug!(generation, id, "superseded analysis rolled back");
                self.discard_capture(capture.as_deref()).await;
            }
            Err(e) => warn!(generation, id, error = %e, "rollback of superseded entry failed"),
        }
        superseded()
    }
}
