use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::goal_routes()
}

pub const KEY_CALORIE_GOAL: &str = "calorie_goal";
pub const DEFAULT_CALORIE_GOAL: i64 = 2000;

/// Small synchronous key-value settings store.
pub trait PreferenceStore: Send + Sync {
    fn get_int(&self, key: &str) -> Option<i64>;
    fn set_int(&self, key: &str, value: i64) -> anyhow::Result<()>;
}

/// Settings kept as a JSON object on disk, rewritten on every change.
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl FilePreferences {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parse preferences {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("read preferences {}", path.display()))
            }
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }
}

impl PreferenceStore for FilePreferences {
    fn get_int(&self, key: &str) -> Option<i64> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).and_then(serde_json::Value::as_i64)
    }

    fn set_int(&self, key: &str, value: i64) -> anyhow::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_owned(), value.into());
        let raw = serde_json::to_string_pretty(&*values)?;
        // write aside, then swap in, so a crash never leaves a truncated file
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, raw)
            .with_context(|| format!("write preferences {}", staging.display()))?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("replace preferences {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, i64>>,
}

impl PreferenceStore for MemoryPreferences {
    fn get_int(&self, key: &str) -> Option<i64> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
    }

    fn set_int(&self, key: &str, value: i64) -> anyhow::Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_owned(), value);
        Ok(())
    }
}

/// Daily calorie target: persisted on change and broadcast to subscribers.
#[derive(Clone)]
pub struct CalorieGoal {
    prefs: Arc<dyn PreferenceStore>,
    current: Arc<watch::Sender<i64>>,
}

impl CalorieGoal {
    pub fn load(prefs: Arc<dyn PreferenceStore>) -> Self {
        let stored = prefs
            .get_int(KEY_CALORIE_GOAL)
            .filter(|goal| *goal > 0)
            .unwrap_or(DEFAULT_CALORIE_GOAL);
        let (current, _) = watch::channel(stored);
        Self {
            prefs,
            current: Arc::new(current),
        }
    }

    pub fn get(&self) -> i64 {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.current.subscribe()
    }

    pub fn update(&self, goal: i64) -> anyhow::Result<()> {
        if goal <= 0 {
            warn!(goal, "rejected non-positive calorie goal");
            anyhow::bail!("calorie goal must be positive");
        }
        self.prefs.set_int(KEY_CALORIE_GOAL, goal)?;
        self.current.send_replace(goal);
        info!(goal, "calorie goal updated");
        Ok(())
    }
}
