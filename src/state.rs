use std::{sync::Arc, time::Duration};

use crate::analysis::{
    client::{GroqClient, InferenceClient},
    request::ModelSelection,
    services::Analyzer,
};
use crate::captures::{CaptureStore, LocalCaptures};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::db;
use crate::entries::{repo::EntryStore, views, views::Views};
use crate::prefs::{CalorieGoal, FilePreferences, PreferenceStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub entries: EntryStore,
    pub views: Views,
    pub analyzer: Analyzer,
    pub goal: CalorieGoal,
    pub captures: Arc<dyn CaptureStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = db::connect(&config.database_url).await?;
        let client = Arc::new(GroqClient::new(&config.groq)?) as Arc<dyn InferenceClient>;
        let prefs = Arc::new(FilePreferences::open(&config.prefs_path)?) as Arc<dyn PreferenceStore>;
        let captures = Arc::new(LocalCaptures::new(&config.capture_dir).await?) as Arc<dyn CaptureStore>;

        let clock = Arc::new(SystemClock::from_config(config.utc_offset_minutes)) as Arc<dyn Clock>;
        let models = ModelSelection::from(&config.groq);

        Ok(Self::from_parts(
            config, db, clock, client, prefs, captures, models,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        config: Arc<AppConfig>,
        db: sqlx::SqlitePool,
        clock: Arc<dyn Clock>,
        client: Arc<dyn InferenceClient>,
        prefs: Arc<dyn PreferenceStore>,
        captures: Arc<dyn CaptureStore>,
        models: ModelSelection,
    ) -> Self {
        let entries = EntryStore::new(db, clock.clone());
        let refresh = Duration::from_secs(config.day_refresh_secs);
        let (views, _task) = views::spawn(entries.clone(), clock.clone(), refresh);
        let analyzer = Analyzer::new(client, entries.clone(), captures.clone(), models);
        let goal = CalorieGoal::load(prefs);

        Self {
            config,
            clock,
            entries,
            views,
            analyzer,
            goal,
            captures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{dto::ChatCompletionRequest, errors::AnalysisError, services::AnalysisState};
    use crate::clock::ManualClock;
    use crate::config::GroqConfig;
    use crate::prefs::MemoryPreferences;
    use async_trait::async_trait;
    use time::macros::datetime;

    struct CannedInference(&'static str);

    #[async_trait]
    impl InferenceClient for CannedInference {
        async fn complete(&self, _request: &ChatCompletionRequest) -> Result<String, AnalysisError> {
            Ok(serde_json::json!({ "choices": [ { "message": { "content": self.0 } } ] }).to_string())
        }
    }

    async fn fake_state(reply: &'static str) -> AppState {
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            prefs_path: "unused.json".into(),
            capture_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            utc_offset_minutes: Some(0),
            day_refresh_secs: 3600,
            groq: GroqConfig {
                api_key: "fake_key".into(),
                base_url: "http://localhost".into(),
                text_model: "t".into(),
                vision_model: "v".into(),
                timeout_secs: 5,
            },
        });
        let db = db::connect_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(datetime!(2026-03-10 12:00 UTC)));
        let captures = LocalCaptures::new(std::env::temp_dir()).await.unwrap();
        AppState::from_parts(
            config,
            db,
            clock,
            Arc::new(CannedInference(reply)),
            Arc::new(MemoryPreferences::default()),
            Arc::new(captures),
            ModelSelection::default(),
        )
    }

    #[tokio::test]
    async fn analysis_flows_into_daily_stats_and_goal_is_independent() {
        let state = fake_state(
            r#"{"dishName":"Apple","calories":52,"proteins":0.3,"fats":0.2,"carbs":14.0,"description":"A fresh apple","aiTip":"..."}"#,
        )
        .await;
        let mut stats = state.views.daily_stats.clone();
        assert_eq!(stats.borrow().calories, 0);
        assert_eq!(state.goal.get(), 2000);

        state.analyzer.analyze_food(Some("apple".into()), None).await.unwrap();
        assert!(matches!(state.analyzer.state(), AnalysisState::Success(_)));

        tokio::time::timeout(Duration::from_secs(5), stats.wait_for(|s| s.calories == 52))
            .await
            .expect("daily stats updated")
            .unwrap();

        state.goal.update(2500).unwrap();
        assert_eq!(state.goal.get(), 2500);
        assert_eq!(state.views.daily_stats.borrow().calories, 52);
    }
}
