use serde::Deserialize;

pub const DEFAULT_TEXT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";

#[derive(Debug, Clone, Deserialize)]
pub struct GroqConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub prefs_path: String,
    pub capture_dir: String,
    pub utc_offset_minutes: Option<i32>,
    pub day_refresh_secs: u64,
    pub groq: GroqConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let groq = GroqConfig {
            api_key: std::env::var("GROQ_API_KEY")?,
            base_url: std::env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".into()),
            text_model: std::env::var("TEXT_MODEL").unwrap_or_else(|_| DEFAULT_TEXT_MODEL.into()),
            vision_model: std::env::var("VISION_MODEL")
                .unwrap_or_else(|_| DEFAULT_VISION_MODEL.into()),
            timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://nutrisnap.db".into()),
            prefs_path: std::env::var("PREFS_PATH")
                .unwrap_or_else(|_| "nutrisnap_prefs.json".into()),
            capture_dir: std::env::var("CAPTURE_DIR").unwrap_or_else(|_| "captures".into()),
            utc_offset_minutes: std::env::var("LOCAL_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i32>().ok()),
            day_refresh_secs: std::env::var("DAY_REFRESH_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(3600),
            groq,
        })
    }
}
