use serde::Serialize;

use super::repo_types::DailyStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStats {
    pub stats: DailyStats,
    pub goal: i64,
    pub day_start: i64,
}
