use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument};

use super::{dto::TodayStats, repo_types::FoodEntry, report::render_report};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries))
        .route("/entries/today", get(list_today))
        .route("/stats/today", get(today_stats))
        .route("/report", get(report))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/entries/:id", axum::routing::delete(delete_entry))
}

pub async fn list_entries(State(state): State<AppState>) -> Json<Vec<FoodEntry>> {
    Json(state.views.recent_entries.borrow().clone())
}

pub async fn list_today(State(state): State<AppState>) -> Json<Vec<FoodEntry>> {
    Json(state.views.today_entries.borrow().clone())
}

pub async fn today_stats(State(state): State<AppState>) -> Json<TodayStats> {
    Json(TodayStats {
        stats: *state.views.daily_stats.borrow(),
        goal: state.goal.get(),
        day_start: *state.views.day_start.borrow(),
    })
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let entry = match state.entries.get(id).await {
        Ok(Some(entry)) => entry,
        Ok(None) => return Err((StatusCode::NOT_FOUND, "Entry not found".into())),
        Err(e) => {
            error!(error = %e, id, "load entry failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    state.analyzer.delete_entry(&entry).await.map_err(|e| {
        error!(error = %e, id, "delete entry failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    info!(id, "entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /report: plain-text export of every entry.
#[instrument(skip(state))]
pub async fn report(State(state): State<AppState>) -> impl IntoResponse {
    match state.entries.list_all().await {
        Ok(entries) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            render_report(&entries, state.clock.now().offset()),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "report failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::repo_types::DailyStats;

    #[test]
    fn test_today_stats_serialization() {
        let body = TodayStats {
            stats: DailyStats {
                calories: 52,
                proteins: 0.3,
                fats: 0.2,
                carbs: 14.0,
            },
            goal: 2000,
            day_start: 1_773_100_800_000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stats"]["calories"], 52);
        assert_eq!(json["goal"], 2000);
        assert_eq!(json["dayStart"], 1_773_100_800_000_i64);
    }
}
