use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct GoalBody {
    pub goal: i64,
}

pub fn goal_routes() -> Router<AppState> {
    Router::new().route("/goal", get(get_goal).put(put_goal))
}

pub async fn get_goal(State(state): State<AppState>) -> Json<GoalBody> {
    Json(GoalBody {
        goal: state.goal.get(),
    })
}

#[instrument(skip(state))]
pub async fn put_goal(
    State(state): State<AppState>,
    Json(body): Json<GoalBody>,
) -> Result<Json<GoalBody>, (StatusCode, String)> {
    if body.goal <= 0 {
        warn!(goal = body.goal, "invalid calorie goal");
        return Err((StatusCode::BAD_REQUEST, "Goal must be positive".into()));
    }
    state
        .goal
        .update(body.goal)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(GoalBody {
        goal: state.goal.get(),
    }))
}
