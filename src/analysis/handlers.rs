use std::convert::Infallible;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use serde::Serialize;
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tracing::{error, instrument, warn};

use super::{dto::AnalyzeRequest, services::AnalysisState};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResponse {
    pub undone_id: Option<i64>,
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyze/capture", post(analyze_capture))
        .route("/state", get(current_state))
        .route("/events", get(state_events))
        .route("/undo", post(undo))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// POST /analyze { text?, imageBase64? }
///
/// Responds with this request's own outcome; `GET /state` is the shared one.
#[instrument(skip(state, body))]
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisState>, (StatusCode, String)> {
    let image = match body.image_base64.as_deref() {
        Some(b64) => Some(Bytes::from(decode_image(b64)?)),
        None => None,
    };

    let outcome = state
        .analyzer
        .analyze_food(body.text, image)
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

/// POST /analyze/capture (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn analyze_capture(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<Json<AnalysisState>, (StatusCode, String)> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "image/jpeg".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            upload = Some((data, content_type));
            break;
        }
    }
    let Some((data, content_type)) = upload else {
        return Err((StatusCode::BAD_REQUEST, "file is required".into()));
    };

    let path = state
        .captures
        .save(data, &content_type)
        .await
        .map_err(|e| {
            warn!(error = %e, "capture rejected");
            (StatusCode::BAD_REQUEST, e.to_string())
        })?;

    let outcome = state
        .analyzer
        .analyze_food_from_capture(path)
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

pub async fn current_state(State(state): State<AppState>) -> Json<AnalysisState> {
    Json(state.analyzer.state())
}

/// Server-sent events, one per state change, starting with the current one.
pub async fn state_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.analyzer.subscribe()).map(|s| {
        let event = Event::default().event("state");
        Ok(event.json_data(&s).unwrap_or_else(|e| {
            error!(error = %e, "state event encoding failed");
            Event::default().event("state").data("{}")
        }))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[instrument(skip(state))]
pub async fn undo(
    State(state): State<AppState>,
) -> Result<Json<UndoResponse>, (StatusCode, String)> {
    let undone_id = state.analyzer.undo_last_action().await.map_err(|e| {
        error!(error = %e, "undo failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(UndoResponse { undone_id }))
}

fn decode_image(b64: &str) -> Result<Vec<u8>, (StatusCode, String)> {
    let trimmed = b64
        .split_once(";base64,")
        .map(|(_, data)| data)
        .unwrap_or(b64)
        .trim();
    Base64::decode_vec(trimmed).map_err(|_| (StatusCode::BAD_REQUEST, "invalid base64".into()))
}

fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
