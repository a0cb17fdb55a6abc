pub mod client;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod request;
pub mod response;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::analysis_routes()
}
