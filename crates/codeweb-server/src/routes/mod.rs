//! HTTP routes

pub mod account;
pub mod question;

use axum::{routing::get, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::models::MessageResponse;
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .merge(account::router())
        .nest("/question", question::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to Coding Web"))
}
