pub mod api;
pub mod assets;
pub mod auth;
pub mod home;
pub mod rest;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(rest::router())
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
