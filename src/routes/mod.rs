use crate::models::AppState;
use axum::Router;

pub mod api_routes;
pub mod kiosk_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes::router())
        .nest("/kiosk", kiosk_routes::router())
        .with_state(state)
}
