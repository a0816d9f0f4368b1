use axum::{routing::get, Router};

use crate::state::AppState;

pub mod calendar;
pub mod health;
pub mod pricing;
pub mod properties;
pub mod quotes;
pub mod reservations;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(properties::router())
        .merge(pricing::router())
        .merge(calendar::router())
        .merge(quotes::router())
        .merge(reservations::router())
}
