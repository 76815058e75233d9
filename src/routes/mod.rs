use axum::{routing::get, Router};

use crate::state::AppState;

pub mod analytics;
pub mod bookings;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod services;
pub mod shortlets;
pub mod users;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(shortlets::router())
        .merge(bookings::router())
        .merge(payments::router())
        .merge(services::router())
        .merge(users::router())
        .merge(notifications::router())
        .merge(analytics::router())
}
