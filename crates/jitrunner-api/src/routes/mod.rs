//! API routes.

pub mod health;
pub mod intake;

use crate::AppState;
use axum::Router;

/// Build the intake router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(intake::router())
        .merge(health::router())
        .with_state(state)
}
