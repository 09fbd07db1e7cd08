pub mod compare;
pub mod documents;
pub mod health;
pub mod releases;

use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Success half of the response envelope.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    status: &'static str,
    content: T,
}

pub fn success<T: Serialize>(content: T) -> Json<Success<T>> {
    Json(Success {
        status: "success",
        content,
    })
}

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(releases::routes())
        .merge(documents::routes())
        .merge(compare::routes())
        .with_state(state)
}
