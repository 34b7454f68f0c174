use std::sync::Arc;

use axum::{extract::State, Json};

use atelier_core::joke::Joke;

use crate::{error::AppError, state::AppState};

/// `GET /api/random-joke`: one joke picked uniformly at random.
///
/// `503 {"error":"No jokes available"}` when the table is empty.
#[tracing::instrument(skip(state))]
pub async fn random_joke(State(state): State<Arc<AppState>>) -> Result<Json<Joke>, AppError> {
    match state.db.random_joke().await? {
        Some(joke) => Ok(Json(joke)),
        None => {
            tracing::warn!("Random joke requested but the jokes table is empty");
            Err(AppError::ServiceUnavailable("No jokes available".to_string()))
        }
    }
}
