use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::models::{HealthEnv, HealthResponse};
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.store.len(),
        env: HealthEnv {
            completion: state.completion_configured,
            pdfco: state.pdfco_configured,
        },
    })
}
