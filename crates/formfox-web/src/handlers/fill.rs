use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use formfox_core::backend::DocumentError;
use formfox_core::field::Field;
use formfox_core::fill::{FillError, dispatch_fill};
use formfox_core::session::{Session, SourceRef};

use crate::error::ApiError;
use crate::models::{FillRequest, FillResponse};
use crate::state::AppState;

/// Produce the filled document.
///
/// Works off a stored session (removed on success, so a finished form can't
/// be filled twice against a stale temp file) or, client-authoritatively,
/// off a hosted URL plus inline values.
pub async fn fill(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FillRequest>,
) -> Result<Json<FillResponse>, ApiError> {
    let (session, stored_id) = match req.session_id.as_deref() {
        Some(id) if !id.is_empty() => {
            let session = state
                .store
                .get(id)
                .ok_or_else(|| ApiError::not_found(format!("unknown session: {id}")))?;
            (session, Some(id.to_string()))
        }
        _ => {
            let url = req
                .pdf_url
                .clone()
                .ok_or_else(|| ApiError::bad_request("Keine PDF-Quelle angegeben."))?;
            let fields = req.fields.iter().map(|fv| Field::new(&fv.name)).collect();
            let mut session = Session::new(fields, Some(SourceRef::Remote(url)));
            session.values = req
                .fields
                .into_iter()
                .map(|fv| (fv.name, fv.value))
                .collect();
            (session, None)
        }
    };

    let url = dispatch_fill(&session, state.doc.as_ref(), &state.config)
        .await
        .map_err(map_fill_err)?;

    if let Some(id) = stored_id {
        state.store.remove(&id);
        tracing::info!(session = %id, "session closed after fill");
    }

    Ok(Json(FillResponse { success: true, url }))
}

fn map_fill_err(e: FillError) -> ApiError {
    match e {
        FillError::NoSource => ApiError::bad_request("Keine PDF-Quelle angegeben."),
        FillError::Document(DocumentError::NotFound) => ApiError::not_found(
            "Die Originaldatei ist nicht mehr vorhanden. Bitte lade sie erneut hoch.",
        ),
        FillError::Document(DocumentError::Timeout) => ApiError::unavailable(
            "Der Dokumentdienst ist gerade nicht erreichbar. Bitte versuche es gleich erneut.",
        ),
        // Remote and upload failures carry the service's message verbatim.
        FillError::Document(other) => ApiError::bad_gateway(other.to_string()),
    }
}
