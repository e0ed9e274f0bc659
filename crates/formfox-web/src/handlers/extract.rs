use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use formfox_core::extract::{ExtractError, Strategy, extract_fields};
use formfox_core::session::{Session, SourceRef};
use formfox_core::backend::DocumentError;

use crate::error::ApiError;
use crate::models::{ExtractRequest, ExtractResponse};
use crate::state::AppState;
use crate::upload;

/// Analyze a document and open a session over the fields found.
///
/// Uploaded documents default to the inferred strategy (flat forms are the
/// common case for scans people upload); already-hosted documents default to
/// native metadata.
pub async fn extract(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, ApiError> {
    let (source, strategy) = match (&req.temp_id, &req.url) {
        (Some(temp_id), _) => {
            let path = upload::resolve_temp(&state.upload_dir, temp_id)
                .ok_or_else(|| ApiError::not_found("Die hochgeladene Datei wurde nicht gefunden. Bitte lade sie erneut hoch."))?;
            (
                SourceRef::Local(path),
                req.strategy.unwrap_or(Strategy::Inferred),
            )
        }
        (None, Some(url)) => (
            SourceRef::Remote(url.clone()),
            req.strategy.unwrap_or(Strategy::Native),
        ),
        (None, None) => return Err(ApiError::bad_request("Keine Datei angegeben.")),
    };

    let outcome = extract_fields(
        strategy,
        &source,
        state.doc.as_ref(),
        state.llm.as_ref(),
        &state.config,
    )
    .await
    .map_err(map_extract_err)?;

    let message = if outcome.inconclusive {
        "Ich konnte keine Formularfelder erkennen. Du kannst mir trotzdem Fragen zum Dokument stellen.".to_string()
    } else {
        format!(
            "✅ Analyse abgeschlossen: {} Felder erkannt.",
            outcome.fields.len()
        )
    };

    let session = Session::new(outcome.fields.clone(), Some(source));
    let session_id = state.store.insert(session);
    tracing::info!(session = %session_id, fields = outcome.fields.len(), ?strategy, "opened session");

    Ok(Json(ExtractResponse {
        success: true,
        session_id,
        fields: outcome.fields,
        inconclusive: outcome.inconclusive,
        message,
    }))
}

fn map_extract_err(e: ExtractError) -> ApiError {
    match e {
        ExtractError::NoText | ExtractError::Document(DocumentError::Unreadable) => {
            ApiError::bad_request(
                "Aus dem PDF konnte kein Text extrahiert werden. Vermutlich ist es gescannt. Bitte lade eine andere Datei hoch.",
            )
        }
        ExtractError::Document(DocumentError::NotFound) => {
            ApiError::not_found("Das Dokument wurde nicht gefunden.")
        }
        ExtractError::Document(DocumentError::Timeout) => ApiError::unavailable(
            "Der Dokumentdienst ist gerade nicht erreichbar. Bitte versuche es gleich erneut.",
        ),
        ExtractError::Document(other) => ApiError::bad_gateway(other.to_string()),
        ExtractError::Completion(_) => ApiError::unavailable(
            "Der KI-Dienst ist gerade nicht erreichbar. Bitte versuche es gleich erneut.",
        ),
    }
}
