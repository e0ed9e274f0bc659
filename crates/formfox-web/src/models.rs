//! Request/response DTOs. Wire casing is camelCase to match the reference
//! frontend; internal types keep Rust naming.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use formfox_core::backend::{ChatMessage, FieldValue};
use formfox_core::dialogue::TurnAction;
use formfox_core::extract::Strategy;
use formfox_core::field::Field;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub temp_id: String,
    pub original_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub temp_id: Option<String>,
    pub url: Option<String>,
    /// Optional override; defaults to native for remote documents and
    /// inferred for uploads.
    pub strategy: Option<Strategy>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub success: bool,
    pub session_id: String,
    pub fields: Vec<Field>,
    pub inconclusive: bool,
    pub message: String,
}

/// A chat turn. Exactly one of three shapes:
/// - `sessionId` set: server-authoritative, state lives in the store;
/// - `fields`/`collectedData`/`currentFieldIndex` inline: client-authoritative;
/// - `isSupport: true`: free-form assistant chat, no form state at all.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub collected_data: HashMap<String, String>,
    pub current_field_index: Option<usize>,
    #[serde(default)]
    pub is_support: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub field_updates: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<usize>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TurnAction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillRequest {
    pub session_id: Option<String>,
    /// Client-authoritative alternative: hosted document plus inline values.
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
    pub env: HealthEnv,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEnv {
    pub completion: bool,
    pub pdfco: bool,
}
