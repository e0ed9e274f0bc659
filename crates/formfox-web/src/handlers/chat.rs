use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use formfox_core::backend::{ChatMessage, CompletionError, Role};
use formfox_core::dialogue::{advance_turn, freeform_reply};
use formfox_core::prompts;
use formfox_core::session::InlineState;

use crate::error::ApiError;
use crate::models::{ChatRequest, ChatResponse};
use crate::state::AppState;

/// One dialogue turn.
///
/// The newest user message in `messages` is the utterance; everything before
/// it is history. Stored sessions are updated all-or-nothing: the turn's
/// writes are applied and the whole session replaced only after the engine
/// succeeds, so a collaborator failure leaves the session untouched.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (history, utterance) = split_messages(&req.messages);

    if req.is_support {
        let content =
            match freeform_reply(&utterance, &history, state.llm.as_ref(), &state.config).await {
                Ok(reply) => reply,
                Err(e) => {
                    // Support chat degrades instead of erroring.
                    tracing::warn!(error = %e, "support chat fell back to canned reply");
                    prompts::ASSISTANT_UNAVAILABLE_REPLY.to_string()
                }
            };
        return Ok(Json(ChatResponse {
            success: true,
            content,
            field_updates: HashMap::new(),
            cursor: None,
            completed: false,
            action: None,
        }));
    }

    let stored = match req.session_id.as_deref() {
        Some(id) if !id.is_empty() => Some(
            state
                .store
                .get(id)
                .ok_or_else(|| ApiError::not_found(format!("unknown session: {id}")))?,
        ),
        _ => None,
    };
    let is_stored = stored.is_some();
    let session = stored.unwrap_or_else(|| {
        InlineState {
            fields: req.fields,
            values: req.collected_data,
            cursor: req.current_field_index,
        }
        .into_session()
    });

    let out = advance_turn(
        &session,
        &utterance,
        &history,
        state.llm.as_ref(),
        &state.config,
    )
    .await
    .map_err(|e| match e {
        CompletionError::Timeout => ApiError::unavailable(
            "Die Antwort hat zu lange gedauert. Bitte versuche es gleich erneut.",
        ),
        CompletionError::Unavailable(_) => ApiError::unavailable(
            "Der KI-Dienst ist gerade nicht erreichbar. Bitte versuche es gleich erneut.",
        ),
    })?;

    if is_stored && !out.field_updates.is_empty() {
        let mut updated = session.clone();
        updated.apply(&out.field_updates);
        state.store.replace(updated);
    }

    Ok(Json(ChatResponse {
        success: true,
        content: out.reply,
        field_updates: out.field_updates,
        cursor: Some(out.cursor),
        completed: out.completed,
        action: Some(out.action),
    }))
}

/// Split a conversation into (history, newest user utterance).
///
/// A conversation without any user message yields an empty utterance with
/// the full history, which the engine treats as the introduction turn.
pub fn split_messages(messages: &[ChatMessage]) -> (Vec<ChatMessage>, String) {
    match messages.iter().rposition(|m| m.role == Role::User) {
        Some(pos) => (messages[..pos].to_vec(), messages[pos].content.clone()),
        None => (messages.to_vec(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_message_is_the_utterance() {
        let messages = vec![
            ChatMessage::assistant("Hallo! Wie lautet dein Vorname?"),
            ChatMessage::user("Max"),
        ];
        let (history, utterance) = split_messages(&messages);
        assert_eq!(utterance, "Max");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::Assistant);
    }

    #[test]
    fn multi_turn_history_keeps_everything_before_the_last_user_message() {
        let messages = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("Hallo!"),
            ChatMessage::user("Max"),
        ];
        let (history, utterance) = split_messages(&messages);
        assert_eq!(utterance, "Max");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn no_user_message_means_introduction_turn() {
        let (history, utterance) = split_messages(&[]);
        assert!(utterance.is_empty());
        assert!(history.is_empty());

        let messages = vec![ChatMessage::assistant("Hallo!")];
        let (history, utterance) = split_messages(&messages);
        assert!(utterance.is_empty());
        assert_eq!(history.len(), 1);
    }
}
