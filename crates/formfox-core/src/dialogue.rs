//! The conversational fill state machine.
//!
//! One turn = one call to [`advance_turn`]. The engine never mutates the
//! session it is given; it returns the writes and the post-turn cursor in a
//! [`TurnOutcome`] and the caller applies them (via
//! [`Session::apply`](crate::session::Session::apply) plus a whole-session
//! replace in the store, or by echoing them back to a client-authoritative
//! frontend). Because the only fallible step is the completion call, a
//! collaborator failure leaves the session exactly as it was — the turn is
//! all-or-nothing.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::Config;
use crate::backend::{ChatMessage, CompletionBackend, CompletionError, Role};
use crate::prompts;
use crate::session::Session;

/// Utterances that skip the active field.
pub const SKIP_COMMANDS: [&str; 3] = ["weiter", "skip", "überspringen"];

/// Utterances that request help for the active field.
pub const HELP_COMMANDS: [&str; 2] = ["?", "hilfe"];

/// Which branch of the turn algorithm produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    Intro,
    Completed,
    Skip,
    Help,
    Answer,
}

/// Everything a turn produced. `field_updates` has not been applied to any
/// session yet; `cursor` is where resolution lands once it is.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub field_updates: HashMap<String, String>,
    pub cursor: usize,
    pub cursor_advanced: bool,
    /// Completion signal; downstream orchestration uses it to trigger the
    /// fill dispatcher.
    pub completed: bool,
    pub action: TurnAction,
}

/// The branch a turn will take, decided before any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPlan {
    Introduce,
    Completed,
    Skip { index: usize },
    Help { index: usize },
    Answer { index: usize },
}

/// Decide the branch for this turn. Pure: no I/O, no mutation.
///
/// Branch order matters: exhaustion wins over introduction (an empty field
/// list completes immediately on the first turn), and the introduction wins
/// over everything else (the first utterance is never consumed as an answer,
/// a command included).
pub fn plan_turn(session: &Session, utterance: &str, history: &[ChatMessage]) -> TurnPlan {
    let active = session.resolve_active();
    if active >= session.fields.len() {
        return TurnPlan::Completed;
    }

    let first_turn = !history.iter().any(|m| m.role == Role::User);
    if first_turn {
        return TurnPlan::Introduce;
    }

    let normalized = utterance.trim().to_lowercase();
    if SKIP_COMMANDS.contains(&normalized.as_str()) {
        return TurnPlan::Skip { index: active };
    }
    if HELP_COMMANDS.contains(&normalized.as_str()) {
        return TurnPlan::Help { index: active };
    }
    TurnPlan::Answer { index: active }
}

/// Run one dialogue turn against a (stored or reconstructed) session.
///
/// `history` is the prior visible conversation; `utterance` is the newest
/// user message and is not part of `history`. Only the answer branch talks
/// to the completion service; the other branches are deterministic. The
/// answer branch optimistically records the raw utterance whatever the
/// model's judgment — the engine never gets stuck re-asking, and a side
/// channel can always correct a value later.
pub async fn advance_turn(
    session: &Session,
    utterance: &str,
    history: &[ChatMessage],
    llm: &dyn CompletionBackend,
    config: &Config,
) -> Result<TurnOutcome, CompletionError> {
    match plan_turn(session, utterance, history) {
        TurnPlan::Introduce => {
            let active = session.resolve_active();
            tracing::debug!(fields = session.fields.len(), "introducing session");
            Ok(TurnOutcome {
                reply: prompts::greeting(&session.fields),
                field_updates: HashMap::new(),
                cursor: active,
                cursor_advanced: false,
                completed: false,
                action: TurnAction::Intro,
            })
        }
        TurnPlan::Completed => Ok(TurnOutcome {
            reply: prompts::completion_message().to_string(),
            field_updates: HashMap::new(),
            cursor: session.fields.len(),
            cursor_advanced: false,
            completed: true,
            action: TurnAction::Completed,
        }),
        TurnPlan::Skip { index } => {
            let field = &session.fields[index];
            // Explicit empty string: "skipped" is distinct from "never reached".
            let mut updates = HashMap::new();
            updates.insert(field.name.clone(), String::new());
            let cursor = session.resolve_after(&updates);
            tracing::debug!(field = %field.name, cursor, "skipped field");
            Ok(TurnOutcome {
                reply: prompts::skip_ack(field),
                field_updates: updates,
                cursor,
                cursor_advanced: true,
                completed: cursor >= session.fields.len(),
                action: TurnAction::Skip,
            })
        }
        TurnPlan::Help { index } => {
            let field = &session.fields[index];
            Ok(TurnOutcome {
                reply: prompts::help_text(field),
                field_updates: HashMap::new(),
                cursor: index,
                cursor_advanced: false,
                completed: false,
                action: TurnAction::Help,
            })
        }
        TurnPlan::Answer { index } => {
            let field = &session.fields[index];
            let next_name = session.fields.get(index + 1).map(|f| f.name.as_str());
            let system = prompts::turn_instruction(
                field,
                utterance,
                index,
                session.fields.len(),
                next_name,
            );

            let mut messages = Vec::with_capacity(history.len() + 2);
            messages.push(ChatMessage::system(system));
            messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
            messages.push(ChatMessage::user(utterance));

            // Fallible step. Erroring out here leaves the session untouched.
            let raw = llm.complete(&messages, config.completion_timeout()).await?;
            let reply = strip_reasoning(&raw);

            let mut updates = HashMap::new();
            updates.insert(field.name.clone(), utterance.to_string());
            let cursor = session.resolve_after(&updates);
            tracing::debug!(field = %field.name, cursor, "recorded answer");
            Ok(TurnOutcome {
                reply,
                field_updates: updates,
                cursor,
                cursor_advanced: true,
                completed: cursor >= session.fields.len(),
                action: TurnAction::Answer,
            })
        }
    }
}

/// Free-form assistant chat: no field list, just the persona prompt.
///
/// The degenerate configuration of the unified model — same collaborator,
/// same markup stripping, no session.
pub async fn freeform_reply(
    utterance: &str,
    history: &[ChatMessage],
    llm: &dyn CompletionBackend,
    config: &Config,
) -> Result<String, CompletionError> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(prompts::ASSISTANT_SYSTEM_PROMPT));
    messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
    messages.push(ChatMessage::user(utterance));
    let raw = llm.complete(&messages, config.completion_timeout()).await?;
    Ok(strip_reasoning(&raw))
}

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));

/// Remove `<think>…</think>` deliberation blocks some models embed in their
/// replies.
pub fn strip_reasoning(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::mock::MockCompletion;
    use crate::session::Session;

    fn session(names: &[&str]) -> Session {
        Session::new(names.iter().map(|n| Field::new(*n)).collect(), None)
    }

    fn user_history(turns: &[&str]) -> Vec<ChatMessage> {
        turns.iter().map(|t| ChatMessage::user(*t)).collect()
    }

    #[test]
    fn first_turn_plans_introduction_even_for_commands() {
        let s = session(&["Vorname"]);
        assert_eq!(plan_turn(&s, "weiter", &[]), TurnPlan::Introduce);
        assert_eq!(plan_turn(&s, "Max", &[]), TurnPlan::Introduce);
        // Assistant-only history still counts as "no prior user utterances".
        let hist = vec![ChatMessage::assistant("Hallo!")];
        assert_eq!(plan_turn(&s, "Max", &hist), TurnPlan::Introduce);
    }

    #[test]
    fn empty_field_list_completes_before_introduction() {
        let s = session(&[]);
        assert_eq!(plan_turn(&s, "", &[]), TurnPlan::Completed);
    }

    #[test]
    fn commands_are_normalized() {
        let s = session(&["Vorname"]);
        let hist = user_history(&["hi"]);
        assert_eq!(plan_turn(&s, "  WEITER  ", &hist), TurnPlan::Skip { index: 0 });
        assert_eq!(plan_turn(&s, "Überspringen", &hist), TurnPlan::Skip { index: 0 });
        assert_eq!(plan_turn(&s, " ? ", &hist), TurnPlan::Help { index: 0 });
        assert_eq!(plan_turn(&s, "Hilfe", &hist), TurnPlan::Help { index: 0 });
        assert_eq!(plan_turn(&s, "Max", &hist), TurnPlan::Answer { index: 0 });
    }

    #[tokio::test]
    async fn intro_turn_consumes_nothing() {
        let s = session(&["Vorname", "Nachname"]);
        let llm = MockCompletion::new("unused");
        let out = advance_turn(&s, "Max", &[], &llm, &Config::default())
            .await
            .unwrap();
        assert_eq!(out.action, TurnAction::Intro);
        assert!(out.reply.contains("Vorname"));
        assert!(out.field_updates.is_empty());
        assert_eq!(out.cursor, 0);
        assert!(!out.completed);
        // The greeting is canned; no completion call happens.
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn answer_records_raw_utterance_and_advances() {
        let s = session(&["Vorname", "Nachname"]);
        let llm = MockCompletion::new("✅ Gespeichert. Wie lautet dein Nachname?");
        let hist = user_history(&["hi"]);
        let out = advance_turn(&s, "Max", &hist, &llm, &Config::default())
            .await
            .unwrap();
        assert_eq!(out.action, TurnAction::Answer);
        assert_eq!(out.field_updates.get("Vorname").map(String::as_str), Some("Max"));
        assert_eq!(out.cursor, 1);
        assert!(out.cursor_advanced);
        assert!(!out.completed);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn skip_writes_empty_string_without_llm_call() {
        let s = session(&["Vorname", "Nachname"]);
        let llm = MockCompletion::new("unused");
        let hist = user_history(&["hi"]);
        let out = advance_turn(&s, "skip", &hist, &llm, &Config::default())
            .await
            .unwrap();
        assert_eq!(out.action, TurnAction::Skip);
        assert_eq!(out.field_updates.get("Vorname").map(String::as_str), Some(""));
        assert_eq!(out.cursor, 1);
        assert!(out.reply.contains("Vorname"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn help_never_mutates_or_advances() {
        let s = session(&["Geburtsdatum"]);
        let llm = MockCompletion::new("unused");
        let hist = user_history(&["hi"]);
        let out = advance_turn(&s, "?", &hist, &llm, &Config::default())
            .await
            .unwrap();
        assert_eq!(out.action, TurnAction::Help);
        assert!(out.field_updates.is_empty());
        assert_eq!(out.cursor, 0);
        assert!(!out.cursor_advanced);
        assert!(out.reply.contains("15.03.2024"));
    }

    #[tokio::test]
    async fn exhausted_session_is_idempotent() {
        let mut s = session(&["Vorname"]);
        s.values.insert("Vorname".into(), "Max".into());
        let llm = MockCompletion::new("unused");
        let hist = user_history(&["hi", "Max"]);
        for _ in 0..3 {
            let out = advance_turn(&s, "nochmal", &hist, &llm, &Config::default())
                .await
                .unwrap();
            assert_eq!(out.action, TurnAction::Completed);
            assert!(out.completed);
            assert!(out.field_updates.is_empty());
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn llm_failure_leaves_no_updates() {
        let s = session(&["Vorname"]);
        let llm = MockCompletion::unavailable("connection refused");
        let hist = user_history(&["hi"]);
        let err = advance_turn(&s, "Max", &hist, &llm, &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn spec_scenario_vorname_nachname() {
        let mut s = session(&["Vorname", "Nachname"]);
        let llm = MockCompletion::new("✅ Gespeichert.");
        let config = Config::default();

        // Turn 1: intro, utterance ignored.
        let out = advance_turn(&s, "egal", &[], &llm, &config).await.unwrap();
        assert!(out.reply.contains("Vorname"));
        assert_eq!(out.cursor, 0);
        assert!(out.field_updates.is_empty());
        assert!(s.values.is_empty());

        // Turn 2: "Max" answers Vorname.
        let hist = vec![ChatMessage::user("egal"), ChatMessage::assistant(&out.reply)];
        let out = advance_turn(&s, "Max", &hist, &llm, &config).await.unwrap();
        s.apply(&out.field_updates);
        assert_eq!(s.values.get("Vorname").map(String::as_str), Some("Max"));
        assert_eq!(out.cursor, 1);
        assert!(!out.completed);

        // Turn 3: skip Nachname -> exhausted.
        let out = advance_turn(&s, "skip", &hist, &llm, &config).await.unwrap();
        s.apply(&out.field_updates);
        assert_eq!(s.values.get("Nachname").map(String::as_str), Some(""));
        assert_eq!(out.cursor, 2);
        assert!(out.completed);
    }

    #[tokio::test]
    async fn reasoning_markup_is_stripped_from_replies() {
        let s = session(&["Vorname"]);
        let llm = MockCompletion::new("<think>hmm, plausible name</think>✅ Passt!");
        let hist = user_history(&["hi"]);
        let out = advance_turn(&s, "Max", &hist, &llm, &Config::default())
            .await
            .unwrap();
        assert_eq!(out.reply, "✅ Passt!");
    }

    #[test]
    fn strip_reasoning_handles_multiple_blocks() {
        let text = "<think>a</think>Hallo<THINK>b\nc</THINK> Welt";
        assert_eq!(strip_reasoning(text), "Hallo Welt");
        assert_eq!(strip_reasoning("kein markup"), "kein markup");
    }

    #[tokio::test]
    async fn freeform_uses_persona_and_strips_markup() {
        let llm = MockCompletion::new("<think>x</think>Gerne! 😊");
        let reply = freeform_reply("Was kann die Seite?", &[], &llm, &Config::default())
            .await
            .unwrap();
        assert_eq!(reply, "Gerne! 😊");
        let sent = llm.last_messages().unwrap();
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("Finny"));
    }
}
