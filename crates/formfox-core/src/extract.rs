//! Field extraction: turn a source document into an ordered field list.
//!
//! Two strategies: the document's own form metadata (deterministic,
//! preferred when the PDF declares fields) and LLM inference over raw
//! extracted text (for flat forms). The inferred path is deliberately
//! forgiving — a model reply that can't be parsed yields an *empty* list,
//! never an error, so the caller can fall back to free-form chat.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Config;
use crate::backend::{
    ChatMessage, CompletionBackend, CompletionError, DocumentBackend, DocumentError, NativeField,
};
use crate::field::{Field, FieldKind, PLACEHOLDER_NAME, classify_kind, ensure_unique_names};
use crate::prompts;
use crate::session::SourceRef;

/// Upper bound on extracted text embedded in the inference prompt. Keeps the
/// request inside the completion service's input-size and cost limits.
pub const MAX_PROMPT_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Read the document's structurally-declared form fields.
    Native,
    /// Extract raw text and ask the completion service to infer fields.
    Inferred,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The document yielded no text at all (commonly a scanned PDF).
    /// Distinct from "zero fields found".
    #[error("no text could be extracted from the document")]
    NoText,
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("extraction service unavailable: {0}")]
    Completion(#[from] CompletionError),
}

/// The ordered field list, plus whether extraction came back empty.
///
/// `inconclusive` means "zero fields" — not fatal; the caller may still
/// proceed to free-form chat.
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub fields: Vec<Field>,
    pub inconclusive: bool,
}

/// Produce an ordered field list from a source document.
pub async fn extract_fields(
    strategy: Strategy,
    source: &SourceRef,
    doc: &dyn DocumentBackend,
    llm: &dyn CompletionBackend,
    config: &Config,
) -> Result<ExtractOutcome, ExtractError> {
    let fields = match strategy {
        Strategy::Native => {
            let native = doc.native_fields(source, config.document_timeout()).await?;
            tracing::info!(count = native.len(), "native field extraction complete");
            let mut fields: Vec<Field> = native.into_iter().map(from_native).collect();
            ensure_unique_names(&mut fields);
            fields
        }
        Strategy::Inferred => {
            let text = doc.extract_text(source, config.document_timeout()).await?;
            if text.trim().is_empty() {
                return Err(ExtractError::NoText);
            }
            let truncated = truncate_chars(&text, config.max_prompt_chars);
            let prompt = prompts::extraction_prompt(truncated);
            let reply = llm
                .complete(&[ChatMessage::user(prompt)], config.completion_timeout())
                .await?;
            let fields = parse_field_reply(&reply);
            tracing::info!(count = fields.len(), "inferred field extraction complete");
            fields
        }
    };
    Ok(ExtractOutcome {
        inconclusive: fields.is_empty(),
        fields,
    })
}

/// Map a structurally-declared field onto the canonical model. A declared
/// checkbox type wins; anything else falls back to the name heuristic.
fn from_native(native: NativeField) -> Field {
    let declared = native.declared_type.to_lowercase();
    let name = if native.name.trim().is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        native.name
    };
    let kind = if declared.contains("check") {
        FieldKind::Checkbox
    } else {
        classify_kind(&name)
    };
    Field {
        name,
        kind,
        page: native.page,
    }
}

/// Parse the completion service's reply into a field list.
///
/// The reply is not trusted to be pure JSON: models wrap arrays in markdown
/// fences and prose. We take the widest bracketed span (first `[` to last
/// `]`) and parse only that. Any failure yields an empty list. Records
/// missing a usable name get [`PLACEHOLDER_NAME`] instead of being dropped,
/// so downstream field counts stay intact.
pub fn parse_field_reply(reply: &str) -> Vec<Field> {
    let Some(span) = bracketed_span(reply) else {
        tracing::warn!("extraction reply contained no bracketed array");
        return Vec::new();
    };
    let records: Vec<serde_json::Value> = match serde_json::from_str(span) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "extraction reply was not parseable JSON");
            return Vec::new();
        }
    };

    let mut fields: Vec<Field> = records
        .iter()
        .map(|rec| {
            let name = rec
                .get("fieldName")
                .or_else(|| rec.get("name"))
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(PLACEHOLDER_NAME)
                .to_string();
            let kind = rec
                .get("type")
                .or_else(|| rec.get("kind"))
                .and_then(|v| v.as_str())
                .and_then(parse_kind)
                .unwrap_or_else(|| classify_kind(&name));
            let page = rec.get("page").and_then(|v| v.as_u64()).map(|p| p as u32);
            Field { name, kind, page }
        })
        .collect();
    ensure_unique_names(&mut fields);
    fields
}

/// The widest `[...]` span: first opening to last closing bracket.
fn bracketed_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_kind(s: &str) -> Option<FieldKind> {
    match s.to_lowercase().as_str() {
        "text" | "editbox" => Some(FieldKind::Text),
        "date" => Some(FieldKind::Date),
        "email" => Some(FieldKind::Email),
        "phone" | "tel" => Some(FieldKind::Phone),
        "checkbox" | "check" => Some(FieldKind::Checkbox),
        "gender" => Some(FieldKind::Gender),
        _ => None,
    }
}

/// Truncate to at most `max` characters, respecting char boundaries.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCompletion, MockDocument};

    fn source() -> SourceRef {
        SourceRef::Remote("https://files.example/form.pdf".to_string())
    }

    #[test]
    fn parses_plain_json_array() {
        let fields = parse_field_reply(
            r#"[{"fieldName": "Name", "type": "text"}, {"fieldName": "Geburtsdatum", "type": "date"}]"#,
        );
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "Name");
        assert_eq!(fields[1].kind, FieldKind::Date);
    }

    #[test]
    fn parses_array_wrapped_in_markdown_and_prose() {
        let reply = "Hier sind die Felder:\n```json\n[{\"fieldName\": \"Email\"}]\n```\nViel Erfolg!";
        let fields = parse_field_reply(reply);
        assert_eq!(fields.len(), 1);
        // Kind omitted in the reply -> name heuristic.
        assert_eq!(fields[0].kind, FieldKind::Email);
    }

    #[test]
    fn malformed_reply_yields_empty_list() {
        assert!(parse_field_reply("Ich konnte keine Felder finden.").is_empty());
        assert!(parse_field_reply("[{ broken json }]").is_empty());
        assert!(parse_field_reply("]...[").is_empty());
        assert!(parse_field_reply("").is_empty());
    }

    #[test]
    fn nameless_records_get_placeholder_not_dropped() {
        let fields = parse_field_reply(r#"[{"type": "text"}, {"fieldName": ""}, {"name": "Ort"}]"#);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Unnamed", "Unnamed 2", "Ort"]);
    }

    #[test]
    fn accepts_name_and_kind_aliases() {
        let fields = parse_field_reply(r#"[{"name": "Telefon", "kind": "phone", "page": 2}]"#);
        assert_eq!(fields[0].kind, FieldKind::Phone);
        assert_eq!(fields[0].page, Some(2));
    }

    #[test]
    fn widest_span_wins_over_inner_arrays() {
        // Inner brackets inside records must not cut the span short.
        let reply = r#"noise [{"fieldName": "A", "aliases": ["x", "y"]}, {"fieldName": "B"}] trailing"#;
        let fields = parse_field_reply(reply);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "äöü".repeat(10);
        let t = truncate_chars(&s, 5);
        assert_eq!(t.chars().count(), 5);
        assert!(s.starts_with(t));
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn inferred_strategy_round_trip() {
        let doc = MockDocument::with_text("Vorname: ____  Geburtsdatum: ____");
        let llm = MockCompletion::new(
            r#"[{"fieldName": "Vorname", "type": "text"}, {"fieldName": "Geburtsdatum", "type": "date"}]"#,
        );
        let out = extract_fields(Strategy::Inferred, &source(), &doc, &llm, &Config::default())
            .await
            .unwrap();
        assert!(!out.inconclusive);
        assert_eq!(out.fields.len(), 2);
        assert_eq!(doc.text_calls(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn inferred_strategy_empty_text_is_no_text() {
        let doc = MockDocument::with_text("   \n  ");
        let llm = MockCompletion::new("unused");
        let err = extract_fields(Strategy::Inferred, &source(), &doc, &llm, &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoText));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn inferred_strategy_malformed_reply_is_inconclusive_not_error() {
        let doc = MockDocument::with_text("some form text");
        let llm = MockCompletion::new("Tut mir leid, keine Felder gefunden.");
        let out = extract_fields(Strategy::Inferred, &source(), &doc, &llm, &Config::default())
            .await
            .unwrap();
        assert!(out.inconclusive);
        assert!(out.fields.is_empty());
    }

    #[tokio::test]
    async fn inferred_strategy_surfaces_llm_unavailability() {
        let doc = MockDocument::with_text("some form text");
        let llm = MockCompletion::timing_out();
        let err = extract_fields(Strategy::Inferred, &source(), &doc, &llm, &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Completion(CompletionError::Timeout)
        ));
    }

    #[tokio::test]
    async fn inferred_strategy_truncates_long_text() {
        let doc = MockDocument::with_text("x".repeat(50_000));
        let llm = MockCompletion::new("[]");
        extract_fields(Strategy::Inferred, &source(), &doc, &llm, &Config::default())
            .await
            .unwrap();
        let sent = llm.last_messages().unwrap();
        // Prompt scaffolding plus at most MAX_PROMPT_CHARS of document text.
        assert!(sent[0].content.chars().count() < MAX_PROMPT_CHARS + 1_000);
    }

    #[tokio::test]
    async fn native_strategy_maps_declared_types() {
        let doc = MockDocument::with_native_fields(vec![
            NativeField {
                name: "Name".into(),
                declared_type: "EditBox".into(),
                page: Some(1),
            },
            NativeField {
                name: "Zustimmung".into(),
                declared_type: "CheckBox".into(),
                page: Some(2),
            },
            NativeField {
                name: "Geburtsdatum".into(),
                declared_type: "EditBox".into(),
                page: Some(1),
            },
        ]);
        let llm = MockCompletion::new("unused");
        let out = extract_fields(Strategy::Native, &source(), &doc, &llm, &Config::default())
            .await
            .unwrap();
        assert_eq!(out.fields[0].kind, FieldKind::Text);
        assert_eq!(out.fields[1].kind, FieldKind::Checkbox);
        assert_eq!(out.fields[2].kind, FieldKind::Date);
        assert_eq!(out.fields[1].page, Some(2));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn native_strategy_zero_fields_is_inconclusive() {
        let doc = MockDocument::with_native_fields(vec![]);
        let llm = MockCompletion::new("unused");
        let out = extract_fields(Strategy::Native, &source(), &doc, &llm, &Config::default())
            .await
            .unwrap();
        assert!(out.inconclusive);
    }
}
