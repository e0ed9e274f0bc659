//! Prompt and canned-message builders for the dialogue engine.
//!
//! The assistant persona ("Finny") speaks German; all user-visible strings
//! live here so dialogue logic stays free of copy.

use crate::field::Field;

/// Instruction prompt for the inferred extraction strategy. The reply is
/// expected to be a JSON array of `{"fieldName": ..., "type": ...}` records,
/// but is parsed leniently (see [`crate::extract::parse_field_reply`]).
pub fn extraction_prompt(text: &str) -> String {
    format!(
        "Du bist ein PDF-Experte. Deine Aufgabe ist es, alle Formularfelder aus dem folgenden \
         Dokumenteninhalt zu extrahieren.\n\
         Analysiere den Text und gib eine JSON-Liste aller Felder zurück.\n\
         Format:\n\
         [\n  {{\"fieldName\": \"Name\", \"type\": \"text\"}},\n  {{\"fieldName\": \"Vorname\", \"type\": \"text\"}},\n  ...\n]\n\
         Gib NUR das JSON zurück. Nichts anderes.\n\n\
         Document Content:\n{text}"
    )
}

/// Per-turn system instruction for the answer branch.
///
/// The model judges the utterance against the active field and either
/// confirms and names the next field, or explains the problem and asks again.
/// Type-level validation is delegated entirely to this instruction.
pub fn turn_instruction(
    field: &Field,
    utterance: &str,
    position: usize,
    total: usize,
    next_field: Option<&str>,
) -> String {
    let next = next_field.unwrap_or("Das Formular ist nun vollständig!");
    format!(
        "Du bist Finny, ein professioneller und freundlicher PDF-Assistent. 🦊\n\
         Aktuelles Feld: \"{name}\" ({kind})\n\
         Fortschritt: {pos} von {total}.\n\n\
         DEINE AUFGABE:\n\
         1. Validiere die User-Eingabe \"{utterance}\" für das Feld \"{name}\".\n\
         2. Wenn gültig: Bestätige kurz (\"✅ Gespeichert\" o.ä.) und fordere zur Eingabe des NÄCHSTEN Feldes auf: \"{next}\".\n\
         3. Wenn ungültig: Erkläre freundlich den Fehler und frage erneut.\n\
         4. Sei locker, nutze Emojis, aber bleib effizient.\n\n\
         ANTWORT-FORMAT:\n\
         Antworte direkt im Chat-Stil. Keine technischen Tags.",
        name = field.name,
        kind = field.kind.label(),
        pos = position + 1,
        total = total,
        utterance = utterance,
        next = next,
    )
}

/// Greeting for the very first turn: names the field count and the first
/// field without consuming an answer.
pub fn greeting(fields: &[Field]) -> String {
    let first = fields.first().map(|f| f.name.as_str()).unwrap_or_default();
    format!(
        "Hallo! 👋 Ich bin Finny und helfe dir beim Ausfüllen. Ich habe {} Felder in deinem \
         Formular gefunden. Lass uns mit \"{}\" beginnen — was soll ich dort eintragen? \
         (Mit \"weiter\" überspringst du ein Feld, mit \"?\" bekommst du Hilfe.)",
        fields.len(),
        first
    )
}

/// Emitted whenever the session is exhausted. Idempotent by construction.
pub fn completion_message() -> &'static str {
    "🎉 Alle Felder sind ausgefüllt! Klicke bitte auf \"Vorschau\" oder \"PDF erstellen\" um abzuschließen."
}

pub fn skip_ack(field: &Field) -> String {
    format!("Okay, ich habe das Feld \"{}\" übersprungen.", field.name)
}

/// Structured help for the active field: what it is, how to fill it, an
/// example. Never consumes the utterance as an answer.
pub fn help_text(field: &Field) -> String {
    let hint = field.kind.hint();
    format!(
        "Gerne! Das Feld \"{name}\" ist ein {kind}-Feld.\n{instruction}\nBeispiel: {example}\n\
         (Mit \"weiter\" kannst du es auch überspringen.)",
        name = field.name,
        kind = field.kind.label(),
        instruction = hint.instruction,
        example = hint.example,
    )
}

/// Persona prompt for the free-form assistant variant (no field list).
pub const ASSISTANT_SYSTEM_PROMPT: &str = "Du bist Finny, der freundliche KI-Assistent für diese Webseite. \
     Antworte IMMER auf Deutsch. Sei locker, hilfreich und nutze gerne Emojis 😊. \
     Deine Antworten sollen kurz und prägnant sein. Hilf dem Nutzer bei Fragen zur Seite \
     oder chatte einfach nett mit ihm.";

/// Friendly reply when the completion service is unreachable during
/// free-form chat. Always offers a next action.
pub const ASSISTANT_UNAVAILABLE_REPLY: &str =
    "⚠️ Fehler bei der Verbindung zur KI. Bitte versuche es später noch einmal.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldKind};

    #[test]
    fn greeting_names_count_and_first_field() {
        let fields = vec![Field::new("Vorname"), Field::new("Nachname")];
        let g = greeting(&fields);
        assert!(g.contains("2 Felder"));
        assert!(g.contains("Vorname"));
    }

    #[test]
    fn turn_instruction_mentions_progress_and_next() {
        let f = Field::new("Vorname");
        let p = turn_instruction(&f, "Max", 0, 3, Some("Nachname"));
        assert!(p.contains("1 von 3"));
        assert!(p.contains("Nachname"));
        assert!(p.contains("Max"));
    }

    #[test]
    fn turn_instruction_for_last_field_announces_completion() {
        let f = Field::new("Nachname");
        let p = turn_instruction(&f, "Mustermann", 2, 3, None);
        assert!(p.contains("vollständig"));
    }

    #[test]
    fn help_text_includes_example() {
        let f = Field::with_kind("Geburtsdatum", FieldKind::Date);
        let h = help_text(&f);
        assert!(h.contains("15.03.2024"));
        assert!(h.contains("Geburtsdatum"));
    }
}
