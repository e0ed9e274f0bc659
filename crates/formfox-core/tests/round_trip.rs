//! End-to-end round trip against mock collaborators: extract fields, create
//! a session, drive the dialogue to exhaustion, dispatch the fill.

use formfox_core::backend::{ChatMessage, FieldValue};
use formfox_core::mock::{MockCompletion, MockDocument};
use formfox_core::session::{Session, SourceRef};
use formfox_core::store::SessionStore;
use formfox_core::{Config, Strategy, advance_turn, dispatch_fill, extract_fields};

fn remote_source() -> SourceRef {
    SourceRef::Remote("https://files.example/antrag.pdf".to_string())
}

#[tokio::test]
async fn skip_everything_round_trip() {
    let config = Config::default();
    let doc = MockDocument::with_text("Vorname: __  Nachname: __  Geburtsdatum: __");
    let llm = MockCompletion::new(
        r#"[{"fieldName": "Vorname", "type": "text"},
            {"fieldName": "Nachname", "type": "text"},
            {"fieldName": "Geburtsdatum", "type": "date"}]"#,
    );

    // Extract and create the session.
    let outcome = extract_fields(Strategy::Inferred, &remote_source(), &doc, &llm, &config)
        .await
        .unwrap();
    assert_eq!(outcome.fields.len(), 3);

    let store = SessionStore::default();
    let id = store.insert(Session::new(outcome.fields, Some(remote_source())));

    // First turn is the introduction; it consumes nothing.
    let mut session = store.get(&id).unwrap();
    let intro = advance_turn(&session, "hallo", &[], &llm, &config)
        .await
        .unwrap();
    assert!(!intro.completed);
    assert!(intro.field_updates.is_empty());

    // Skip every field.
    let mut history = vec![ChatMessage::user("hallo"), ChatMessage::assistant(&intro.reply)];
    let mut completed = false;
    for _ in 0..3 {
        let out = advance_turn(&session, "weiter", &history, &llm, &config)
            .await
            .unwrap();
        session.apply(&out.field_updates);
        store.replace(session.clone());
        history.push(ChatMessage::user("weiter"));
        history.push(ChatMessage::assistant(&out.reply));
        completed = out.completed;
    }
    assert!(completed);

    // Fill: every entry present, every value the explicit empty string.
    let session = store.get(&id).unwrap();
    let result = dispatch_fill(&session, &doc, &config).await.unwrap();
    assert_eq!(result, "https://files.example/mock-filled.pdf");

    let sent = doc.last_fill().unwrap();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|fv| fv.value.is_empty()));
    assert_eq!(
        sent.iter().map(|fv| fv.name.as_str()).collect::<Vec<_>>(),
        vec!["Vorname", "Nachname", "Geburtsdatum"]
    );

    // Terminal: the session is discarded after the fill.
    store.remove(&id);
    assert!(store.get(&id).is_none());
}

#[tokio::test]
async fn empty_extraction_completes_immediately() {
    let config = Config::default();
    let llm = MockCompletion::new("Leider keine Felder erkennbar.");
    let doc = MockDocument::with_text("unstrukturierter Fließtext");

    let outcome = extract_fields(Strategy::Inferred, &remote_source(), &doc, &llm, &config)
        .await
        .unwrap();
    assert!(outcome.inconclusive);

    // Zero fields: the very first turn reports completion, nothing collected.
    let session = Session::new(outcome.fields, Some(remote_source()));
    let out = advance_turn(&session, "hallo", &[], &llm, &config)
        .await
        .unwrap();
    assert!(out.completed);
    assert!(out.field_updates.is_empty());
}

#[tokio::test]
async fn answers_and_skips_mix_into_fill_values() {
    let config = Config::default();
    let llm = MockCompletion::new("✅ Gespeichert, weiter geht's!");
    let doc = MockDocument::default();

    let mut session = Session::new(
        vec![
            formfox_core::Field::new("Vorname"),
            formfox_core::Field::new("Nachname"),
        ],
        Some(remote_source()),
    );

    let history = vec![ChatMessage::user("hallo")];
    let out = advance_turn(&session, "Max", &history, &llm, &config)
        .await
        .unwrap();
    session.apply(&out.field_updates);

    let out = advance_turn(&session, "überspringen", &history, &llm, &config)
        .await
        .unwrap();
    session.apply(&out.field_updates);
    assert!(out.completed);

    dispatch_fill(&session, &doc, &config).await.unwrap();
    let sent = doc.last_fill().unwrap();
    assert_eq!(
        sent,
        vec![
            FieldValue { name: "Vorname".into(), value: "Max".into() },
            FieldValue { name: "Nachname".into(), value: String::new() },
        ]
    );
}
