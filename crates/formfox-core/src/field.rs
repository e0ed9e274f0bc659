//! The canonical form-field model and the keyword heuristic that guesses a
//! field's kind from its name.

use serde::{Deserialize, Serialize};

/// What sort of value a field expects.
///
/// Derived from the field name when the extraction source doesn't declare a
/// type. `Unknown` is the explicit fallback for declared types we don't
/// recognize; the name heuristic itself falls back to `Text`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Date,
    Email,
    Phone,
    Checkbox,
    Gender,
    #[default]
    Unknown,
}

/// Per-kind guidance shown by the help command and folded into prompts.
#[derive(Debug, Clone, Copy)]
pub struct FieldHint {
    pub instruction: &'static str,
    pub example: &'static str,
}

impl FieldKind {
    pub fn hint(self) -> FieldHint {
        match self {
            FieldKind::Date => FieldHint {
                instruction: "Bitte gib ein Datum ein.",
                example: "15.03.2024",
            },
            FieldKind::Email => FieldHint {
                instruction: "Bitte gib eine gültige E-Mail-Adresse ein.",
                example: "name@beispiel.de",
            },
            FieldKind::Phone => FieldHint {
                instruction: "Bitte gib eine Telefonnummer ein.",
                example: "030 12345678",
            },
            FieldKind::Checkbox => FieldHint {
                instruction: "Möchtest du dieses Feld ankreuzen? (Ja/Nein)",
                example: "Ja",
            },
            FieldKind::Gender => FieldHint {
                instruction: "Bitte gib dein Geschlecht bzw. deine Anrede an.",
                example: "weiblich",
            },
            FieldKind::Text | FieldKind::Unknown => FieldHint {
                instruction: "Bitte fülle dieses Feld aus.",
                example: "Mustertext",
            },
        }
    }

    /// Human-readable label used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Text => "Text",
            FieldKind::Date => "Datum",
            FieldKind::Email => "E-Mail",
            FieldKind::Phone => "Telefonnummer",
            FieldKind::Checkbox => "Ankreuzfeld",
            FieldKind::Gender => "Anrede/Geschlecht",
            FieldKind::Unknown => "Text",
        }
    }
}

/// One form slot to collect.
///
/// `name` is the question's referent and the key the answer is stored under;
/// names are unique within one field list and list order defines traversal
/// order. `page` is carried through for fill-request formatting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl Field {
    /// A field whose kind is guessed from its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = classify_kind(&name);
        Self {
            name,
            kind,
            page: None,
        }
    }

    pub fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            page: None,
        }
    }

    /// Replace an `Unknown` kind with the name heuristic's guess.
    ///
    /// Client-supplied inline state often omits the kind entirely; serde
    /// defaults it to `Unknown` and this fills the gap.
    pub fn ensure_kind(&mut self) {
        if self.kind == FieldKind::Unknown {
            self.kind = classify_kind(&self.name);
        }
    }
}

/// Guess a field's kind from keyword substrings in its name.
///
/// The forms this assistant sees are overwhelmingly German, so the keyword
/// set mixes German and English. Pure function so the heuristics can be
/// extended and tested without touching dialogue logic.
pub fn classify_kind(name: &str) -> FieldKind {
    let lower = name.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["datum", "date", "geburt"]) {
        FieldKind::Date
    } else if has(&["mail"]) {
        FieldKind::Email
    } else if has(&["telefon", "phone", "fax", "nummer"]) {
        FieldKind::Phone
    } else if has(&["check", "wahl", "kreuz"]) {
        FieldKind::Checkbox
    } else if has(&["geschlecht", "gender", "anrede"]) {
        FieldKind::Gender
    } else {
        FieldKind::Text
    }
}

/// Name used for extracted records that carried no usable name.
pub const PLACEHOLDER_NAME: &str = "Unnamed";

/// Make field names unique within a list, preserving order.
///
/// Records without a name already got [`PLACEHOLDER_NAME`]; collisions (from
/// placeholders or from a sloppy model reply) get a numeric suffix instead of
/// being dropped, so downstream field counts stay intact.
pub fn ensure_unique_names(fields: &mut [Field]) {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    for field in fields.iter_mut() {
        if seen.insert(field.name.clone()) {
            continue;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{} {}", field.name, n);
            if seen.insert(candidate.clone()) {
                field.name = candidate;
                break;
            }
            n += 1;
        }
    }
}
