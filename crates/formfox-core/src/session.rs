//! Session model: one user's in-progress or completed fill attempt.
//!
//! Two session shapes feed the dialogue engine: server-authoritative sessions
//! stored in the [`SessionStore`](crate::store::SessionStore) and addressed by
//! id, and client-authoritative requests carrying the full state inline. Both
//! are normalized into a [`Session`] before the turn algorithm runs, so there
//! is exactly one code path.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::field::Field;

/// Reference to the source document a session was created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceRef {
    /// Already hosted at the document service (or anywhere fetchable).
    Remote(String),
    /// A temp file on local disk; must be uploaded before filling.
    Local(PathBuf),
}

/// One active or completed fill attempt.
///
/// `fields` is fixed for the lifetime of the session. A value of `""` in
/// `values` means "explicitly skipped"; an absent key means "never reached".
/// Cursor resolution goes by key membership, so a skipped field is never
/// re-asked; both shapes surface as `""` in the fill output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub fields: Vec<Field>,
    pub values: HashMap<String, String>,
    /// Index of the active field, or `fields.len()` when exhausted.
    pub cursor: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
}

impl Session {
    pub fn new(fields: Vec<Field>, source: Option<SourceRef>) -> Self {
        Self {
            id: generate_session_id(),
            fields,
            values: HashMap::new(),
            cursor: 0,
            source,
        }
    }

    /// Whether `name` has been answered or explicitly skipped.
    pub fn is_handled(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Resolve the currently active field index.
    ///
    /// The stored cursor is honored when it points at a real, unhandled
    /// field. Otherwise the list is scanned forward from index 0 — not from
    /// the cursor — so out-of-order edits made through a side channel (the
    /// user correcting an earlier field in the sidebar) re-activate the
    /// earliest gap instead of desynchronizing the dialogue. Returns
    /// `fields.len()` when every field has been answered or skipped.
    pub fn resolve_active(&self) -> usize {
        if let Some(field) = self.fields.get(self.cursor) {
            if !self.is_handled(&field.name) {
                return self.cursor;
            }
        }
        self.fields
            .iter()
            .position(|f| !self.is_handled(&f.name))
            .unwrap_or(self.fields.len())
    }

    /// The active field index after `updates` are applied, without applying
    /// them. Used to report the post-turn cursor while keeping turn mutation
    /// all-or-nothing.
    pub fn resolve_after(&self, updates: &HashMap<String, String>) -> usize {
        self.fields
            .iter()
            .position(|f| !updates.contains_key(&f.name) && !self.is_handled(&f.name))
            .unwrap_or(self.fields.len())
    }

    /// Apply a turn's writes: merge values, then re-resolve the cursor.
    /// Whole-session replace in the store is the only way other readers see
    /// this.
    pub fn apply(&mut self, updates: &HashMap<String, String>) {
        for (name, value) in updates {
            self.values.insert(name.clone(), value.clone());
        }
        self.cursor = self.resolve_active();
    }

    pub fn is_exhausted(&self) -> bool {
        self.resolve_active() >= self.fields.len()
    }
}

/// Client-authoritative turn state, as sent inline with a chat request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InlineState {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub values: HashMap<String, String>,
    #[serde(default)]
    pub cursor: Option<usize>,
}

impl InlineState {
    /// Reconstruct an equivalent transient session.
    ///
    /// Kinds the client omitted are filled in by the name heuristic. When no
    /// explicit cursor is given, resolution starts from 0.
    pub fn into_session(self) -> Session {
        let mut fields = self.fields;
        for f in &mut fields {
            f.ensure_kind();
        }
        let cursor = self.cursor.unwrap_or(0);
        Session {
            id: String::new(),
            fields,
            values: self.values,
            cursor,
            source: None,
        }
    }
}

/// Opaque session token, unique per process.
pub fn generate_session_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("sess_{:x}_{:08x}", nanos, fastrand::u32(..))
}
