use std::time::Duration;

use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod dialogue;
pub mod extract;
pub mod field;
pub mod fill;
pub mod mock;
pub mod prompts;
pub mod session;
pub mod store;

// Re-export for convenience
pub use backend::{ChatMessage, CompletionBackend, CompletionError, DocumentBackend, DocumentError, FieldValue, Role};
pub use dialogue::{TurnAction, TurnOutcome, advance_turn};
pub use extract::{ExtractError, ExtractOutcome, Strategy, extract_fields};
pub use field::{Field, FieldKind, classify_kind};
pub use fill::{FillError, dispatch_fill};
pub use session::{InlineState, Session, SourceRef};
pub use store::SessionStore;

/// Errors surfaced to the routing layer.
///
/// Per-operation errors ([`ExtractError`], [`FillError`], ...) stay close to
/// the operation that produced them; this enum exists so callers that drive
/// several operations in a row (the web handlers) have one thing to match on.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Fill(#[from] FillError),
}

/// Runtime configuration for the core.
///
/// Both service timeouts are bounded (spec: collaborator calls block the turn,
/// so a hung remote must surface as "unavailable" rather than stall forever).
/// The session idle horizon is kept equal to the temp-upload horizon so a
/// session never outlives its source document.
#[derive(Debug, Clone)]
pub struct Config {
    pub completion_timeout_secs: u64,
    pub document_timeout_secs: u64,
    /// Upper bound on extracted text embedded in the inference prompt.
    pub max_prompt_chars: usize,
    pub session_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion_timeout_secs: 30,
            document_timeout_secs: 60,
            max_prompt_chars: extract::MAX_PROMPT_CHARS,
            session_idle_secs: 30 * 60,
        }
    }
}

impl Config {
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Overlay values from an on-disk config file onto the defaults.
    pub fn with_file(mut self, file: &config_file::ConfigFile) -> Self {
        if let Some(limits) = &file.limits {
            if let Some(v) = limits.completion_timeout_secs {
                self.completion_timeout_secs = v;
            }
            if let Some(v) = limits.document_timeout_secs {
                self.document_timeout_secs = v;
            }
            if let Some(v) = limits.max_prompt_chars {
                self.max_prompt_chars = v;
            }
            if let Some(v) = limits.session_idle_secs {
                self.session_idle_secs = v;
            }
        }
        self
    }
}
