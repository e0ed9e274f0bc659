use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use formfox_core::backend::{CompletionBackend, DocumentBackend};
use formfox_core::{Config, SessionStore};

/// Shared state behind every handler.
///
/// The collaborators live behind trait objects so tests can swap in mocks
/// without touching the routing layer.
pub struct AppState {
    pub store: SessionStore,
    pub llm: Arc<dyn CompletionBackend>,
    pub doc: Arc<dyn DocumentBackend>,
    pub config: Config,
    pub upload_dir: PathBuf,
    /// Temp uploads share the session idle horizon so a session never
    /// outlives its source document.
    pub upload_ttl: Duration,
    pub max_upload_bytes: usize,
    pub completion_configured: bool,
    pub pdfco_configured: bool,
}
