//! Fill dispatcher: turn a session's collected values into one filled-document
//! request.
//!
//! Read-only with respect to the session. Local sources are uploaded first to
//! obtain a remote reference; the value list is built in field order with
//! empty-string defaults so its length always equals the field count.

use thiserror::Error;

use crate::Config;
use crate::backend::{DocumentBackend, DocumentError, FieldValue};
use crate::session::{Session, SourceRef};

#[derive(Error, Debug)]
pub enum FillError {
    #[error("session has no source document")]
    NoSource,
    /// Remote fill/upload failures, surfaced verbatim. Not retried here;
    /// the session stays exhausted so the caller can retry without
    /// re-collecting answers.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Build the name→value list for the fill request, in field-list order.
/// Fields never reached default to `""`, same as explicitly skipped ones.
pub fn fill_values(session: &Session) -> Vec<FieldValue> {
    session
        .fields
        .iter()
        .map(|f| FieldValue {
            name: f.name.clone(),
            value: session.values.get(&f.name).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Request a filled document for the session's collected values.
///
/// Returns a reference to the filled result. On success the local temp
/// source (if any) is released; the caller is expected to discard the
/// session afterwards.
pub async fn dispatch_fill(
    session: &Session,
    doc: &dyn DocumentBackend,
    config: &Config,
) -> Result<String, FillError> {
    let source = session.source.as_ref().ok_or(FillError::NoSource)?;
    let timeout = config.document_timeout();

    let url = match source {
        SourceRef::Remote(url) => url.clone(),
        SourceRef::Local(path) => {
            let url = doc.upload(path, timeout).await?;
            tracing::info!(session = %session.id, url = %url, "uploaded local source for fill");
            url
        }
    };

    let values = fill_values(session);
    let result = doc.fill(&url, &values, timeout).await?;
    tracing::info!(session = %session.id, fields = values.len(), "fill complete");

    if let SourceRef::Local(path) = source {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temp source");
        }
    }

    Ok(result)
}
