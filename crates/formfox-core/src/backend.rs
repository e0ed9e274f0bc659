//! Collaborator traits for the two remote capabilities the core consumes:
//! the LLM completion service and the document (extract/fill) service.
//!
//! Implementations live in their own crates (`formfox-llm`, `formfox-pdfco`);
//! the core only ever sees these traits, which keeps every turn testable
//! against the mocks in [`crate::mock`].

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SourceRef;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A name/value pair as sent to the fill service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: String,
}

/// A structurally-declared form field as reported by the document service.
#[derive(Debug, Clone)]
pub struct NativeField {
    pub name: String,
    pub declared_type: String,
    pub page: Option<u32>,
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion service timed out")]
    Timeout,
    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("document not found")]
    NotFound,
    #[error("no text could be extracted from the document")]
    Unreadable,
    #[error("document upload failed: {0}")]
    Upload(String),
    /// The remote service reported an error; the message is surfaced verbatim.
    #[error("{0}")]
    Remote(String),
    #[error("document service timed out")]
    Timeout,
}

/// The external large-language-model chat endpoint.
pub trait CompletionBackend: Send + Sync {
    /// The provider name (e.g. "cometapi"), for logging.
    fn name(&self) -> &str;

    /// Generate a reply for the given conversation. A system instruction, if
    /// any, is the first message. The call must respect `timeout` and report
    /// overruns as [`CompletionError::Timeout`].
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, CompletionError>>;
}

/// The external document service: text extraction, native form-field
/// metadata, upload, and form fill.
pub trait DocumentBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Raw text content of the document. Scanned, text-free PDFs surface as
    /// [`DocumentError::Unreadable`].
    fn extract_text<'a>(
        &'a self,
        source: &'a SourceRef,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>>;

    /// The document's structurally-declared form fields, in document order.
    fn native_fields<'a>(
        &'a self,
        source: &'a SourceRef,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<NativeField>, DocumentError>>;

    /// Upload a local file, returning a remote document reference.
    fn upload<'a>(
        &'a self,
        path: &'a Path,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>>;

    /// Fill the document's form fields, returning a reference to the filled
    /// result.
    fn fill<'a>(
        &'a self,
        url: &'a str,
        values: &'a [FieldValue],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>>;
}
