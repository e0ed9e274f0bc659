//! Hand-rolled mock collaborators for testing.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{
    BoxFuture, ChatMessage, CompletionBackend, CompletionError, DocumentBackend, DocumentError,
    FieldValue, NativeField,
};
use crate::session::SourceRef;

/// A scripted completion reply.
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum MockReply {
    Text(String),
    Timeout,
    Unavailable(String),
}

/// A mock [`CompletionBackend`].
///
/// Supports a fixed reply or a sequence of replies (one per call, repeating
/// the last when exhausted), optional simulated latency, call counting, and
/// capture of the most recent message list sent to it.
pub struct MockCompletion {
    replies: Mutex<Vec<MockReply>>,
    fallback: MockReply,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    last_messages: Mutex<Option<Vec<ChatMessage>>>,
}

impl MockCompletion {
    /// A mock that always replies with `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self::from_fallback(MockReply::Text(text.into()))
    }

    /// A mock that always fails as unavailable.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::from_fallback(MockReply::Unavailable(msg.into()))
    }

    /// A mock that always times out.
    #[allow(dead_code)]
    pub fn timing_out() -> Self {
        Self::from_fallback(MockReply::Timeout)
    }

    /// Replies in order, repeating the last one when exhausted.
    pub fn with_sequence(mut replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "sequence must have at least one reply");
        // Reverse so we can pop() from the front cheaply.
        replies.reverse();
        let fallback = replies.first().cloned().unwrap();
        Self {
            replies: Mutex::new(replies),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            last_messages: Mutex::new(None),
        }
    }

    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn from_fallback(fallback: MockReply) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            last_messages: Mutex::new(None),
        }
    }

    /// How many times `complete()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The message list from the most recent call, if any.
    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.last_messages.lock().unwrap().clone()
    }

    fn next_reply(&self) -> MockReply {
        let mut seq = self.replies.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl CompletionBackend for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn complete<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = Some(messages.to_vec());
        let reply = self.next_reply();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match reply {
                MockReply::Text(t) => Ok(t),
                MockReply::Timeout => Err(CompletionError::Timeout),
                MockReply::Unavailable(m) => Err(CompletionError::Unavailable(m)),
            }
        })
    }
}

/// A mock [`DocumentBackend`] with per-operation scripted outcomes and call
/// counting.
pub struct MockDocument {
    pub text: Result<String, String>,
    pub fields: Result<Vec<NativeField>, String>,
    pub upload_url: Result<String, String>,
    pub fill_url: Result<String, String>,
    text_calls: AtomicUsize,
    fields_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    fill_calls: AtomicUsize,
    last_fill: Mutex<Option<Vec<FieldValue>>>,
}

impl Default for MockDocument {
    fn default() -> Self {
        Self {
            text: Ok("Vorname: ____\nNachname: ____".to_string()),
            fields: Ok(Vec::new()),
            upload_url: Ok("https://files.example/mock.pdf".to_string()),
            fill_url: Ok("https://files.example/mock-filled.pdf".to_string()),
            text_calls: AtomicUsize::new(0),
            fields_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            fill_calls: AtomicUsize::new(0),
            last_fill: Mutex::new(None),
        }
    }
}

impl MockDocument {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Ok(text.into()),
            ..Self::default()
        }
    }

    pub fn with_native_fields(fields: Vec<NativeField>) -> Self {
        Self {
            fields: Ok(fields),
            ..Self::default()
        }
    }

    /// A mock whose fill call fails with the given remote message.
    pub fn with_fill_error(msg: impl Into<String>) -> Self {
        Self {
            fill_url: Err(msg.into()),
            ..Self::default()
        }
    }

    /// Error strings are mapped onto [`DocumentError::Remote`]; the sentinel
    /// values "unreadable" and "not_found" map to their dedicated variants.
    fn to_err(msg: &str) -> DocumentError {
        match msg {
            "unreadable" => DocumentError::Unreadable,
            "not_found" => DocumentError::NotFound,
            other => DocumentError::Remote(other.to_string()),
        }
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn fill_calls(&self) -> usize {
        self.fill_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn fields_calls(&self) -> usize {
        self.fields_calls.load(Ordering::SeqCst)
    }

    /// The value list from the most recent `fill` call.
    pub fn last_fill(&self) -> Option<Vec<FieldValue>> {
        self.last_fill.lock().unwrap().clone()
    }
}

impl DocumentBackend for MockDocument {
    fn name(&self) -> &str {
        "mock-document"
    }

    fn extract_text<'a>(
        &'a self,
        _source: &'a SourceRef,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.text.clone();
        Box::pin(async move { result.map_err(|e| Self::to_err(&e)) })
    }

    fn native_fields<'a>(
        &'a self,
        _source: &'a SourceRef,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<NativeField>, DocumentError>> {
        self.fields_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.fields.clone();
        Box::pin(async move { result.map_err(|e| Self::to_err(&e)) })
    }

    fn upload<'a>(
        &'a self,
        _path: &'a Path,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.upload_url.clone();
        Box::pin(async move { result.map_err(|e| DocumentError::Upload(e)) })
    }

    fn fill<'a>(
        &'a self,
        _url: &'a str,
        values: &'a [FieldValue],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<String, DocumentError>> {
        self.fill_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fill.lock().unwrap() = Some(values.to_vec());
        let result = self.fill_url.clone();
        Box::pin(async move { result.map_err(|e| Self::to_err(&e)) })
    }
}
