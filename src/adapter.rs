//! # Document Adapters
//!
//! A document adapter is the contract the print service drives to generate
//! a document: it negotiates layout, writes pages into a destination the
//! service provides, and is told when the job no longer needs it.
//!
//! ## Lifecycle
//!
//! ```text
//! on_start ─▶ on_layout ─▶ on_write ─┬─▶ on_finish
//!                 ▲                  │
//!                 └── (attributes ───┘
//!                      changed)
//! ```
//!
//! The service may lay out and write several times (the user changes paper
//! size in the print dialog). A [`CancellationSignal`] accompanies each
//! layout and write; once it is set, the adapter returns `Cancelled`
//! without producing output.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, warn};

use crate::content::{ContentStream, copy};
use crate::options::PrintAttributes;

/// Destination the service hands to [`DocumentAdapter::on_write`].
pub type WriteDestination = Box<dyn Write + Send>;

/// Invoked once when an adapter finishes.
pub type FinishCallback = Box<dyn FnOnce() + Send>;

/// Cancellation flag shared between the print framework and an adapter.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal(Arc<AtomicBool>);

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Kind of document reported during layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Document,
    Photo,
    Unknown,
}

/// Document description reported by a finished layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub kind: DocumentKind,
    /// `None` when the page count is unknown
    pub page_count: Option<u32>,
}

/// Inclusive, zero-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// Every page of the document.
    pub const ALL_PAGES: PageRange = PageRange {
        start: 0,
        end: u32::MAX,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutResult {
    Finished { info: DocumentInfo, changed: bool },
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Finished(Vec<PageRange>),
    Failed(String),
    Cancelled,
}

/// Paginated content generation driven by the print service.
pub trait DocumentAdapter: Send {
    /// The job has started; called once before the first layout.
    fn on_start(&mut self) {}

    /// Lay the document out for `new` attributes.
    fn on_layout(
        &mut self,
        old: Option<&PrintAttributes>,
        new: &PrintAttributes,
        cancel: &CancellationSignal,
    ) -> LayoutResult;

    /// Write the requested pages into `dest`.
    fn on_write(
        &mut self,
        pages: &[PageRange],
        dest: WriteDestination,
        cancel: &CancellationSignal,
    ) -> WriteResult;

    /// The job is done with this adapter; release everything it holds.
    fn on_finish(&mut self) {}
}

// ============================================================================
// STREAM ADAPTER
// ============================================================================

/// Serves an opened content stream (typically a PDF) as a document.
///
/// The stream is drained on the first write and the bytes are kept, so later
/// write passes replay the same document.
pub struct StreamAdapter {
    job_name: String,
    page_count: Option<u32>,
    input: Option<ContentStream>,
    drained: Option<Vec<u8>>,
    on_finish: Option<FinishCallback>,
}

impl StreamAdapter {
    pub fn new(job_name: impl Into<String>, page_count: Option<u32>, input: ContentStream) -> Self {
        Self {
            job_name: job_name.into(),
            page_count,
            input: Some(input),
            drained: None,
            on_finish: None,
        }
    }

    /// Register a callback fired from [`on_finish`](DocumentAdapter::on_finish).
    pub fn with_finish_callback(mut self, callback: FinishCallback) -> Self {
        self.on_finish = Some(callback);
        self
    }

    /// The document bytes, draining the input stream on first use.
    fn document(&mut self) -> io::Result<&[u8]> {
        if self.drained.is_none() {
            let input = self.input.take().ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "Content stream already closed")
            })?;
            let mut bytes = Vec::new();
            copy(input, &mut bytes)?;
            self.drained = Some(bytes);
        }

        Ok(self.drained.as_deref().unwrap_or_default())
    }
}

impl DocumentAdapter for StreamAdapter {
    fn on_layout(
        &mut self,
        old: Option<&PrintAttributes>,
        new: &PrintAttributes,
        cancel: &CancellationSignal,
    ) -> LayoutResult {
        if cancel.is_cancelled() {
            return LayoutResult::Cancelled;
        }

        LayoutResult::Finished {
            info: DocumentInfo {
                name: self.job_name.clone(),
                kind: DocumentKind::Document,
                page_count: self.page_count,
            },
            changed: old != Some(new),
        }
    }

    fn on_write(
        &mut self,
        _pages: &[PageRange],
        dest: WriteDestination,
        cancel: &CancellationSignal,
    ) -> WriteResult {
        if cancel.is_cancelled() {
            return WriteResult::Cancelled;
        }

        let result = self.document().and_then(|document| copy(document, dest));

        match result {
            Ok(bytes) => {
                debug!(job = %self.job_name, bytes, "Document written");
                WriteResult::Finished(vec![PageRange::ALL_PAGES])
            }
            Err(e) => {
                warn!(job = %self.job_name, error = %e, "Document write failed");
                WriteResult::Failed(e.to_string())
            }
        }
    }

    fn on_finish(&mut self) {
        self.input = None;
        self.drained = None;

        if let Some(callback) = self.on_finish.take() {
            callback();
        }
    }
}

// ============================================================================
// FINISH PROXY
// ============================================================================

/// Wraps an adapter so its finish can be observed.
///
/// Layout and write pass straight through to the delegate.
pub struct FinishProxy {
    delegate: Box<dyn DocumentAdapter>,
    on_finish: Option<FinishCallback>,
}

impl FinishProxy {
    pub fn new(delegate: Box<dyn DocumentAdapter>, on_finish: FinishCallback) -> Self {
        Self {
            delegate,
            on_finish: Some(on_finish),
        }
    }
}

impl DocumentAdapter for FinishProxy {
    fn on_start(&mut self) {
        self.delegate.on_start();
    }

    fn on_layout(
        &mut self,
        old: Option<&PrintAttributes>,
        new: &PrintAttributes,
        cancel: &CancellationSignal,
    ) -> LayoutResult {
        self.delegate.on_layout(old, new, cancel)
    }

    fn on_write(
        &mut self,
        pages: &[PageRange],
        dest: WriteDestination,
        cancel: &CancellationSignal,
    ) -> WriteResult {
        self.delegate.on_write(pages, dest, cancel)
    }

    fn on_finish(&mut self) {
        self.delegate.on_finish();

        if let Some(callback) = self.on_finish.take() {
            callback();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
