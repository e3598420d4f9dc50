//! Progress-callback trait for Paginator stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe a
//! conversion as it moves through the Paginator's states.
//!
//! The CLI uses it to drive a terminal spinner; tests use it to assert that
//! style reapplication happens before the body height is measured.
//!
//! # Example
//!
//! ```rust
//! use remarkdown::{ConversionConfig, ConversionProgressCallback, PaginatorStage};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StageLog(Mutex<Vec<PaginatorStage>>);
//!
//! impl ConversionProgressCallback for StageLog {
//!     fn on_stage(&self, stage: PaginatorStage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(StageLog::default()))
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// States the Paginator passes through for one conversion.
///
/// A successful run visits every state in declaration order after `Idle`.
/// A failed run jumps to `BrowserClosed` from wherever it failed, or never
/// leaves `Idle` when the launch itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginatorStage {
    Idle,
    BrowserLaunching,
    PageLoaded,
    StylesReapplied,
    HeightMeasured,
    PdfWritten,
    BrowserClosed,
}

impl fmt::Display for PaginatorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaginatorStage::Idle => "idle",
            PaginatorStage::BrowserLaunching => "launching browser",
            PaginatorStage::PageLoaded => "page loaded",
            PaginatorStage::StylesReapplied => "styles reapplied",
            PaginatorStage::HeightMeasured => "height measured",
            PaginatorStage::PdfWritten => "pdf written",
            PaginatorStage::BrowserClosed => "browser closed",
        };
        f.write_str(label)
    }
}

/// Called by the pipeline as a conversion progresses.
///
/// Implementations must be `Send + Sync`: concurrent HTTP requests share one
/// configuration and therefore one callback. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the markdown has been rendered to HTML.
    ///
    /// # Arguments
    /// * `html_len`: byte length of the complete HTML document
    fn on_rendered(&self, html_len: usize) {
        let _ = html_len;
    }

    /// Called on every Paginator state transition.
    fn on_stage(&self, stage: PaginatorStage) {
        let _ = stage;
    }

    /// Called after the PDF exists on disk and the browser is gone.
    ///
    /// # Arguments
    /// * `byte_size`: size of the written PDF
    /// * `height_px`: page height the PDF was printed at
    fn on_pdf_complete(&self, byte_size: u64, height_px: u32) {
        let _ = (byte_size, height_px);
    }

    /// Called when the upload collaborator accepted the file.
    fn on_uploaded(&self, folder: &str, filename: &str) {
        let _ = (folder, filename);
    }

    /// Called when a conversion fails, with a human-readable description.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
