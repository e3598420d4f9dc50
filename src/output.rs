//! Data types flowing through a conversion.
//!
//! ```text
//! ConversionRequest ──render──▶ RenderedDocument ──paginate──▶ PdfArtifact
//!                                                                 │
//!                                     GeneratedPdf ◀──read────────┤
//!                                     UploadReceipt ◀──upload─────┘
//! ```
//!
//! None of these outlive a single request. A [`PdfArtifact`] points into a
//! per-request temp directory that is removed once the bytes have been
//! streamed or uploaded.

use crate::error::RemarkdownError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One markdown document to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub markdown: String,
    /// Document title; also the base of the generated file name.
    pub title: String,
}

impl ConversionRequest {
    pub fn new(markdown: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            title: title.into(),
        }
    }

    /// Reject empty input before any expensive work starts.
    pub fn validate(&self) -> Result<(), RemarkdownError> {
        if self.markdown.trim().is_empty() {
            return Err(RemarkdownError::EmptyMarkdown);
        }
        Ok(())
    }
}

/// Output of the Renderer: body markup plus the stylesheet it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub title: String,
    pub html_body: String,
    pub style_sheet: String,
}

/// A PDF written by the Paginator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfArtifact {
    pub path: PathBuf,
    pub byte_size: u64,
    /// Paper height the PDF was printed at, margins included.
    pub height_px: u32,
    /// Height available between the margins: the measured height, rounded up.
    pub content_height_px: u32,
    /// Document height as reported by the browser.
    pub measured_height_px: f64,
    pub width_mm: f64,
}

/// An in-memory PDF ready to be sent to an HTTP client or written by the CLI.
#[derive(Debug, Clone)]
pub struct GeneratedPdf {
    /// File name including the `.pdf` extension.
    pub filename: String,
    pub bytes: Vec<u8>,
    pub height_px: u32,
    pub stats: ConversionStats,
}

/// Result of a successful convert-and-upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    /// File name as it appears on the device, including `.pdf`.
    pub filename: String,
    pub folder: String,
    pub message: String,
    pub stats: ConversionStats,
}

/// Wall-clock timings for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub render_duration_ms: u64,
    pub paginate_duration_ms: u64,
    pub upload_duration_ms: u64,
    pub total_duration_ms: u64,
    pub pdf_bytes: u64,
}
