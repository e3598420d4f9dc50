//! Error types for the remarkdown library.
//!
//! A single fatal error type, [`RemarkdownError`], covers every way a
//! request can fail. Variants are grouped into an [`ErrorCategory`] so the
//! HTTP layer and the CLI can decide status codes and exit messages without
//! matching on every variant:
//!
//! * **Input**: empty markdown, a bad folder name. Rejected before any
//!   expensive work starts.
//! * **Render**: the HTML document could not be assembled.
//! * **Browser**: launch, load, measure or export failed inside the
//!   Paginator. The browser process has already been torn down when one of
//!   these reaches the caller.
//! * **ExternalTool**: the upload collaborator is missing, unauthenticated,
//!   or rejected the upload.
//!
//! Nothing here is retried automatically; a failed request must be
//! re-triggered by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the remarkdown library.
#[derive(Debug, Error)]
pub enum RemarkdownError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Markdown was missing or contained only whitespace.
    #[error("Markdown content is required")]
    EmptyMarkdown,

    /// Target folder on the device is empty or escapes the root.
    #[error("Invalid folder '{folder}': use a path like /LLM-Outputs, without '..'")]
    InvalidFolder { folder: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The HTML document template could not be assembled.
    #[error("Failed to render markdown: {detail}")]
    RenderFailed { detail: String },

    // ── Browser errors ────────────────────────────────────────────────────
    /// Headless browser could not be started.
    #[error(
        "Failed to launch headless browser: {detail}\n\
Check that Chromium/Chrome is installed (or pass --chrome <PATH>) and that the\n\
environment allows it to start without a sandbox."
    )]
    BrowserLaunchFailed { detail: String },

    /// The page never reported load-complete within the configured bound.
    #[error("Page did not finish loading within {secs}s\nIncrease --load-timeout.")]
    RenderTimeout { secs: u64 },

    /// The browser rejected the HTML or a style/media command.
    #[error("Browser failed while preparing the page: {detail}")]
    PageLoadFailed { detail: String },

    /// The body height could not be read, or was not a usable number.
    #[error("Failed to measure rendered content height: {detail}")]
    MeasureFailed { detail: String },

    /// The browser could not print, or the PDF could not be written.
    #[error("Failed to export PDF to '{path}': {detail}")]
    ExportFailed { path: PathBuf, detail: String },

    /// Paginator refuses to overwrite an existing file.
    #[error("Output path '{path}' already exists")]
    OutputExists { path: PathBuf },

    // ── External tool errors ──────────────────────────────────────────────
    /// The upload collaborator binary could not be executed.
    #[error("'{tool}' is not installed or not on PATH")]
    ToolNotInstalled { tool: String },

    /// The upload collaborator runs but has no valid session.
    #[error("'{tool}' is installed but not authenticated")]
    ToolNotAuthenticated { tool: String },

    /// The device refused the file.
    #[error("Upload to '{folder}' was rejected: {detail}")]
    UploadRejected { folder: String, detail: String },

    /// Any other non-zero exit from the collaborator (e.g. folder listing).
    #[error("'{tool} {command}' failed: {detail}")]
    ToolFailed {
        tool: String,
        command: String,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a local output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error taxonomy used at the HTTP and CLI boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Input,
    Render,
    Browser,
    ExternalTool,
    Config,
    Internal,
}

impl RemarkdownError {
    /// Which part of the pipeline produced this error.
    pub fn category(&self) -> ErrorCategory {
        use RemarkdownError::*;
        match self {
            EmptyMarkdown | InvalidFolder { .. } => ErrorCategory::Input,
            RenderFailed { .. } => ErrorCategory::Render,
            BrowserLaunchFailed { .. }
            | RenderTimeout { .. }
            | PageLoadFailed { .. }
            | MeasureFailed { .. }
            | ExportFailed { .. }
            | OutputExists { .. } => ErrorCategory::Browser,
            ToolNotInstalled { .. }
            | ToolNotAuthenticated { .. }
            | UploadRejected { .. }
            | ToolFailed { .. } => ErrorCategory::ExternalTool,
            InvalidConfig(_) => ErrorCategory::Config,
            OutputWriteFailed { .. } | Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Remediation steps a user can follow, when there is something to do.
    pub fn instructions(&self) -> Option<String> {
        match self {
            RemarkdownError::ToolNotInstalled { tool } => Some(format!(
                "Install {tool} (https://github.com/ddvk/rmapi) and make sure it is on PATH."
            )),
            RemarkdownError::ToolNotAuthenticated { tool } => Some(format!(
                "Run: {tool} (then follow the authentication prompts)"
            )),
            RemarkdownError::BrowserLaunchFailed { .. } => Some(
                "Install Chromium or Google Chrome, or set the browser path with --chrome."
                    .to_string(),
            ),
            _ => None,
        }
    }
}
