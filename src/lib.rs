//! # remarkdown
//!
//! Render Markdown into a single continuous-scroll PDF and send it to a
//! reMarkable tablet.
//!
//! ## Why one tall page?
//!
//! Fixed-size PDF export breaks code blocks and tables across page
//! boundaries. On an e-ink reader you scroll anyway, so this crate measures
//! the rendered document and prints it onto one A4-wide page exactly as tall
//! as the content.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Render    CommonMark + GFM → HTML, code highlighted, print stylesheet inlined
//!  ├─ 2. Load      headless Chromium page, wait for load-complete
//!  ├─ 3. Restyle   print media on, highlight colours re-injected
//!  ├─ 4. Measure   body height → page height
//!  ├─ 5. Print     one page, 210 mm wide, backgrounds on
//!  └─ 6. Upload    (optional) rmapi mkdir + put into a device folder
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use remarkdown::{convert_to_bytes, ConversionConfig, ConversionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let request = ConversionRequest::new("# Hello\n\n```rust\nfn main() {}\n```", "hello");
//!     let pdf = convert_to_bytes(&request, &config).await?;
//!     std::fs::write(&pdf.filename, &pdf.bytes)?;
//!     eprintln!("{} ({} px tall)", pdf.filename, pdf.height_px);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | HTTP service (`axum` + `tower-http`) in [`server`] |
//! | `cli`    | on      | The `remarkdown` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Library-only use:
//! ```toml
//! remarkdown = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use browser::{BrowserBackend, BrowserSession, ChromiumBackend, LaunchOptions, PdfPageLayout};
pub use config::{ConversionConfig, ConversionConfigBuilder, PageMargins, ViewportSize};
pub use convert::{convert_and_upload, convert_to_bytes, convert_to_file, render_preview};
pub use error::{ErrorCategory, RemarkdownError};
pub use output::{ConversionRequest, ConversionStats, GeneratedPdf, PdfArtifact, RenderedDocument, UploadReceipt};
pub use pipeline::paginate::paginate;
pub use pipeline::render::{render, render_html};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, PaginatorStage, ProgressCallback};
pub use upload::{RmapiUploader, Uploader};
