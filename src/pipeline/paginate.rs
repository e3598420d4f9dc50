//! Paginator: styled HTML → one continuous-height PDF page.
//!
//! ## State machine
//!
//! ```text
//! Idle ─▶ BrowserLaunching ─▶ PageLoaded ─▶ StylesReapplied ─▶ HeightMeasured ─▶ PdfWritten ─▶ BrowserClosed
//!   ▲            │                 │               │                  │               │
//!   └─ launch ───┘                 └───────────────┴──── any error ───┴───────────────┴─▶ BrowserClosed
//!      failed
//! ```
//!
//! Once a session exists it is closed on every path, success or failure,
//! before the result is returned. A failed run never leaves a file at
//! `output_path`.
//!
//! The document is laid out at the printable width of the page, measured,
//! and printed onto paper whose height is the measured height plus the top
//! and bottom margins. The area between the margins therefore holds the
//! whole document, and no code block is ever split across a page boundary.

use crate::browser::{mm_to_px, BrowserSession, PdfPageLayout};
use crate::config::ConversionConfig;
use crate::error::RemarkdownError;
use crate::output::PdfArtifact;
use crate::pipeline::style::reapply_css;
use crate::progress::PaginatorStage;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Extra paper height absorbing the printer's inch/point rounding.
const PAPER_SLACK_PX: f64 = 1.0;

/// Page geometry for a measured document height.
///
/// Fails with [`RemarkdownError::MeasureFailed`] if the height is not a
/// positive, finite number that fits the page-height type.
pub fn page_layout(config: &ConversionConfig, measured_px: f64) -> Result<PdfPageLayout, RemarkdownError> {
    if !measured_px.is_finite() || measured_px <= 0.0 {
        return Err(RemarkdownError::MeasureFailed {
            detail: format!("document height must be positive, got {measured_px}"),
        });
    }
    let content = measured_px.ceil();
    let margins = mm_to_px(config.margins.top_mm + config.margins.bottom_mm);
    let paper = (content + margins + PAPER_SLACK_PX).ceil();
    if paper > f64::from(u32::MAX) {
        return Err(RemarkdownError::MeasureFailed {
            detail: format!("document height {measured_px}px is too large to print"),
        });
    }
    Ok(PdfPageLayout {
        width_mm: config.page_width_mm,
        height_px: paper as u32,
        content_height_px: content as u32,
        margin_top_mm: config.margins.top_mm,
        margin_bottom_mm: config.margins.bottom_mm,
        margin_left_mm: config.margins.left_mm,
        margin_right_mm: config.margins.right_mm,
        print_background: true,
    })
}

fn enter(config: &ConversionConfig, stage: PaginatorStage) {
    debug!("Paginator → {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

/// Render `html` to a single-page PDF at `output_path`.
///
/// `output_path` must not exist yet; its parent directory must.
pub async fn paginate(
    html: &str,
    output_path: &Path,
    config: &ConversionConfig,
) -> Result<PdfArtifact, RemarkdownError> {
    if tokio::fs::try_exists(output_path).await.unwrap_or(false) {
        return Err(RemarkdownError::OutputExists {
            path: output_path.to_path_buf(),
        });
    }

    let backend = config.resolve_browser();
    enter(config, PaginatorStage::BrowserLaunching);
    let mut session = backend.launch(&config.launch_options()).await?;

    let result = drive(session.as_mut(), html, output_path, config).await;

    if let Err(e) = session.close().await {
        warn!("Browser did not close cleanly: {}", e);
    }
    enter(config, PaginatorStage::BrowserClosed);

    let artifact = result?;
    info!(
        "PDF written: {} ({} bytes, {}px tall)",
        artifact.path.display(),
        artifact.byte_size,
        artifact.height_px
    );
    Ok(artifact)
}

/// Everything between launch and close.
async fn drive(
    session: &mut dyn BrowserSession,
    html: &str,
    output_path: &Path,
    config: &ConversionConfig,
) -> Result<PdfArtifact, RemarkdownError> {
    // ── Load ─────────────────────────────────────────────────────────────
    match tokio::time::timeout(config.load_timeout(), session.load_html(html)).await {
        Ok(loaded) => loaded?,
        Err(_) => {
            return Err(RemarkdownError::RenderTimeout {
                secs: config.load_timeout_secs,
            })
        }
    }
    enter(config, PaginatorStage::PageLoaded);

    // ── Print media + colour reapplication ───────────────────────────────
    session.emulate_print_media().await?;
    session.inject_style(&reapply_css()).await?;
    enter(config, PaginatorStage::StylesReapplied);

    if config.settle_delay_ms > 0 {
        tokio::time::sleep(config.settle_delay()).await;
    }

    // ── Measure ──────────────────────────────────────────────────────────
    let measured = session.measure_content_height().await?;
    let layout = page_layout(config, measured)?;
    debug!(
        "Document height {}px → paper height {}px ({}px between margins)",
        measured,
        layout.height_px,
        layout.printable_height_px()
    );
    enter(config, PaginatorStage::HeightMeasured);

    // ── Export ───────────────────────────────────────────────────────────
    let bytes = session.print_pdf(&layout).await.map_err(|e| match e {
        RemarkdownError::ExportFailed { detail, .. } => RemarkdownError::ExportFailed {
            path: output_path.to_path_buf(),
            detail,
        },
        other => other,
    })?;
    if bytes.is_empty() {
        return Err(RemarkdownError::ExportFailed {
            path: output_path.to_path_buf(),
            detail: "browser returned an empty PDF".into(),
        });
    }
    let byte_size = write_new(output_path, &bytes).await?;
    enter(config, PaginatorStage::PdfWritten);

    Ok(PdfArtifact {
        path: output_path.to_path_buf(),
        byte_size,
        height_px: layout.height_px,
        content_height_px: layout.content_height_px,
        measured_height_px: measured,
        width_mm: layout.width_mm,
    })
}

/// Write `bytes` to a file that must not exist yet; remove it again on failure.
async fn write_new(path: &Path, bytes: &[u8]) -> Result<u64, RemarkdownError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => RemarkdownError::OutputExists {
                path: path.to_path_buf(),
            },
            _ => RemarkdownError::ExportFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;

    let written = async {
        file.write_all(bytes).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(path).await {
            warn!("Could not remove partial PDF {}: {}", path.display(), rm);
        }
        return Err(RemarkdownError::ExportFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        });
    }
    Ok(bytes.len() as u64)
}
