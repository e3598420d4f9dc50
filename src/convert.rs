//! Request-level entry points.
//!
//! Each function runs one request end to end: validate, render, paginate,
//! and optionally upload. Input is validated before anything expensive
//! happens, so an empty document never launches a browser.
//!
//! PDFs produced on behalf of a request live in their own temp directory
//! under [`ConversionConfig::work_dir`]; that directory is removed before
//! the function returns, on success and on every error path.

use crate::config::ConversionConfig;
use crate::error::RemarkdownError;
use crate::output::{ConversionRequest, ConversionStats, GeneratedPdf, PdfArtifact, UploadReceipt};
use crate::pipeline::{naming, paginate, render};
use crate::upload::normalize_folder;
use chrono::Utc;
use std::future::Future;
use std::path::Path;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Render a request to a complete HTML document, without a browser.
pub fn render_preview(request: &ConversionRequest) -> Result<String, RemarkdownError> {
    request.validate()?;
    render::render_html(&request.markdown, &display_title(request))
}

/// Convert markdown to a PDF at `output_path`.
///
/// Parent directories are created as needed. `output_path` must not exist.
pub async fn convert_to_file(
    request: &ConversionRequest,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<PdfArtifact, RemarkdownError> {
    let path = output_path.as_ref();
    report(config, async {
        request.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemarkdownError::OutputWriteFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        let html = render_document(request, config)?;
        let artifact = paginate::paginate(&html, path, config).await?;
        notify_pdf(config, &artifact);
        Ok::<_, RemarkdownError>(artifact)
    })
    .await
}

/// Convert markdown to PDF bytes held in memory.
///
/// The returned file name is `{name}-{timestamp}.pdf`.
pub async fn convert_to_bytes(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<GeneratedPdf, RemarkdownError> {
    report(config, async {
        let total_start = Instant::now();
        request.validate()?;

        let job = paginate_in_temp(request, config).await?;
        let bytes = tokio::fs::read(&job.artifact.path)
            .await
            .map_err(|e| RemarkdownError::Internal(format!("reading generated PDF: {e}")))?;
        let PaginatedJob {
            dir,
            artifact,
            name,
            mut stats,
        } = job;
        remove_temp_dir(dir);

        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!("Generated {}.pdf ({} bytes) in {}ms", name, bytes.len(), stats.total_duration_ms);
        Ok::<_, RemarkdownError>(GeneratedPdf {
            filename: format!("{name}.pdf"),
            bytes,
            height_px: artifact.height_px,
            stats,
        })
    })
    .await
}

/// Convert markdown to PDF and upload it into `folder` on the device.
///
/// `None` or a blank folder means [`ConversionConfig::default_folder`]. The
/// upload collaborator is checked before rendering, so a missing or
/// unauthenticated tool fails fast without launching a browser.
pub async fn convert_and_upload(
    request: &ConversionRequest,
    folder: Option<&str>,
    config: &ConversionConfig,
) -> Result<UploadReceipt, RemarkdownError> {
    report(config, async {
        let total_start = Instant::now();
        request.validate()?;
        let folder = normalize_folder(
            folder
                .filter(|f| !f.trim().is_empty())
                .unwrap_or(config.default_folder.as_str()),
        )?;

        let uploader = config.resolve_uploader();
        uploader.ensure_ready().await?;

        let job = paginate_in_temp(request, config).await?;
        let upload_start = Instant::now();
        uploader.ensure_folder(&folder).await?;
        uploader.upload(&job.artifact.path, &folder).await?;

        let PaginatedJob {
            dir, name, mut stats, ..
        } = job;
        remove_temp_dir(dir);

        let filename = format!("{name}.pdf");
        stats.upload_duration_ms = upload_start.elapsed().as_millis() as u64;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        if let Some(ref cb) = config.progress_callback {
            cb.on_uploaded(&folder, &filename);
        }
        info!("Uploaded {} to {} in {}ms total", filename, folder, stats.total_duration_ms);

        Ok::<_, RemarkdownError>(UploadReceipt {
            message: format!("Successfully uploaded \"{filename}\" to reMarkable folder \"{folder}\""),
            filename,
            folder,
            stats,
        })
    })
    .await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A PDF sitting in its request-scoped temp directory.
struct PaginatedJob {
    dir: TempDir,
    artifact: PdfArtifact,
    name: String,
    stats: ConversionStats,
}

/// Forward any error to the progress callback before returning it.
async fn report<T>(
    config: &ConversionConfig,
    fut: impl Future<Output = Result<T, RemarkdownError>>,
) -> Result<T, RemarkdownError> {
    let result = fut.await;
    if let Err(ref e) = result {
        warn!("Conversion failed: {}", e);
        if let Some(ref cb) = config.progress_callback {
            cb.on_error(&e.to_string());
        }
    }
    result
}

fn display_title(request: &ConversionRequest) -> String {
    let title = request.title.trim();
    if title.is_empty() {
        "Document".to_string()
    } else {
        title.to_string()
    }
}

fn render_document(request: &ConversionRequest, config: &ConversionConfig) -> Result<String, RemarkdownError> {
    let html = render::render_html(&request.markdown, &display_title(request))?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_rendered(html.len());
    }
    Ok(html)
}

fn notify_pdf(config: &ConversionConfig, artifact: &PdfArtifact) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_pdf_complete(artifact.byte_size, artifact.height_px);
    }
}

/// Render and paginate into a fresh temp directory under `work_dir`.
///
/// On error the directory is dropped, and with it any partial output.
async fn paginate_in_temp(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<PaginatedJob, RemarkdownError> {
    let render_start = Instant::now();
    let html = render_document(request, config)?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let name = naming::document_name(Some(&request.title), &config.default_document_name, Utc::now());
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .map_err(|e| RemarkdownError::OutputWriteFailed {
            path: config.work_dir.clone(),
            source: e,
        })?;
    let dir = tempfile::Builder::new()
        .prefix("remarkdown-")
        .tempdir_in(&config.work_dir)
        .map_err(|e| RemarkdownError::OutputWriteFailed {
            path: config.work_dir.clone(),
            source: e,
        })?;
    let pdf_path = dir.path().join(format!("{name}.pdf"));
    debug!("Paginating into {}", pdf_path.display());

    let paginate_start = Instant::now();
    let artifact = paginate::paginate(&html, &pdf_path, config).await?;
    let paginate_duration_ms = paginate_start.elapsed().as_millis() as u64;
    notify_pdf(config, &artifact);

    Ok(PaginatedJob {
        stats: ConversionStats {
            render_duration_ms,
            paginate_duration_ms,
            pdf_bytes: artifact.byte_size,
            ..Default::default()
        },
        dir,
        artifact,
        name,
    })
}

/// Remove a request's temp directory. Failure is logged, never returned.
fn remove_temp_dir(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        warn!("Could not remove temp dir {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_rejects_empty_markdown() {
        let err = render_preview(&ConversionRequest::new(" \n", "x")).unwrap_err();
        assert!(matches!(err, RemarkdownError::EmptyMarkdown));
    }

    #[test]
    fn preview_uses_fallback_title() {
        let html = render_preview(&ConversionRequest::new("hello", "  ")).unwrap();
        assert!(html.contains("<title>Document</title>"));
        assert!(html.contains("<p>hello</p>"));
    }

    #[tokio::test]
    async fn empty_upload_request_fails_before_touching_the_tool() {
        let config = ConversionConfig::builder()
            .rmapi_binary("remarkdown-test-no-such-binary")
            .build()
            .unwrap();
        let err = convert_and_upload(&ConversionRequest::new("", "x"), None, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RemarkdownError::EmptyMarkdown));
    }

    #[tokio::test]
    async fn traversing_folder_is_an_input_error() {
        let config = ConversionConfig::default();
        let err = convert_and_upload(&ConversionRequest::new("# x", "x"), Some("/Notes/../.."), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RemarkdownError::InvalidFolder { .. }));
    }
}
