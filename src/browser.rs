//! Headless browser seam.
//!
//! The Paginator talks to a [`BrowserSession`] obtained from a
//! [`BrowserBackend`]. [`ChromiumBackend`] drives a real Chromium over the
//! DevTools protocol; tests substitute an in-process fake.
//!
//! Every session is exclusively owned by one conversion and never pooled:
//! each launch gets its own process and its own throw-away profile
//! directory, so concurrent requests cannot see each other's page state.

use crate::config::ViewportSize;
use crate::error::RemarkdownError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// CSS pixels per inch; CDP page sizes are in inches.
pub const PX_PER_INCH: f64 = 96.0;
/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Parameters for starting one browser process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub viewport: ViewportSize,
    pub no_sandbox: bool,
    pub args: Vec<String>,
}

/// Page geometry handed to the browser's PDF printer.
///
/// `height_px` is the paper height; the area left between the top and
/// bottom margins is at least `content_height_px`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPageLayout {
    pub width_mm: f64,
    pub height_px: u32,
    /// Measured document height, rounded up.
    pub content_height_px: u32,
    pub margin_top_mm: f64,
    pub margin_bottom_mm: f64,
    pub margin_left_mm: f64,
    pub margin_right_mm: f64,
    pub print_background: bool,
}

impl PdfPageLayout {
    pub fn paper_width_in(&self) -> f64 {
        self.width_mm / MM_PER_INCH
    }

    pub fn paper_height_in(&self) -> f64 {
        f64::from(self.height_px) / PX_PER_INCH
    }

    /// Height between the top and bottom margins, in CSS pixels.
    pub fn printable_height_px(&self) -> f64 {
        f64::from(self.height_px) - mm_to_px(self.margin_top_mm + self.margin_bottom_mm)
    }

    /// Width between the left and right margins, in CSS pixels.
    pub fn printable_width_px(&self) -> f64 {
        mm_to_px(self.width_mm - self.margin_left_mm - self.margin_right_mm)
    }
}

fn mm_to_in(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

/// Millimetres to CSS pixels.
pub fn mm_to_px(mm: f64) -> f64 {
    mm / MM_PER_INCH * PX_PER_INCH
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Start an isolated browser with one blank page.
    ///
    /// Errors are [`RemarkdownError::BrowserLaunchFailed`]; nothing is left
    /// running when this returns `Err`.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, RemarkdownError>;
}

/// One running browser with one page, owned by a single conversion.
#[async_trait]
pub trait BrowserSession: Send {
    /// Replace the page content and wait until it reports load-complete.
    async fn load_html(&mut self, html: &str) -> Result<(), RemarkdownError>;

    /// Append a `<style>` element to the loaded document.
    async fn inject_style(&mut self, css: &str) -> Result<(), RemarkdownError>;

    /// Render as `@media print` from now on.
    async fn emulate_print_media(&mut self) -> Result<(), RemarkdownError>;

    /// Full height of the laid-out document, including the root element's
    /// padding and any trailing margins, in CSS pixels.
    async fn measure_content_height(&mut self) -> Result<f64, RemarkdownError>;

    /// Print the page to PDF bytes.
    async fn print_pdf(&mut self, layout: &PdfPageLayout) -> Result<Vec<u8>, RemarkdownError>;

    /// Shut the browser down. Must be called on every path; dropping a
    /// session without closing still kills the process, but without waiting.
    async fn close(self: Box<Self>) -> Result<(), RemarkdownError>;
}

/// [`BrowserBackend`] that launches Chromium/Chrome via chromiumoxide.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumBackend;

#[async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, RemarkdownError> {
        let profile = tempfile::Builder::new()
            .prefix("remarkdown-profile-")
            .tempdir()
            .map_err(|e| {
                RemarkdownError::BrowserLaunchFailed {
                    detail: format!("could not create profile dir: {e}"),
                }
            })?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .viewport(Viewport {
                width: options.viewport.width,
                height: options.viewport.height,
                device_scale_factor: Some(options.viewport.device_scale_factor),
                ..Default::default()
            })
            .window_size(options.viewport.width, options.viewport.height)
            .launch_timeout(Duration::from_secs(20))
            .args(options.args.clone());
        if options.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref exe) = options.executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder
            .build()
            .map_err(|detail| RemarkdownError::BrowserLaunchFailed { detail })?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            RemarkdownError::BrowserLaunchFailed {
                detail: e.to_string(),
            }
        })?;

        // The handler must be polled for any CDP command to complete. A single
        // undecodable message is reported as an error item; keep polling.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
            debug!("CDP connection closed");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Some(Err(kill_err)) = browser.kill().await {
                    warn!("Failed to kill browser after page creation error: {}", kill_err);
                }
                handler_task.abort();
                return Err(RemarkdownError::BrowserLaunchFailed {
                    detail: format!("could not open page: {e}"),
                });
            }
        };

        debug!("Chromium session started (profile {})", profile.path().display());
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            _profile: profile,
        }))
    }
}

/// A live Chromium process plus its single page.
struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    _profile: TempDir,
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process.
        self.handler_task.abort();
    }
}

/// Evaluate `expression` in the page, awaiting it if it returns a promise.
async fn eval(page: &Page, expression: &str) -> Result<serde_json::Value, String> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()?;
    let result = page
        .evaluate_expression(params)
        .await
        .map_err(|e| e.to_string())?;
    result.into_value::<serde_json::Value>().map_err(|e| e.to_string())
}

/// Resolves once the document and its web fonts have finished loading.
const WAIT_FOR_LOAD_JS: &str = r#"(async () => {
  if (document.readyState !== 'complete') {
    await new Promise(resolve => window.addEventListener('load', resolve, { once: true }));
  }
  if (document.fonts && document.fonts.ready) { await document.fonts.ready; }
  return true;
})()"#;

const CONTENT_HEIGHT_JS: &str = r#"(() => {
  const root = document.documentElement;
  return Math.max(root.getBoundingClientRect().height, root.scrollHeight, document.body.scrollHeight);
})()"#;

/// Upper bound on a graceful `Browser.close` before the process is killed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn load_html(&mut self, html: &str) -> Result<(), RemarkdownError> {
        self.page
            .set_content(html)
            .await
            .map_err(|e| RemarkdownError::PageLoadFailed {
                detail: e.to_string(),
            })?;
        eval(&self.page, WAIT_FOR_LOAD_JS)
            .await
            .map_err(|detail| RemarkdownError::PageLoadFailed { detail })?;
        Ok(())
    }

    async fn inject_style(&mut self, css: &str) -> Result<(), RemarkdownError> {
        let css_literal = serde_json::to_string(css).map_err(|e| RemarkdownError::Internal(e.to_string()))?;
        let js = format!(
            "(() => {{ const s = document.createElement('style'); s.textContent = {css_literal}; \
             document.head.appendChild(s); return true; }})()"
        );
        eval(&self.page, &js)
            .await
            .map_err(|detail| RemarkdownError::PageLoadFailed { detail })?;
        Ok(())
    }

    async fn emulate_print_media(&mut self) -> Result<(), RemarkdownError> {
        let params = SetEmulatedMediaParams {
            media: Some("print".to_string()),
            features: None,
        };
        self.page
            .execute(params)
            .await
            .map_err(|e| RemarkdownError::PageLoadFailed {
                detail: format!("print media emulation: {e}"),
            })?;
        Ok(())
    }

    async fn measure_content_height(&mut self) -> Result<f64, RemarkdownError> {
        let value = eval(&self.page, CONTENT_HEIGHT_JS)
            .await
            .map_err(|detail| RemarkdownError::MeasureFailed { detail })?;
        value.as_f64().ok_or_else(|| RemarkdownError::MeasureFailed {
            detail: format!("expected a number, got {value}"),
        })
    }

    async fn print_pdf(&mut self, layout: &PdfPageLayout) -> Result<Vec<u8>, RemarkdownError> {
        let params = PrintToPdfParams {
            print_background: Some(layout.print_background),
            paper_width: Some(layout.paper_width_in()),
            paper_height: Some(layout.paper_height_in()),
            margin_top: Some(mm_to_in(layout.margin_top_mm)),
            margin_bottom: Some(mm_to_in(layout.margin_bottom_mm)),
            margin_left: Some(mm_to_in(layout.margin_left_mm)),
            margin_right: Some(mm_to_in(layout.margin_right_mm)),
            prefer_css_page_size: Some(false),
            ..Default::default()
        };
        self.page.pdf(params).await.map_err(|e| RemarkdownError::ExportFailed {
            path: PathBuf::new(),
            detail: e.to_string(),
        })
    }

    async fn close(mut self: Box<Self>) -> Result<(), RemarkdownError> {
        shutdown(&mut self.browser, CLOSE_TIMEOUT).await
    }
}

// ── Teardown ─────────────────────────────────────────────────────────────────

/// The process controls teardown needs.
#[async_trait]
trait BrowserProcess: Send {
    async fn close(&mut self) -> Result<(), String>;
    async fn kill(&mut self) -> Result<(), String>;
    async fn wait(&mut self) -> Result<(), String>;
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), String> {
        Browser::close(self).await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn kill(&mut self) -> Result<(), String> {
        match Browser::kill(self).await {
            Some(Err(e)) => Err(e.to_string()),
            _ => Ok(()),
        }
    }

    async fn wait(&mut self) -> Result<(), String> {
        let status = Browser::wait(self).await.map_err(|e| e.to_string())?;
        debug!("Browser exited: {:?}", status);
        Ok(())
    }
}

/// Close gracefully, falling back to killing the process.
///
/// Returns within roughly two `grace` periods whatever state the CDP
/// connection is in. The process is killed unless a graceful close is
/// followed by an exit.
async fn shutdown<P: BrowserProcess + ?Sized>(process: &mut P, grace: Duration) -> Result<(), RemarkdownError> {
    let closed = match tokio::time::timeout(grace, process.close()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("browser close: {e}")),
        Err(_) => Err(format!("browser close timed out after {}ms", grace.as_millis())),
    };
    if closed.is_err() {
        if let Err(e) = process.kill().await {
            warn!("Failed to kill browser: {}", e);
        }
    }
    match tokio::time::timeout(grace, process.wait()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Waiting for browser exit failed: {}", e),
        Err(_) => {
            warn!("Browser still running after close; killing it");
            if let Err(e) = process.kill().await {
                warn!("Failed to kill browser: {}", e);
            }
        }
    }
    closed.map_err(RemarkdownError::Internal)
}
