//! Configuration for rendering, pagination and upload.
//!
//! Every knob lives in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The service builds one config at startup and
//! shares it with every request handler; nothing in the pipeline reads
//! ambient globals or environment variables on its own.

use crate::browser::{mm_to_px, BrowserBackend, ChromiumBackend, LaunchOptions};
use crate::error::RemarkdownError;
use crate::progress::ProgressCallback;
use crate::upload::{normalize_folder, RmapiUploader, Uploader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a markdown → PDF conversion.
///
/// # Example
/// ```rust
/// use remarkdown::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .settle_delay_ms(300)
///     .load_timeout_secs(20)
///     .default_folder("/Notes")
///     .build()
///     .unwrap();
/// assert_eq!(config.default_folder, "/Notes");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root directory for per-request temp directories. Default: system temp dir.
    pub work_dir: PathBuf,

    /// Document name used when a request carries none. Default: `llm-output`.
    pub default_document_name: String,

    /// Device folder used when a request carries none. Default: `/LLM-Outputs`.
    pub default_folder: String,

    /// Wait after style injection and print emulation before measuring. Default: 200.
    ///
    /// Layout does not expose a "stable" signal over CDP; a short fixed wait is
    /// what keeps the measured height in step with the colours that get printed.
    pub settle_delay_ms: u64,

    /// Upper bound on waiting for the page to report load-complete. Default: 30.
    pub load_timeout_secs: u64,

    /// PDF page width in millimetres. Default: 210 (A4).
    pub page_width_mm: f64,

    /// PDF page margins. Default: 10 mm top/bottom, 15 mm left/right.
    pub margins: PageMargins,

    /// Browser viewport used for layout. Default: 680×1123 @ 2×.
    ///
    /// Only the height and scale are taken from here; the width at launch is
    /// always [`ConversionConfig::layout_width_px`], so the document is measured
    /// at the same width it is printed at.
    pub viewport: ViewportSize,

    /// Explicit browser executable. `None` lets the backend auto-detect.
    pub chrome_executable: Option<PathBuf>,

    /// Launch the browser with its sandbox disabled. Default: true.
    pub no_sandbox: bool,

    /// Extra command-line switches passed to the browser.
    pub extra_browser_args: Vec<String>,

    /// Upload collaborator command. Default: `rmapi`.
    pub rmapi_binary: String,

    /// Maximum accepted HTTP request body. Default: 10 MiB.
    pub max_body_bytes: usize,

    /// Pre-constructed browser backend. Takes precedence over the Chromium default.
    pub browser: Option<Arc<dyn BrowserBackend>>,

    /// Pre-constructed uploader. Takes precedence over `rmapi_binary`.
    pub uploader: Option<Arc<dyn Uploader>>,

    /// Optional observer of pipeline events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            default_document_name: "llm-output".to_string(),
            default_folder: "/LLM-Outputs".to_string(),
            settle_delay_ms: 200,
            load_timeout_secs: 30,
            page_width_mm: 210.0,
            margins: PageMargins::default(),
            viewport: ViewportSize::default(),
            chrome_executable: None,
            no_sandbox: true,
            extra_browser_args: vec![
                "--disable-setuid-sandbox".to_string(),
                "--force-color-profile=srgb".to_string(),
            ],
            rmapi_binary: "rmapi".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            browser: None,
            uploader: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("work_dir", &self.work_dir)
            .field("default_document_name", &self.default_document_name)
            .field("default_folder", &self.default_folder)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("load_timeout_secs", &self.load_timeout_secs)
            .field("page_width_mm", &self.page_width_mm)
            .field("margins", &self.margins)
            .field("viewport", &self.viewport)
            .field("chrome_executable", &self.chrome_executable)
            .field("no_sandbox", &self.no_sandbox)
            .field("rmapi_binary", &self.rmapi_binary)
            .field("browser", &self.browser.as_ref().map(|_| "<dyn BrowserBackend>"))
            .field("uploader", &self.uploader.as_ref().map(|_| "<dyn Uploader>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// The browser backend to launch sessions from.
    pub fn resolve_browser(&self) -> Arc<dyn BrowserBackend> {
        match self.browser {
            Some(ref backend) => Arc::clone(backend),
            None => Arc::new(ChromiumBackend),
        }
    }

    /// The upload collaborator.
    pub fn resolve_uploader(&self) -> Arc<dyn Uploader> {
        match self.uploader {
            Some(ref uploader) => Arc::clone(uploader),
            None => Arc::new(RmapiUploader::new(self.rmapi_binary.clone())),
        }
    }

    /// Printable page width in whole CSS pixels, rounded down.
    pub fn layout_width_px(&self) -> u32 {
        let printable_mm = self.page_width_mm - self.margins.left_mm - self.margins.right_mm;
        (mm_to_px(printable_mm).floor() as u32).max(1)
    }

    /// Browser launch parameters derived from this config.
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            executable: self.chrome_executable.clone(),
            viewport: ViewportSize {
                width: self.layout_width_px(),
                ..self.viewport
            },
            no_sandbox: self.no_sandbox,
            args: self.extra_browser_args.clone(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn default_document_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_document_name = name.into();
        self
    }

    pub fn default_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.default_folder = folder.into();
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms.min(10_000);
        self
    }

    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.load_timeout_secs = secs.max(1);
        self
    }

    pub fn page_width_mm(mut self, mm: f64) -> Self {
        self.config.page_width_mm = mm;
        self
    }

    pub fn margins(mut self, margins: PageMargins) -> Self {
        self.config.margins = margins;
        self
    }

    pub fn viewport(mut self, viewport: ViewportSize) -> Self {
        self.config.viewport = viewport;
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    pub fn no_sandbox(mut self, v: bool) -> Self {
        self.config.no_sandbox = v;
        self
    }

    pub fn browser_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_browser_args.push(arg.into());
        self
    }

    pub fn rmapi_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.rmapi_binary = bin.into();
        self
    }

    pub fn max_body_bytes(mut self, n: usize) -> Self {
        self.config.max_body_bytes = n;
        self
    }

    pub fn browser(mut self, backend: Arc<dyn BrowserBackend>) -> Self {
        self.config.browser = Some(backend);
        self
    }

    pub fn uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.config.uploader = Some(uploader);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, RemarkdownError> {
        let c = &self.config;
        if !(50.0..=1000.0).contains(&c.page_width_mm) {
            return Err(RemarkdownError::InvalidConfig(format!(
                "Page width must be 50–1000 mm, got {}",
                c.page_width_mm
            )));
        }
        c.margins.validate(c.page_width_mm)?;
        c.viewport.validate()?;
        if c.default_document_name.trim().is_empty() {
            return Err(RemarkdownError::InvalidConfig(
                "Default document name must not be empty".into(),
            ));
        }

        if c.rmapi_binary.trim().is_empty() {
            return Err(RemarkdownError::InvalidConfig(
                "rmapi binary must not be empty".into(),
            ));
        }
        if c.max_body_bytes < 1024 {
            return Err(RemarkdownError::InvalidConfig(format!(
                "Body limit must be ≥ 1024 bytes, got {}",
                c.max_body_bytes
            )));
        }
        let mut config = self.config;
        config.default_folder = normalize_folder(&config.default_folder).map_err(|_| {
            RemarkdownError::InvalidConfig(format!("Invalid default folder '{}'", config.default_folder))
        })?;
        Ok(config)
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    pub top_mm: f64,
    pub bottom_mm: f64,
    pub left_mm: f64,
    pub right_mm: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            top_mm: 10.0,
            bottom_mm: 10.0,
            left_mm: 15.0,
            right_mm: 15.0,
        }
    }
}

impl PageMargins {
    /// Same margin on every side.
    pub fn uniform(mm: f64) -> Self {
        Self {
            top_mm: mm,
            bottom_mm: mm,
            left_mm: mm,
            right_mm: mm,
        }
    }

    fn validate(&self, page_width_mm: f64) -> Result<(), RemarkdownError> {
        for (side, v) in [
            ("top", self.top_mm),
            ("bottom", self.bottom_mm),
            ("left", self.left_mm),
            ("right", self.right_mm),
        ] {
            if !(0.0..=50.0).contains(&v) {
                return Err(RemarkdownError::InvalidConfig(format!(
                    "{side} margin must be 0–50 mm, got {v}"
                )));
            }
        }
        if self.left_mm + self.right_mm >= page_width_mm {
            return Err(RemarkdownError::InvalidConfig(
                "Horizontal margins leave no printable width".into(),
            ));
        }
        Ok(())
    }
}

/// Layout viewport of the off-screen page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for ViewportSize {
    /// A4 printable width at 96 dpi, rendered at 2× for crisp text.
    fn default() -> Self {
        Self {
            width: 680,
            height: 1123,
            device_scale_factor: 2.0,
        }
    }
}

impl ViewportSize {
    fn validate(&self) -> Result<(), RemarkdownError> {
        if self.width == 0 || self.height == 0 {
            return Err(RemarkdownError::InvalidConfig(
                "Viewport must be non-empty".into(),
            ));
        }
        if !(self.device_scale_factor > 0.0 && self.device_scale_factor <= 4.0) {
            return Err(RemarkdownError::InvalidConfig(format!(
                "Device scale factor must be in (0, 4], got {}",
                self.device_scale_factor
            )));
        }
        Ok(())
    }
}
