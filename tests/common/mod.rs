//! In-process stand-ins for the browser and the upload tool.

#![allow(dead_code)]

use async_trait::async_trait;
use remarkdown::{
    BrowserBackend, BrowserSession, ConversionConfig, ConversionProgressCallback, LaunchOptions,
    PaginatorStage, PdfPageLayout, RemarkdownError, Uploader,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Browser ──────────────────────────────────────────────────────────────────

/// Fake browser: counts launches and logs every session call in order.
pub struct MockBrowser {
    pub launches: AtomicUsize,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub body_height: f64,
    pub fail_launch: bool,
}

impl MockBrowser {
    pub fn new(body_height: f64) -> Arc<Self> {
        Arc::new(Self {
            launches: AtomicUsize::new(0),
            calls: Arc::new(Mutex::new(Vec::new())),
            body_height,
            fail_launch: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            launches: AtomicUsize::new(0),
            calls: Arc::new(Mutex::new(Vec::new())),
            body_height: 0.0,
            fail_launch: true,
        })
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct MockSession {
    calls: Arc<Mutex<Vec<String>>>,
    body_height: f64,
}

impl MockSession {
    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl BrowserBackend for MockBrowser {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, RemarkdownError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(RemarkdownError::BrowserLaunchFailed {
                detail: "no chromium in test environment".into(),
            });
        }
        assert!(options.no_sandbox);
        self.calls.lock().unwrap().push("launch".into());
        Ok(Box::new(MockSession {
            calls: Arc::clone(&self.calls),
            body_height: self.body_height,
        }))
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn load_html(&mut self, html: &str) -> Result<(), RemarkdownError> {
        assert!(html.starts_with("<!DOCTYPE html>"));
        self.log("load");
        Ok(())
    }

    async fn inject_style(&mut self, _css: &str) -> Result<(), RemarkdownError> {
        self.log("inject_style");
        Ok(())
    }

    async fn emulate_print_media(&mut self) -> Result<(), RemarkdownError> {
        self.log("emulate_print");
        Ok(())
    }

    async fn measure_content_height(&mut self) -> Result<f64, RemarkdownError> {
        self.log("measure");
        Ok(self.body_height)
    }

    async fn print_pdf(&mut self, layout: &PdfPageLayout) -> Result<Vec<u8>, RemarkdownError> {
        assert!(layout.printable_height_px() >= f64::from(layout.content_height_px));
        self.log(format!("print:{}", layout.height_px));
        Ok(fake_pdf(layout))
    }

    async fn close(self: Box<Self>) -> Result<(), RemarkdownError> {
        self.log("close");
        Ok(())
    }
}

/// Bytes shaped like a one-page PDF with the layout's MediaBox (in points).
pub fn fake_pdf(layout: &PdfPageLayout) -> Vec<u8> {
    let width_pt = layout.width_mm / 25.4 * 72.0;
    let height_pt = f64::from(layout.height_px) * 0.75;
    format!(
        "%PDF-1.4\n1 0 obj << /Type /Page /MediaBox [0 0 {width_pt:.2} {height_pt:.2}] >> endobj\n%%EOF\n"
    )
    .into_bytes()
}

// ── Uploader ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    Ready,
    NotInstalled,
    NotAuthenticated,
}

/// One accepted upload: where the file was, whether it existed at that moment.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub path: PathBuf,
    pub folder: String,
    pub existed: bool,
    pub size: u64,
}

pub struct MockUploader {
    pub state: ToolState,
    pub reject_uploads: bool,
    pub listing: Vec<String>,
    pub folders_created: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<UploadRecord>>,
}

impl MockUploader {
    pub fn new(state: ToolState) -> Arc<Self> {
        Arc::new(Self {
            state,
            reject_uploads: false,
            listing: vec!["/Books".into(), "/LLM-Outputs".into()],
            folders_created: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            state: ToolState::Ready,
            reject_uploads: true,
            listing: Vec::new(),
            folders_created: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), RemarkdownError> {
        match self.state {
            ToolState::Ready => Ok(()),
            ToolState::NotInstalled => Err(RemarkdownError::ToolNotInstalled { tool: "rmapi".into() }),
            ToolState::NotAuthenticated => Err(RemarkdownError::ToolNotAuthenticated { tool: "rmapi".into() }),
        }
    }
}

#[async_trait]
impl Uploader for MockUploader {
    fn name(&self) -> &str {
        "rmapi"
    }

    async fn is_available(&self) -> bool {
        self.state != ToolState::NotInstalled
    }

    async fn ensure_ready(&self) -> Result<(), RemarkdownError> {
        self.check()
    }

    async fn ensure_folder(&self, folder: &str) -> Result<(), RemarkdownError> {
        self.check()?;
        self.folders_created.lock().unwrap().push(folder.to_string());
        Ok(())
    }

    async fn upload(&self, path: &Path, folder: &str) -> Result<(), RemarkdownError> {
        self.check()?;
        let meta = std::fs::metadata(path).ok();
        self.uploads.lock().unwrap().push(UploadRecord {
            path: path.to_path_buf(),
            folder: folder.to_string(),
            existed: meta.is_some(),
            size: meta.map(|m| m.len()).unwrap_or(0),
        });
        if self.reject_uploads {
            return Err(RemarkdownError::UploadRejected {
                folder: folder.to_string(),
                detail: "device storage full".into(),
            });
        }
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<String>, RemarkdownError> {
        self.check()?;
        Ok(self.listing.clone())
    }
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StageRecorder {
    pub stages: Mutex<Vec<PaginatorStage>>,
    pub errors: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for StageRecorder {
    fn on_stage(&self, stage: PaginatorStage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_error(&self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

// ── Config ───────────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=remarkdown=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Config wired to the mocks, with temp files under `work_dir`.
pub fn mock_config(work_dir: &Path, browser: Arc<MockBrowser>, uploader: Arc<MockUploader>) -> ConversionConfig {
    init_tracing();
    ConversionConfig::builder()
        .work_dir(work_dir)
        .settle_delay_ms(0)
        .browser(browser)
        .uploader(uploader)
        .build()
        .expect("test config is valid")
}

/// Number of entries directly under `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
