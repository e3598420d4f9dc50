//! CLI binary for remarkdown.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and runs one of three commands.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use remarkdown::{
    convert_and_upload, convert_to_bytes, convert_to_file, render_preview, server, ConversionConfig,
    ConversionProgressCallback, ConversionRequest, PaginatorStage,
};
use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the Paginator through its stages.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.set_message("markdown → HTML");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_rendered(&self, html_len: usize) {
        self.bar.println(format!(
            "  {} HTML ready  {}",
            green("✓"),
            dim(&format!("{html_len} bytes"))
        ));
    }

    fn on_stage(&self, stage: PaginatorStage) {
        let prefix = match stage {
            PaginatorStage::PdfWritten | PaginatorStage::BrowserClosed => "Finishing",
            _ => "Paginating",
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(stage.to_string());
    }

    fn on_pdf_complete(&self, byte_size: u64, height_px: u32) {
        self.bar.println(format!(
            "  {} PDF written  {}",
            green("✓"),
            dim(&format!("{byte_size} bytes, {height_px}px tall"))
        ));
        self.bar.set_prefix("Uploading");
        self.bar.set_message("");
    }

    fn on_uploaded(&self, folder: &str, filename: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {} → {}", green("✔"), bold(filename), folder);
    }

    fn on_error(&self, error: &str) {
        self.bar.finish_and_clear();
        let headline = error.lines().next().unwrap_or(error);
        eprintln!("{} {}", red("✘"), headline);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 3000
  remarkdown serve

  # Preview the HTML for a file
  remarkdown render notes.md -o notes.html

  # Make a PDF from stdin
  pbpaste | remarkdown pdf - -o answer.pdf

  # Make a PDF and send it to the tablet
  remarkdown pdf notes.md --upload --folder /Notes

ENVIRONMENT VARIABLES:
  PORT                    Port for `serve` (default 3000)
  REMARKDOWN_CHROME       Chromium/Chrome executable (auto-detected otherwise)
  REMARKDOWN_RMAPI        rmapi executable (default: rmapi on PATH)
  REMARKDOWN_FOLDER       Default device folder (default /LLM-Outputs)
  RUST_LOG                Log filter, e.g. remarkdown=debug

SETUP:
  1. Install Chromium or Google Chrome.
  2. Install rmapi and run it once to pair with your reMarkable account.
"#;

#[derive(Parser, Debug)]
#[command(
    name = "remarkdown",
    version,
    about = "Render Markdown to a continuous-scroll PDF and send it to a reMarkable",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Directory for per-request temp files.
    #[arg(long, global = true, env = "REMARKDOWN_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Wait after style reapplication before measuring, in milliseconds.
    #[arg(long, global = true, env = "REMARKDOWN_SETTLE_MS", default_value_t = 200)]
    settle_ms: u64,

    /// Page-load timeout in seconds.
    #[arg(long, global = true, env = "REMARKDOWN_LOAD_TIMEOUT", default_value_t = 30)]
    load_timeout: u64,

    /// Chromium/Chrome executable.
    #[arg(long, global = true, env = "REMARKDOWN_CHROME")]
    chrome: Option<PathBuf>,

    /// rmapi executable.
    #[arg(long, global = true, env = "REMARKDOWN_RMAPI", default_value = "rmapi")]
    rmapi: String,

    /// Default device folder.
    #[arg(long, global = true, env = "REMARKDOWN_FOLDER", default_value = "/LLM-Outputs")]
    folder: String,

    /// Hide the progress spinner.
    #[arg(long, global = true, env = "REMARKDOWN_NO_PROGRESS")]
    no_progress: bool,

    #[arg(short, long, global = true, env = "REMARKDOWN_VERBOSE")]
    verbose: bool,

    #[arg(short, long, global = true, env = "REMARKDOWN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        #[arg(short, long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },

    /// Write the rendered HTML document.
    Render {
        /// Markdown file, or `-` for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Output file. Default: stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Make a PDF, optionally uploading it.
    Pdf {
        /// Markdown file, or `-` for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Output file. Default: `{name}-{timestamp}.pdf` in the current directory.
        #[arg(short, long, conflicts_with = "upload")]
        output: Option<PathBuf>,

        /// Document name. Default: the input file's stem.
        #[arg(short, long)]
        name: Option<String>,

        /// Upload to the device instead of keeping a local file.
        #[arg(long)]
        upload: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; keep library logs quiet
    // under it unless asked for.
    let is_server = matches!(cli.command, Command::Serve { .. });
    let show_progress = !is_server && !common.quiet && !common.no_progress;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(common, progress.clone())?;

    match cli.command {
        Command::Serve { host, port } => {
            let addr = SocketAddr::new(host, port);
            server::serve(config, addr).await.context("Server failed")?;
        }

        Command::Render { input, output } => {
            let request = read_request(&input, None)?;
            let html = render_preview(&request).context("Failed to render markdown")?;
            if let Some(ref bar) = progress {
                bar.bar.finish_and_clear();
            }
            match output {
                Some(path) => {
                    std::fs::write(&path, html)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if !common.quiet {
                        eprintln!("{} {}", green("✔"), path.display());
                    }
                }
                None => print!("{html}"),
            }
        }

        Command::Pdf {
            input,
            output,
            name,
            upload,
        } => {
            let request = read_request(&input, name.as_deref())?;
            if upload {
                let receipt = convert_and_upload(&request, Some(common.folder.as_str()), &config)
                    .await
                    .context("Conversion or upload failed")?;
                if progress.is_none() && !common.quiet {
                    eprintln!("{}", receipt.message);
                }
            } else {
                let written = match output {
                    Some(path) => {
                        convert_to_file(&request, &path, &config)
                            .await
                            .context("Conversion failed")?;
                        path
                    }
                    None => {
                        let pdf = convert_to_bytes(&request, &config).await.context("Conversion failed")?;
                        let path = PathBuf::from(&pdf.filename);
                        std::fs::write(&path, &pdf.bytes)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        path
                    }
                };
                if let Some(ref bar) = progress {
                    bar.bar.finish_and_clear();
                }
                if !common.quiet {
                    eprintln!("{} {}", green("✔"), bold(&written.display().to_string()));
                }
            }
        }
    }

    Ok(())
}

fn build_config(common: &CommonArgs, progress: Option<Arc<CliProgressCallback>>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .settle_delay_ms(common.settle_ms)
        .load_timeout_secs(common.load_timeout)
        .rmapi_binary(common.rmapi.clone())
        .default_folder(common.folder.clone());

    if let Some(ref dir) = common.work_dir {
        builder = builder.work_dir(dir.clone());
    }
    if let Some(ref chrome) = common.chrome {
        builder = builder.chrome_executable(chrome.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read markdown from a file or stdin; the title defaults to the file stem.
fn read_request(input: &str, name: Option<&str>) -> Result<ConversionRequest> {
    let markdown = if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read markdown from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))?
    };

    let title = match name {
        Some(n) => n.to_string(),
        None if input != "-" => Path::new(input)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        None => String::new(),
    };
    Ok(ConversionRequest::new(markdown, title))
}
