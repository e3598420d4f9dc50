//! Upload collaborator: hands finished PDFs to the device.
//!
//! The pipeline only needs four opaque operations, captured by [`Uploader`]:
//! readiness check, idempotent folder creation, file upload and folder
//! listing. [`RmapiUploader`] implements them by running the `rmapi` command
//! line tool; tests substitute an in-process fake.
//!
//! Arguments are passed to the child process directly, never through a
//! shell, so names and folders cannot inject commands.

use crate::error::RemarkdownError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// External tool that stores PDFs on the device.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Short name used in messages, e.g. `rmapi`.
    fn name(&self) -> &str;

    /// `true` when the tool can be executed at all.
    async fn is_available(&self) -> bool;

    /// Succeeds only when the tool is installed *and* authenticated.
    async fn ensure_ready(&self) -> Result<(), RemarkdownError>;

    /// Create `folder` if it does not exist. An existing folder is not an error.
    async fn ensure_folder(&self, folder: &str) -> Result<(), RemarkdownError>;

    /// Upload the local file at `path` into `folder`.
    async fn upload(&self, path: &Path, folder: &str) -> Result<(), RemarkdownError>;

    /// Every folder on the device, as absolute paths.
    async fn list_folders(&self) -> Result<Vec<String>, RemarkdownError>;
}

/// Normalise a device folder: absolute, no `..`, no trailing slash (except `/`).
///
/// Relative names are taken from the device root, so `Notes` becomes `/Notes`.
pub fn normalize_folder(raw: &str) -> Result<String, RemarkdownError> {
    let folder = raw.trim();
    let invalid = || RemarkdownError::InvalidFolder {
        folder: raw.to_string(),
    };
    if folder.is_empty() || folder.chars().any(char::is_control) {
        return Err(invalid());
    }
    let folder = if folder.starts_with('/') {
        folder.to_string()
    } else {
        format!("/{folder}")
    };
    if folder.split('/').any(|segment| segment == "..") {
        return Err(invalid());
    }
    let trimmed = folder.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Extract directory entries from `rmapi ls -r` output.
///
/// Directory lines carry a `[d]` marker, either before or after the name
/// depending on the rmapi version. Returned paths are absolute, sorted, and
/// free of duplicates.
pub fn parse_folder_listing(output: &str) -> Vec<String> {
    let mut folders: Vec<String> = output
        .lines()
        .filter(|line| line.contains("[d]"))
        .filter_map(|line| {
            let name = line.replace("[d]", "");
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            if name.starts_with('/') {
                Some(name.to_string())
            } else {
                Some(format!("/{name}"))
            }
        })
        .collect();
    folders.sort();
    folders.dedup();
    folders
}

/// [`Uploader`] backed by the `rmapi` CLI.
#[derive(Debug, Clone)]
pub struct RmapiUploader {
    binary: String,
}

/// Captured result of one rmapi invocation.
struct ToolOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl ToolOutput {
    /// Whatever the tool said, stderr first.
    fn message(&self) -> String {
        let msg = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        if msg.is_empty() {
            "no output".to_string()
        } else {
            msg.to_string()
        }
    }
}

impl RmapiUploader {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<ToolOutput, RemarkdownError> {
        debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => RemarkdownError::ToolNotInstalled {
                    tool: self.binary.clone(),
                },
                _ => RemarkdownError::ToolFailed {
                    tool: self.binary.clone(),
                    command: args.join(" "),
                    detail: e.to_string(),
                },
            })?;
        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Default for RmapiUploader {
    fn default() -> Self {
        Self::new("rmapi")
    }
}

#[async_trait]
impl Uploader for RmapiUploader {
    fn name(&self) -> &str {
        &self.binary
    }

    async fn is_available(&self) -> bool {
        matches!(self.run(&["version"]).await, Ok(out) if out.success)
    }

    async fn ensure_ready(&self) -> Result<(), RemarkdownError> {
        let version = self.run(&["version"]).await?;
        if !version.success {
            warn!("{} version failed: {}", self.binary, version.message());
            return Err(RemarkdownError::ToolNotInstalled {
                tool: self.binary.clone(),
            });
        }
        let ls = self.run(&["ls"]).await?;
        if !ls.success {
            warn!("{} ls failed: {}", self.binary, ls.message());
            return Err(RemarkdownError::ToolNotAuthenticated {
                tool: self.binary.clone(),
            });
        }
        Ok(())
    }

    async fn ensure_folder(&self, folder: &str) -> Result<(), RemarkdownError> {
        let folder = normalize_folder(folder)?;
        if folder == "/" {
            return Ok(());
        }
        let out = self.run(&["mkdir", &folder]).await?;
        if out.success {
            debug!("Created folder {}", folder);
            return Ok(());
        }
        let message = out.message();
        if message.to_ascii_lowercase().contains("exist") {
            debug!("Folder {} already exists", folder);
            return Ok(());
        }
        Err(RemarkdownError::UploadRejected {
            folder,
            detail: message,
        })
    }

    async fn upload(&self, path: &Path, folder: &str) -> Result<(), RemarkdownError> {
        let folder = normalize_folder(folder)?;
        let target = if folder == "/" {
            folder.clone()
        } else {
            format!("{folder}/")
        };
        let local = path.to_string_lossy();
        let out = self.run(&["put", &local, &target]).await?;
        if !out.success {
            return Err(RemarkdownError::UploadRejected {
                folder,
                detail: out.message(),
            });
        }
        info!("Uploaded {} to {}", path.display(), folder);
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<String>, RemarkdownError> {
        let out = self.run(&["ls", "-r"]).await?;
        if !out.success {
            return Err(RemarkdownError::ToolFailed {
                tool: self.binary.clone(),
                command: "ls -r".into(),
                detail: out.message(),
            });
        }
        Ok(parse_folder_listing(&out.stdout))
    }
}
