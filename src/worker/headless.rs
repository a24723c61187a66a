//! LibreOffice / ONLYOFFICE through their headless `--convert-to pdf` mode.
//!
//! These programs only accept an output *directory* and name the PDF after
//! the input's stem, so each call converts into a private scratch directory
//! and then moves `<stem>.pdf` to the exact path the caller asked for.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{absolute, SlideConverter};
use crate::backend::{ActiveBackend, Backend};
use crate::cancel::CancelToken;
use crate::error::ConvertError;
use crate::supervisor::ProcessSupervisor;

pub struct HeadlessConverter {
    active: ActiveBackend,
    supervisor: ProcessSupervisor,
}

impl HeadlessConverter {
    pub fn new(active: ActiveBackend, supervisor: ProcessSupervisor) -> Self {
        Self { active, supervisor }
    }

    fn executable(&self) -> Result<&Path, ConvertError> {
        let backend = self.active.backend;
        match self.active.location.as_deref() {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(ConvertError::ExecutableNotFound { backend }),
        }
    }
}

/// Command line for one headless conversion.
///
/// LibreOffice gets its own user profile under `scratch` because two
/// `soffice` processes sharing the default profile block on its lock file.
pub fn headless_command(
    backend: Backend,
    program: &Path,
    input: &Path,
    outdir: &Path,
    scratch: &Path,
) -> Vec<OsString> {
    let mut argv: Vec<OsString> = vec![program.into()];
    if backend == Backend::LibreOffice {
        let profile = scratch.join("profile");
        argv.push(format!("-env:UserInstallation={}", file_url(&profile)).into());
    }
    argv.push("--headless".into());
    if backend == Backend::LibreOffice {
        argv.push("--invisible".into());
    }
    argv.extend(["--convert-to", "pdf", "--outdir"].map(OsString::from));
    argv.push(outdir.into());
    argv.push(input.into());
    argv
}

/// `file:///...` URL for an absolute path, as LibreOffice expects.
fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

/// Move `from` to `to`, copying when a rename crosses filesystems.
pub(crate) async fn move_file(from: &Path, to: &Path) -> Result<(), ConvertError> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConvertError::io(parent, e))?;
        }
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| ConvertError::io(to, e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| ConvertError::io(from, e))
}

fn expected_pdf(outdir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    outdir.join(format!("{stem}.pdf"))
}

#[async_trait]
impl SlideConverter for HeadlessConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        let backend = self.active.backend;
        let program = self.executable()?;
        let input = absolute(input)?;
        let output = absolute(output)?;

        let scratch = tempfile::Builder::new()
            .prefix("deck2pdf-headless-")
            .tempdir()
            .map_err(|e| ConvertError::io(std::env::temp_dir(), e))?;
        let outdir = scratch.path().join("out");
        std::fs::create_dir_all(&outdir).map_err(|e| ConvertError::io(&outdir, e))?;

        let argv = headless_command(backend, program, &input, &outdir, scratch.path());
        info!(backend = %backend, input = %input.display(), "Converting headless");

        let result = self
            .supervisor
            .run_cancellable_command(&argv, self.supervisor.timeout(), cancel)
            .await?;

        if !result.success() {
            return Err(ConvertError::ExecutionFailed {
                backend,
                detail: result.diagnostic(),
            });
        }

        let produced = expected_pdf(&outdir, &input);
        if !produced.is_file() {
            debug!(stdout = %result.stdout.trim(), "No PDF in scratch directory");
            return Err(ConvertError::NoOutput { backend, input });
        }
        move_file(&produced, &output).await
    }
}
