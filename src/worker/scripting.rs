//! Keynote through AppleScript (`osascript -e`).

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tracing::info;

use super::{absolute, SlideConverter};
use crate::backend::{Backend, HostPlatform};
use crate::cancel::CancelToken;
use crate::error::ConvertError;
use crate::supervisor::ProcessSupervisor;

pub struct ScriptingConverter {
    backend: Backend,
    supervisor: ProcessSupervisor,
    platform: HostPlatform,
}

impl ScriptingConverter {
    pub fn new(backend: Backend, supervisor: ProcessSupervisor) -> Self {
        Self {
            backend,
            supervisor,
            platform: HostPlatform::current(),
        }
    }
}

/// AppleScript string literal body: backslashes and quotes escaped.
fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Script that opens `input` in Keynote, exports it, and closes it unsaved.
pub fn keynote_script(input: &Path, output: &Path) -> String {
    let input = applescript_escape(&input.to_string_lossy());
    let output = applescript_escape(&output.to_string_lossy());
    [
        "tell application \"Keynote\"".to_string(),
        "activate".to_string(),
        format!("set inFile to POSIX file \"{input}\""),
        "set theDoc to open inFile".to_string(),
        format!("export theDoc to POSIX file \"{output}\" as PDF"),
        "close theDoc saving no".to_string(),
        "end tell".to_string(),
    ]
    .join("\n")
}

#[async_trait]
impl SlideConverter for ScriptingConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        if self.platform != HostPlatform::MacOs {
            return Err(ConvertError::UnsupportedPlatform {
                backend: self.backend,
                supported: HostPlatform::MacOs.name(),
            });
        }

        let input = absolute(input)?;
        let output = absolute(output)?;
        info!(backend = %self.backend, input = %input.display(), "Exporting via AppleScript");

        let argv: Vec<OsString> = vec![
            "osascript".into(),
            "-e".into(),
            keynote_script(&input, &output).into(),
        ];
        let result = self
            .supervisor
            .run_cancellable_command(&argv, self.supervisor.timeout(), cancel)
            .await?;

        if !result.success() {
            return Err(ConvertError::ExecutionFailed {
                backend: self.backend,
                detail: result.diagnostic(),
            });
        }
        if !output.is_file() {
            return Err(ConvertError::NoOutput {
                backend: self.backend,
                input,
            });
        }
        Ok(())
    }
}
