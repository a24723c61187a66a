//! PowerPoint / WPS through COM automation, always out of process.
//!
//! The routine is a short PowerShell script. PowerShell hosts the COM client,
//! so killing that one process is enough to abandon a hung export. The script
//! closes the deck and quits the application in a `finally` block whether the
//! export succeeded or not, then prints its [`WorkerReport`](crate::supervisor::WorkerReport) line.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tracing::info;

use super::{absolute, SlideConverter};
use crate::backend::{Backend, HostPlatform};
use crate::cancel::CancelToken;
use crate::error::ConvertError;
use crate::supervisor::{IsolatedRoutine, ProcessSupervisor, RESULT_MARKER};

const WPS_FALLBACK_MESSAGE: &str = "WPS Office detected but automated PDF export failed. \
Please install PowerPoint or LibreOffice for reliable automation.";

/// PowerShell routine that exports one deck through a COM application.
#[derive(Debug, Clone)]
pub struct ComExportRoutine {
    backend: Backend,
}

impl ComExportRoutine {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// The PowerShell source for this backend.
    pub fn script(&self, input: &Path, output: &Path) -> String {
        let input = ps_quote(&input.to_string_lossy());
        let output = ps_quote(&output.to_string_lossy());

        // ppSaveAsPDF = 32, ppFixedFormatTypePDF = 2
        let (prog_id, open, export) = match self.backend {
            Backend::Wps => (
                "KWPP.Application",
                format!("$deck = $app.Presentations.Open({input}, $false, $false, $false)"),
                format!(
                    "if ($deck.PSObject.Methods.Name -contains 'ExportAsFixedFormat') \
                     {{ $deck.ExportAsFixedFormat({output}, 2) }} else {{ $deck.SaveAs({output}, 32) }}"
                ),
            ),
            _ => (
                "PowerPoint.Application",
                format!("$deck = $app.Presentations.Open({input}, $true, $false, $false)"),
                format!("$deck.SaveAs({output}, 32)"),
            ),
        };

        format!(
            "$ErrorActionPreference = 'Stop'\n\
             $app = $null\n\
             $deck = $null\n\
             try {{\n\
             \x20 try {{\n\
             \x20   $app = New-Object -ComObject '{prog_id}'\n\
             \x20   {open}\n\
             \x20   {export}\n\
             \x20 }} finally {{\n\
             \x20   if ($deck) {{ $deck.Close() }}\n\
             \x20   if ($app) {{ $app.Quit() }}\n\
             \x20 }}\n\
             \x20 Write-Output '{marker}{{\"error\":null}}'\n\
             }} catch {{\n\
             \x20 $msg = $_.Exception.Message\n\
             \x20 Write-Output ('{marker}' + (@{{ error = $msg }} | ConvertTo-Json -Compress))\n\
             \x20 exit 1\n\
             }}\n",
            marker = RESULT_MARKER,
        )
    }
}

impl IsolatedRoutine for ComExportRoutine {
    fn name(&self) -> &str {
        match self.backend {
            Backend::Wps => "wps-com-export",
            _ => "powerpoint-com-export",
        }
    }

    fn command_line(&self, input: &Path, output: &Path) -> Vec<OsString> {
        [
            "powershell",
            "-NoProfile",
            "-NonInteractive",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
        ]
        .into_iter()
        .map(OsString::from)
        .chain(std::iter::once(OsString::from(self.script(input, output))))
        .collect()
    }
}

/// Single-quoted PowerShell string literal.
fn ps_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Adapter for native-automation backends.
pub struct AutomationConverter {
    backend: Backend,
    routine: ComExportRoutine,
    supervisor: ProcessSupervisor,
    platform: HostPlatform,
}

impl AutomationConverter {
    pub fn new(backend: Backend, supervisor: ProcessSupervisor) -> Self {
        Self {
            backend,
            routine: ComExportRoutine::new(backend),
            supervisor,
            platform: HostPlatform::current(),
        }
    }
}

#[async_trait]
impl SlideConverter for AutomationConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        if self.platform != HostPlatform::Windows {
            return Err(ConvertError::UnsupportedPlatform {
                backend: self.backend,
                supported: HostPlatform::Windows.name(),
            });
        }

        let input = absolute(input)?;
        let output = absolute(output)?;
        info!(backend = %self.backend, input = %input.display(), "Exporting via COM automation");

        let result = self
            .supervisor
            .run_cancellable_worker(&self.routine, &input, &output, cancel)
            .await;

        match result {
            Err(e) if self.backend == Backend::Wps && !e.is_cancelled() => {
                Err(ConvertError::ExecutionFailed {
                    backend: self.backend,
                    detail: format!("{WPS_FALLBACK_MESSAGE} ({e})"),
                })
            }
            other => other,
        }
    }
}
