//! Per-backend adapters that turn one presentation into one PDF.
//!
//! Each [`BackendKind`] has exactly one adapter:
//!
//! - [`automation::AutomationConverter`] — COM automation in an isolated process
//! - [`headless::HeadlessConverter`]     — `--headless --convert-to pdf` CLIs
//! - [`scripting::ScriptingConverter`]   — AppleScript via `osascript`
//!
//! [`ConversionWorker`] picks the adapter once, from the registry's active
//! backend, and every later call goes straight to it. Nothing else in the
//! crate branches on which backend is installed.

pub mod automation;
pub mod headless;
pub mod scripting;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::backend::{ActiveBackend, BackendKind, BackendRegistry};
use crate::cancel::CancelToken;
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::supervisor::ProcessSupervisor;

/// Converts one presentation file to one PDF at an exact path.
#[async_trait]
pub trait SlideConverter: Send + Sync {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError>;
}

/// Build the adapter for a backend. The only place that looks at the kind.
pub fn adapter_for(
    active: ActiveBackend,
    supervisor: ProcessSupervisor,
) -> Arc<dyn SlideConverter> {
    match active.backend.kind() {
        BackendKind::NativeAutomation => {
            Arc::new(automation::AutomationConverter::new(active.backend, supervisor))
        }
        BackendKind::HeadlessCli => Arc::new(headless::HeadlessConverter::new(active, supervisor)),
        BackendKind::ScriptingApp => {
            Arc::new(scripting::ScriptingConverter::new(active.backend, supervisor))
        }
    }
}

/// Converter bound to whichever backend the registry selects.
///
/// The registry is consulted lazily on first use, so constructing a worker on
/// a host with no office suite succeeds and the error surfaces per task.
pub struct ConversionWorker {
    registry: Arc<BackendRegistry>,
    supervisor: ProcessSupervisor,
    adapter: OnceCell<Arc<dyn SlideConverter>>,
}

impl ConversionWorker {
    pub fn new(registry: Arc<BackendRegistry>, config: &ConverterConfig) -> Self {
        Self {
            registry,
            supervisor: ProcessSupervisor::new(config),
            adapter: OnceCell::new(),
        }
    }

    async fn adapter(&self) -> Result<&Arc<dyn SlideConverter>, ConvertError> {
        self.adapter
            .get_or_try_init(|| async {
                // Probing may spawn helper processes and block on them.
                let registry = Arc::clone(&self.registry);
                let active = tokio::task::spawn_blocking(move || registry.active_backend())
                    .await
                    .map_err(|e| ConvertError::Internal(format!("Backend probe panicked: {e}")))??;
                debug!(backend = %active.backend, "Binding conversion adapter");
                Ok(adapter_for(active, self.supervisor.clone()))
            })
            .await
    }
}

#[async_trait]
impl SlideConverter for ConversionWorker {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        let adapter = self.adapter().await?;
        adapter.convert(input, output, cancel).await
    }
}

/// Absolute form of `path`, for handing to external programs whose working
/// directory differs from ours.
pub(crate) fn absolute(path: &Path) -> Result<std::path::PathBuf, ConvertError> {
    std::path::absolute(path).map_err(|e| ConvertError::io(path, e))
}
