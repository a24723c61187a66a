//! Backend detection and selection.
//!
//! The registry probes candidates in the platform's priority order and
//! memoizes the first usable one for the lifetime of the process. Nothing is
//! re-probed unless [`BackendRegistry::invalidate`] is called, so selection is
//! stable even if the user installs or removes an office suite mid-session.

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::{ActiveBackend, Backend, BackendProbe, HostPlatform, SystemProbe};
use crate::error::ConvertError;

/// Detects installed converter backends and picks the active one.
pub struct BackendRegistry {
    platform: HostPlatform,
    probe: Arc<dyn BackendProbe>,
    active: Mutex<Option<ActiveBackend>>,
}

impl BackendRegistry {
    pub fn new(platform: HostPlatform, probe: Arc<dyn BackendProbe>) -> Self {
        Self {
            platform,
            probe,
            active: Mutex::new(None),
        }
    }

    /// Registry for the real host.
    pub fn system() -> Self {
        Self::new(HostPlatform::current(), Arc::new(SystemProbe::new()))
    }

    pub fn platform(&self) -> HostPlatform {
        self.platform
    }

    /// Every usable backend, highest priority first.
    pub fn list_available(&self) -> Vec<ActiveBackend> {
        self.platform
            .candidates()
            .iter()
            .filter_map(|&backend| self.probe.probe(backend))
            .collect()
    }

    /// The highest-priority usable backend, memoized.
    ///
    /// # Errors
    /// [`ConvertError::BackendUnavailable`] when no candidate is usable; the
    /// message names what the user can install on this platform.
    pub fn active_backend(&self) -> Result<ActiveBackend, ConvertError> {
        let mut guard = self
            .active
            .lock()
            .map_err(|_| ConvertError::Internal("backend registry lock poisoned".into()))?;

        if let Some(ref active) = *guard {
            return Ok(active.clone());
        }

        let Some(first) = self.list_available().into_iter().next() else {
            warn!(platform = self.platform.name(), "No converter backend found");
            return Err(ConvertError::BackendUnavailable {
                message: self.install_message(),
            });
        };

        info!(backend = %first.backend, location = ?first.location, "Selected converter backend");
        *guard = Some(first.clone());
        Ok(first)
    }

    /// Forget the memoized backend so the next call re-probes.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.active.lock() {
            *guard = None;
        }
    }

    pub fn install_message(&self) -> String {
        self.platform.install_message()
    }

    pub fn display_name(backend: Backend) -> &'static str {
        backend.display_name()
    }
}
