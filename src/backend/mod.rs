//! Converter backends: what can turn a presentation into a PDF on this host.
//!
//! Exactly one backend is active per process. The five known backends fall
//! into three kinds, and everything downstream (probing, adapters) is chosen
//! by [`BackendKind`] rather than by the individual backend:
//!
//! | Backend      | Kind               | Platforms            |
//! |--------------|--------------------|----------------------|
//! | PowerPoint   | native automation  | Windows              |
//! | WPS Office   | native automation  | Windows              |
//! | LibreOffice  | headless CLI       | Windows, macOS, Linux|
//! | ONLYOFFICE   | headless CLI       | Windows, macOS, Linux|
//! | Keynote      | scripting app      | macOS                |

pub mod probe;
pub mod registry;

pub use probe::{BackendProbe, SystemProbe};
pub use registry::BackendRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One of the mutually-exclusive converter applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    PowerPoint,
    Wps,
    LibreOffice,
    OnlyOffice,
    Keynote,
}

/// How a backend is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// COM automation object; blocking and uninterruptible, so it always runs
    /// in an isolated, killable process.
    NativeAutomation,
    /// Executable with a headless convert-to-PDF mode.
    HeadlessCli,
    /// Application driven through the OS scripting host (AppleScript).
    ScriptingApp,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::PowerPoint,
        Backend::Wps,
        Backend::LibreOffice,
        Backend::OnlyOffice,
        Backend::Keynote,
    ];

    pub fn kind(self) -> BackendKind {
        match self {
            Backend::PowerPoint | Backend::Wps => BackendKind::NativeAutomation,
            Backend::LibreOffice | Backend::OnlyOffice => BackendKind::HeadlessCli,
            Backend::Keynote => BackendKind::ScriptingApp,
        }
    }

    /// Human-readable product name.
    pub fn display_name(self) -> &'static str {
        match self {
            Backend::PowerPoint => "Microsoft PowerPoint",
            Backend::Wps => "WPS Office",
            Backend::LibreOffice => "LibreOffice",
            Backend::OnlyOffice => "ONLYOFFICE",
            Backend::Keynote => "Apple Keynote",
        }
    }

    /// Platforms the backend can run on, or `None` if it is cross-platform.
    pub fn required_platform(self) -> Option<HostPlatform> {
        match self {
            Backend::PowerPoint | Backend::Wps => Some(HostPlatform::Windows),
            Backend::Keynote => Some(HostPlatform::MacOs),
            Backend::LibreOffice | Backend::OnlyOffice => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Operating-system family, which decides candidate order and install paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostPlatform {
    Windows,
    MacOs,
    /// Linux and every other unix.
    Linux,
}

impl HostPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostPlatform::Windows
        } else if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Linux
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HostPlatform::Windows => "Windows",
            HostPlatform::MacOs => "macOS",
            HostPlatform::Linux => "Linux",
        }
    }

    /// Candidate backends in priority order.
    pub fn candidates(self) -> &'static [Backend] {
        match self {
            HostPlatform::Windows => &[
                Backend::PowerPoint,
                Backend::Wps,
                Backend::LibreOffice,
                Backend::OnlyOffice,
            ],
            HostPlatform::MacOs => &[Backend::Keynote, Backend::LibreOffice, Backend::OnlyOffice],
            HostPlatform::Linux => &[Backend::LibreOffice, Backend::OnlyOffice],
        }
    }

    /// Message shown when nothing usable is installed.
    pub fn install_message(self) -> String {
        let choices = match self {
            HostPlatform::Windows => "Microsoft PowerPoint, WPS Office, LibreOffice, or ONLYOFFICE",
            HostPlatform::MacOs => "Keynote, LibreOffice, or ONLYOFFICE",
            HostPlatform::Linux => "LibreOffice or ONLYOFFICE",
        };
        format!("No supported converter backend found.\n\nPlease install one of: {choices}.")
    }
}

/// A usable backend plus whatever the probe resolved for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBackend {
    pub backend: Backend,
    /// Executable or application bundle, when the backend has one.
    pub location: Option<PathBuf>,
}

impl ActiveBackend {
    pub fn new(backend: Backend, location: Option<PathBuf>) -> Self {
        Self { backend, location }
    }

    pub fn display_name(&self) -> &'static str {
        self.backend.display_name()
    }
}
