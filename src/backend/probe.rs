//! Host probing: is a given backend actually usable here?
//!
//! Each backend kind is probed differently. Automation backends are checked by
//! creating and immediately quitting the COM object, headless CLI backends by
//! searching `PATH` and then a short list of well-known install locations, and
//! Keynote by looking for its application bundle.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use super::{ActiveBackend, Backend, HostPlatform};

/// Answers "is this backend installed and usable?".
///
/// Implementations must be cheap to call more than once; the registry caches
/// results but tests and `invalidate()` may re-probe.
pub trait BackendProbe: Send + Sync {
    /// Returns the resolved backend if it is usable, `None` otherwise.
    fn probe(&self, backend: Backend) -> Option<ActiveBackend>;
}

const LIBREOFFICE_NAMES: &[&str] = &["soffice", "libreoffice"];
const ONLYOFFICE_NAMES: &[&str] = &[
    "onlyoffice-desktopeditors",
    "desktopeditors",
    "DesktopEditors",
];
const WPS_NAMES: &[&str] = &["wpp", "wps"];

const WPS_PATHS: &[&str] = &[
    r"C:\Program Files\WPS Office\12.2.0.17119\office6\wpp.exe",
    r"C:\Program Files\WPS Office\office6\wpp.exe",
    r"C:\Program Files (x86)\WPS Office\office6\wpp.exe",
];

const KEYNOTE_BUNDLE: &str = "/Applications/Keynote.app";

/// Well-known install locations checked after `PATH` lookup fails.
pub fn install_locations(backend: Backend, platform: HostPlatform) -> &'static [&'static str] {
    match (backend, platform) {
        (Backend::LibreOffice, HostPlatform::Windows) => &[
            r"C:\Program Files\LibreOffice\program\soffice.exe",
            r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
        ],
        (Backend::LibreOffice, HostPlatform::MacOs) => {
            &["/Applications/LibreOffice.app/Contents/MacOS/soffice"]
        }
        (Backend::LibreOffice, HostPlatform::Linux) => &[
            "/usr/bin/libreoffice",
            "/usr/bin/soffice",
            "/snap/bin/libreoffice",
        ],
        (Backend::OnlyOffice, HostPlatform::Windows) => &[
            r"C:\Program Files\ONLYOFFICE\DesktopEditors\DesktopEditors.exe",
            r"C:\Program Files (x86)\ONLYOFFICE\DesktopEditors\DesktopEditors.exe",
        ],
        (Backend::OnlyOffice, HostPlatform::MacOs) => {
            &["/Applications/ONLYOFFICE.app/Contents/MacOS/DesktopEditors"]
        }
        (Backend::OnlyOffice, HostPlatform::Linux) => &[
            "/usr/bin/onlyoffice-desktopeditors",
            "/usr/bin/desktopeditors",
        ],
        (Backend::Wps, HostPlatform::Windows) => WPS_PATHS,
        _ => &[],
    }
}

/// Probe that inspects the real host.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    platform: HostPlatform,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            platform: HostPlatform::current(),
        }
    }

    fn find_cli(&self, backend: Backend, names: &[&str]) -> Option<PathBuf> {
        find_executable(names, install_locations(backend, self.platform))
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendProbe for SystemProbe {
    fn probe(&self, backend: Backend) -> Option<ActiveBackend> {
        if let Some(required) = backend.required_platform() {
            if required != self.platform {
                return None;
            }
        }

        let found = match backend {
            Backend::PowerPoint => {
                com_object_available("PowerPoint.Application").then(|| ActiveBackend::new(backend, None))
            }
            Backend::Wps => {
                if com_object_available("KWPP.Application") {
                    Some(ActiveBackend::new(backend, None))
                } else {
                    self.find_cli(backend, WPS_NAMES)
                        .map(|exe| ActiveBackend::new(backend, Some(exe)))
                }
            }
            Backend::LibreOffice => self
                .find_cli(backend, LIBREOFFICE_NAMES)
                .map(|exe| ActiveBackend::new(backend, Some(exe))),
            Backend::OnlyOffice => self
                .find_cli(backend, ONLYOFFICE_NAMES)
                .map(|exe| ActiveBackend::new(backend, Some(exe))),
            Backend::Keynote => {
                let bundle = PathBuf::from(KEYNOTE_BUNDLE);
                bundle
                    .is_dir()
                    .then(|| ActiveBackend::new(backend, Some(bundle)))
            }
        };

        debug!(backend = %backend, available = found.is_some(), "Probed backend");
        found
    }
}

/// Search `PATH` for any of `names`, then fall back to `extra_paths`.
pub fn find_executable(names: &[&str], extra_paths: &[&str]) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();

    for name in names {
        for dir in &dirs {
            if let Some(found) = executable_in(dir, OsStr::new(name)) {
                return Some(found);
            }
        }
    }

    extra_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

fn executable_in(dir: &Path, name: &OsStr) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if is_executable(&candidate) {
        return Some(candidate);
    }
    if cfg!(windows) {
        let with_ext = candidate.with_extension("exe");
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Create and immediately quit a COM automation object.
///
/// Runs through PowerShell so the probe never loads COM into this process.
fn com_object_available(prog_id: &str) -> bool {
    if !cfg!(windows) {
        return false;
    }
    let script = format!(
        "$ErrorActionPreference = 'Stop'; $app = New-Object -ComObject '{prog_id}'; $app.Quit()"
    );
    Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &script])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
