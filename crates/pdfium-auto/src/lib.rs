//! # pdfium-auto
//!
//! Locate, download, and cache the [PDFium](https://pdfium.googlesource.com/pdfium/)
//! shared library at runtime, then bind `pdfium-render` to it.
//!
//! deck2pdf only needs PDFium to merge per-deck PDFs, so the library is
//! resolved lazily: the first merge (or the CLI's startup check) triggers
//! the lookup, and every later call in the process reuses the result.
//!
//! ## Resolution order
//!
//! 1. `PDFIUM_LIB_PATH`, if it names an existing file.
//! 2. The per-version cache directory (see [`pdfium_cache_dir`]).
//! 3. Download the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    extract the one library file into the cache, and use that.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pdfium_auto::{bind_pdfium_silent, ensure_pdfium_library};
//!
//! // Download with progress, then bind.
//! let path = ensure_pdfium_library(Some(&|done, total| {
//!     eprint!("\r{done}/{} bytes", total.unwrap_or(0));
//! })).expect("download failed");
//! let pdfium = bind_pdfium_silent().expect("PDFium unavailable");
//! # let _ = (path, pdfium);
//! ```
//!
//! ## Environment variable overrides
//!
//! - `PDFIUM_LIB_PATH` — path to an existing pdfium library; skips download.
//! - `PDFIUM_AUTO_CACHE_DIR` — override the default cache directory.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Constants ────────────────────────────────────────────────────────────────

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

const LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";
const CACHE_DIR_ENV: &str = "PDFIUM_AUTO_CACHE_DIR";

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("No PDFium build for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    #[error("PDFium download failed: {0}")]
    Download(String),

    #[error("PDFium archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to load PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Platform table ───────────────────────────────────────────────────────────

/// Where to find the library for one OS/arch pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    /// Release asset, e.g. `pdfium-linux-x64.tgz`.
    pub archive: &'static str,
    /// Member inside the archive, e.g. `lib/libpdfium.so`.
    pub member: &'static str,
    /// File name on disk.
    pub file_name: &'static str,
}

const fn asset(archive: &'static str, file_name: &'static str, member: &'static str) -> Asset {
    Asset {
        archive,
        member,
        file_name,
    }
}

const ASSETS: &[(&str, &str, Asset)] = &[
    ("macos", "aarch64", asset("pdfium-mac-arm64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib")),
    ("macos", "x86_64", asset("pdfium-mac-x64.tgz", "libpdfium.dylib", "lib/libpdfium.dylib")),
    ("linux", "x86_64", asset("pdfium-linux-x64.tgz", "libpdfium.so", "lib/libpdfium.so")),
    ("linux", "aarch64", asset("pdfium-linux-arm64.tgz", "libpdfium.so", "lib/libpdfium.so")),
    ("windows", "x86_64", asset("pdfium-win-x64.tgz", "pdfium.dll", "bin/pdfium.dll")),
    ("windows", "aarch64", asset("pdfium-win-arm64.tgz", "pdfium.dll", "bin/pdfium.dll")),
    ("windows", "x86", asset("pdfium-win-x86.tgz", "pdfium.dll", "bin/pdfium.dll")),
];

/// The release asset for an OS/arch pair (`std::env::consts` spelling).
pub fn asset_for(os: &str, arch: &str) -> Result<Asset, PdfiumAutoError> {
    ASSETS
        .iter()
        .find(|(o, a, _)| *o == os && *a == arch)
        .map(|(_, _, asset)| *asset)
        .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

fn host_asset() -> Result<Asset, PdfiumAutoError> {
    asset_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Cache directory ──────────────────────────────────────────────────────────

/// Per-version cache directory for the PDFium library.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/deck2pdf/pdfium-{VERSION}/`
/// - **Linux**: `~/.cache/deck2pdf/pdfium-{VERSION}/`
/// - **Windows**: `%LOCALAPPDATA%\deck2pdf\pdfium-{VERSION}\`
///
/// Override by setting `PDFIUM_AUTO_CACHE_DIR`.
pub fn pdfium_cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
        return PathBuf::from(dir).join(versioned);
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("deck2pdf")
        .join(versioned)
}

fn env_library() -> Option<PathBuf> {
    let path = PathBuf::from(std::env::var_os(LIB_PATH_ENV)?);
    if path.is_file() {
        Some(path)
    } else {
        warn!(path = %path.display(), "{LIB_PATH_ENV} does not exist; ignoring");
        None
    }
}

/// The library path if no download is needed, else `None`.
pub fn cached_pdfium_path() -> Option<PathBuf> {
    env_library().or_else(|| {
        let path = pdfium_cache_dir().join(host_asset().ok()?.file_name);
        path.is_file().then_some(path)
    })
}

/// `true` when [`ensure_pdfium_library`] would not touch the network.
pub fn is_pdfium_cached() -> bool {
    cached_pdfium_path().is_some()
}

// ── Resolution and binding ───────────────────────────────────────────────────

static RESOLVED: OnceLock<PathBuf> = OnceLock::new();

/// Path to a usable PDFium library, downloading it on first use.
///
/// `on_progress` receives `(bytes_downloaded, total_bytes)` while a download
/// is in flight. The result is memoized for the process.
pub fn ensure_pdfium_library(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = RESOLVED.get() {
        return Ok(path.clone());
    }
    let path = match cached_pdfium_path() {
        Some(path) => path,
        None => download_to_cache(on_progress)?,
    };
    debug!(path = %path.display(), "PDFium library resolved");
    Ok(RESOLVED.get_or_init(|| path).clone())
}

/// Bind to PDFium, downloading it first if necessary.
pub fn bind_pdfium(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Pdfium, PdfiumAutoError> {
    let path = ensure_pdfium_library(on_progress)?;
    bind_pdfium_from_path(&path)
}

/// [`bind_pdfium`] without progress reporting.
pub fn bind_pdfium_silent() -> Result<Pdfium, PdfiumAutoError> {
    bind_pdfium(None)
}

/// Bind to the library at `path`, bypassing the cache.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Download ─────────────────────────────────────────────────────────────────

fn download_to_cache(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PdfiumAutoError> {
    let asset = host_asset()?;
    let dir = pdfium_cache_dir();
    std::fs::create_dir_all(&dir).map_err(PdfiumAutoError::CacheDir)?;

    let url = format!("{RELEASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", asset.archive);
    info!(%url, "Downloading PDFium");
    let archive = fetch(&url, on_progress)?;

    let dest = dir.join(asset.file_name);
    // Extract next to the final name so a crash never leaves a truncated
    // library where the cache check would accept it.
    let partial = dir.join(format!("{}.partial", asset.file_name));
    unpack_member(&archive, asset.member, &partial)?;
    std::fs::rename(&partial, &dest).map_err(PdfiumAutoError::CacheDir)?;
    Ok(dest)
}

fn fetch(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PdfiumAutoError::Download(format!("Read error: {e}"))),
        };
        body.extend_from_slice(&chunk[..n]);
        if let Some(report) = on_progress {
            report(body.len() as u64, total);
        }
    }
    Ok(body)
}

/// Extract one member of a `.tgz` into `dest`.
fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    let extract = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    for entry in tar.entries().map_err(extract)? {
        let mut entry = entry.map_err(extract)?;
        if entry.path().map_err(extract)?.to_string_lossy() == member {
            entry.unpack(dest).map_err(extract)?;
            return Ok(());
        }
    }
    Err(PdfiumAutoError::Extract(format!(
        "'{member}' not found in archive"
    )))
}
