//! OS integration helpers.

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Open a file or directory with the OS default handler.
///
/// Fire-and-forget: the handler is spawned and not waited on. Failures are
/// logged; there is nothing useful a caller could do about them.
pub fn open_path(path: &Path) {
    let mut command = opener_command(path);
    debug!(path = %path.display(), "Opening in default handler");
    if let Err(e) = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        warn!(path = %path.display(), "Failed to open path: {e}");
    }
}

fn opener_command(path: &Path) -> Command {
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        // The empty string is the window title `start` expects first.
        c.args(["/C", "start", ""]).arg(path);
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(path);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(path);
        c
    }
}
