//! The user-facing collaborator the orchestrator talks to.
//!
//! A [`Frontend`] supplies user input (dialogs, the current list selection)
//! and receives display refreshes and notifications. The orchestrator calls
//! it from whichever tokio task finished a step, so implementations that
//! own a UI thread must marshal calls onto it themselves.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

pub trait Frontend: Send + Sync {
    // ── Input ─────────────────────────────────────────────────────────────

    /// Presentations the user picked to add. Empty when the dialog was
    /// dismissed.
    fn ask_open_files(&self) -> Vec<PathBuf>;

    /// Destination for a merged PDF, pre-filled with `suggested_name`.
    fn ask_save_file(&self, suggested_name: &str) -> Option<PathBuf>;

    /// Destination directory for separate PDFs.
    fn ask_directory(&self) -> Option<PathBuf>;

    /// Yes/no question. `true` means go ahead.
    fn ask_confirm(&self, title: &str, message: &str) -> bool;

    /// Index of the highlighted entry in the file list.
    fn selected_index(&self) -> Option<usize>;

    fn set_selection(&self, index: usize) {
        let _ = index;
    }

    // ── Output ────────────────────────────────────────────────────────────

    fn notify(&self, level: NoticeLevel, title: &str, message: &str);

    fn update_status(&self, message: &str, percent: f64) {
        let _ = (message, percent);
    }

    fn update_task_tabs(&self, labels: &[String], active: &str, running: &[String]) {
        let _ = (labels, active, running);
    }

    fn update_file_list(&self, files: &[PathBuf]) {
        let _ = files;
    }

    fn update_queue_status(&self, running: usize) {
        let _ = running;
    }

    /// Enable or disable the start/cancel controls for the active task.
    fn update_task_actions(&self, converting: bool) {
        let _ = converting;
    }

    /// Show a finished result in the OS default handler.
    fn open_path(&self, path: &Path) {
        crate::system::open_path(path);
    }
}
