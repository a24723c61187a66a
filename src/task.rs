//! Conversion tasks and the store that owns them.
//!
//! A [`Task`] is one tab's worth of work: an ordered list of presentations
//! plus the status of its most recent run. [`TaskStore`] is the only owner;
//! everything else reads snapshots and mutates through store methods, each of
//! which takes the lock for a single short critical section and never holds
//! it across an `.await`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::cancel::CancelToken;

pub const READY_STATUS: &str = "Ready - Add files to get started";
pub const STARTING_STATUS: &str = "Starting conversion...";
pub const STOPPING_STATUS: &str = "Stopping backend process...";
pub const COMPLETED_STATUS: &str = "Completed";
pub const CANCELLED_STATUS: &str = "Cancelled";
pub const ERROR_STATUS: &str = "Error";

/// Stable numeric identity of a task. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of one task.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    /// `"Task N"`, unique while the task is alive.
    pub name: String,
    pub files: Vec<PathBuf>,
    pub status: String,
    /// `0.0..=100.0`
    pub progress: f64,
    pub is_converting: bool,
    pub cancel_requested: bool,
    /// Message of the last failed run, cleared when a new run starts.
    pub last_error: Option<String>,
    #[serde(skip)]
    cancel: CancelToken,
}

impl Task {
    fn new(id: TaskId) -> Self {
        Self {
            id,
            name: format!("Task {}", id.0),
            files: Vec::new(),
            status: READY_STATUS.to_string(),
            progress: 0.0,
            is_converting: false,
            cancel_requested: false,
            last_error: None,
            cancel: CancelToken::new(),
        }
    }

    /// The token observed by this task's current run.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Append paths not already in the list. Returns how many were added.
    pub fn add_files<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let before = self.files.len();
        for path in paths {
            if !self.files.contains(&path) {
                self.files.push(path);
            }
        }
        self.files.len() - before
    }

    pub fn remove_at(&mut self, index: usize) -> Option<PathBuf> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    /// Empty the list and reset status and progress.
    pub fn clear(&mut self) {
        self.files.clear();
        self.status = READY_STATUS.to_string();
        self.progress = 0.0;
    }

    /// Swap with the previous entry. Returns the new index of the moved file.
    pub fn move_up(&mut self, index: usize) -> Option<usize> {
        if index == 0 || index >= self.files.len() {
            return None;
        }
        self.files.swap(index, index - 1);
        Some(index - 1)
    }

    /// Swap with the next entry. Returns the new index of the moved file.
    pub fn move_down(&mut self, index: usize) -> Option<usize> {
        if index + 1 >= self.files.len() {
            return None;
        }
        self.files.swap(index, index + 1);
        Some(index + 1)
    }

    /// Move the file at `from` so it ends up at `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Option<usize> {
        if from >= self.files.len() {
            return None;
        }
        let item = self.files.remove(from);
        let to = to.min(self.files.len());
        self.files.insert(to, item);
        Some(to)
    }

    /// Case-insensitive by file name, stable for equal names.
    pub fn sort_by_name(&mut self) {
        self.files.sort_by_cached_key(|p| file_name_lower(p));
    }
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w-]").expect("valid regex"));

/// File-name-safe version of a task name: `"Task 1"` → `"Task_1"`.
pub fn sanitize_name(value: &str) -> String {
    let clean = UNSAFE_CHARS.replace_all(value.trim(), "_");
    let clean = clean.trim_matches('_');
    if clean.is_empty() {
        "task".to_string()
    } else {
        clean.to_string()
    }
}

/// Why a file-list edit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRejected {
    NoSuchTask,
    Converting,
}

struct Inner {
    tasks: Vec<Task>,
    active: Option<TaskId>,
    next_id: u64,
}

impl Inner {
    fn find_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn create(&mut self) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.tasks.push(Task::new(id));
        self.active = Some(id);
        id
    }
}

/// Owner of every task, guarded by one coarse mutex.
pub struct TaskStore {
    inner: Mutex<Inner>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// An empty store. Call [`TaskStore::create_task`] before use; the
    /// orchestrator does this on construction.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: Vec::new(),
                active: None,
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Structure ─────────────────────────────────────────────────────────

    /// Allocate `"Task N"`, append it, and make it active.
    pub fn create_task(&self) -> TaskId {
        let id = self.lock().create();
        debug!(task = %id, "Task created");
        id
    }

    /// Remove a task. The store is never left empty: removing the last task
    /// creates a fresh one. If the active task was removed, the first
    /// remaining task becomes active.
    pub fn remove_task(&self, id: TaskId) -> bool {
        let mut inner = self.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        let removed = inner.tasks.len() != before;

        if inner.tasks.is_empty() {
            inner.create();
        } else if inner.active == Some(id) {
            inner.active = inner.tasks.first().map(|t| t.id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<TaskId> {
        self.lock()
            .tasks
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
    }

    /// Snapshot of all tasks in creation order.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn active_id(&self) -> Option<TaskId> {
        self.lock().active
    }

    pub fn active(&self) -> Option<Task> {
        let inner = self.lock();
        let id = inner.active?;
        inner.tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Make `id` the active task. Returns `false` if it does not exist.
    pub fn set_active(&self, id: TaskId) -> bool {
        let mut inner = self.lock();
        if inner.tasks.iter().any(|t| t.id == id) {
            inner.active = Some(id);
            true
        } else {
            false
        }
    }

    pub fn running_names(&self) -> Vec<String> {
        self.lock()
            .tasks
            .iter()
            .filter(|t| t.is_converting)
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.lock().tasks.iter().filter(|t| t.is_converting).count()
    }

    /// `true` for a missing task, so an orphaned run stops.
    pub fn is_cancel_requested(&self, id: TaskId) -> bool {
        self.lock()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .is_none_or(|t| t.cancel_requested)
    }

    // ── File list ─────────────────────────────────────────────────────────

    /// Apply `edit` to a task's file list unless it is converting.
    pub fn edit_files<R>(
        &self,
        id: TaskId,
        edit: impl FnOnce(&mut Task) -> R,
    ) -> Result<R, EditRejected> {
        let mut inner = self.lock();
        let task = inner.find_mut(id).ok_or(EditRejected::NoSuchTask)?;
        if task.is_converting {
            return Err(EditRejected::Converting);
        }
        Ok(edit(task))
    }

    // ── Run lifecycle ─────────────────────────────────────────────────────

    /// Mark a task as converting and hand out a fresh cancel token.
    ///
    /// Returns `None` if the task is missing or already converting.
    pub fn begin_run(&self, id: TaskId) -> Option<(CancelToken, Vec<PathBuf>)> {
        let mut inner = self.lock();
        let task = inner.find_mut(id)?;
        if task.is_converting {
            return None;
        }
        task.is_converting = true;
        task.cancel_requested = false;
        task.status = STARTING_STATUS.to_string();
        task.progress = 0.0;
        task.last_error = None;
        task.cancel = CancelToken::new();
        Some((task.cancel.clone(), task.files.clone()))
    }

    /// Ask a running task to stop. Returns `false` if it is not running.
    pub fn request_cancel(&self, id: TaskId) -> bool {
        let mut inner = self.lock();
        let Some(task) = inner.find_mut(id) else {
            return false;
        };
        if !task.is_converting {
            return false;
        }
        task.cancel_requested = true;
        task.status = STOPPING_STATUS.to_string();
        task.cancel.cancel();
        true
    }

    /// Record pipeline progress. Ignored once cancel was requested, so the
    /// "stopping" status stays visible until the run ends.
    pub fn set_progress(&self, id: TaskId, status: &str, percent: f64) -> bool {
        let mut inner = self.lock();
        match inner.find_mut(id) {
            Some(task) if task.is_converting && !task.cancel_requested => {
                task.status = status.to_string();
                task.progress = percent.clamp(0.0, 100.0);
                true
            }
            _ => false,
        }
    }

    /// Settle a run: set the terminal status and clear the run flags.
    pub fn finish_run(&self, id: TaskId, status: &str, progress: f64, error: Option<String>) {
        let mut inner = self.lock();
        let Some(task) = inner.find_mut(id) else {
            warn!(task = %id, "Run finished for a task that no longer exists");
            return;
        };
        task.status = status.to_string();
        task.progress = progress;
        task.last_error = error;
        task.is_converting = false;
        task.cancel_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tasks_are_numbered_and_active() {
        let store = TaskStore::new();
        let a = store.create_task();
        let b = store.create_task();
        assert_eq!(store.get(a).unwrap().name, "Task 1");
        assert_eq!(store.get(b).unwrap().name, "Task 2");
        assert_eq!(store.active_id(), Some(b));
        assert_eq!(store.get(a).unwrap().status, READY_STATUS);
    }

    #[test]
    fn removing_last_task_creates_replacement() {
        let store = TaskStore::new();
        let only = store.create_task();
        assert!(store.remove_task(only));
        assert_eq!(store.len(), 1);
        let replacement = store.active().unwrap();
        assert_ne!(replacement.id, only);
        assert_eq!(replacement.name, "Task 2");
    }

    #[test]
    fn removing_active_task_activates_first() {
        let store = TaskStore::new();
        let a = store.create_task();
        let _b = store.create_task();
        let c = store.create_task();
        assert_eq!(store.active_id(), Some(c));
        store.remove_task(c);
        assert_eq!(store.active_id(), Some(a));
    }

    #[test]
    fn files_are_deduplicated() {
        let store = TaskStore::new();
        let id = store.create_task();
        let added = store
            .edit_files(id, |t| {
                t.add_files(["/a.pptx".into(), "/b.pptx".into(), "/a.pptx".into()])
            })
            .unwrap();
        assert_eq!(added, 2);
    }

    #[test]
    fn edits_rejected_while_converting() {
        let store = TaskStore::new();
        let id = store.create_task();
        store
            .edit_files(id, |t| t.add_files(["/a.pptx".into()]))
            .unwrap();
        let (_token, files) = store.begin_run(id).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(
            store.edit_files(id, |t| t.clear()),
            Err(EditRejected::Converting)
        );
        assert!(store.begin_run(id).is_none());
    }

    #[test]
    fn progress_ignored_after_cancel() {
        let store = TaskStore::new();
        let id = store.create_task();
        let (token, _) = store.begin_run(id).unwrap();
        assert!(store.set_progress(id, "Converting 1/2: a.pptx", 0.0));
        assert!(store.request_cancel(id));
        assert!(token.is_cancelled());
        assert!(!store.set_progress(id, "Converting 2/2: b.pptx", 40.0));
        assert_eq!(store.get(id).unwrap().status, STOPPING_STATUS);

        store.finish_run(id, CANCELLED_STATUS, 0.0, None);
        let task = store.get(id).unwrap();
        assert!(!task.is_converting);
        assert!(!task.cancel_requested);
    }

    #[test]
    fn each_run_gets_a_fresh_token() {
        let store = TaskStore::new();
        let id = store.create_task();
        let (first, _) = store.begin_run(id).unwrap();
        store.request_cancel(id);
        store.finish_run(id, CANCELLED_STATUS, 0.0, None);
        let (second, _) = store.begin_run(id).unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn reordering() {
        let store = TaskStore::new();
        let id = store.create_task();
        store
            .edit_files(id, |t| {
                t.add_files(["/x/c.pptx".into(), "/y/B.pptx".into(), "/z/a.pptx".into()]);
                assert_eq!(t.move_up(0), None);
                assert_eq!(t.move_down(0), Some(1));
                assert_eq!(t.reorder(2, 0), Some(0));
                t.sort_by_name();
            })
            .unwrap();
        let names: Vec<_> = store
            .get(id)
            .unwrap()
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.pptx", "B.pptx", "c.pptx"]);
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_name("Task 1"), "Task_1");
        assert_eq!(sanitize_name("  ../weird:name!  "), "weird_name");
        assert_eq!(sanitize_name("***"), "task");
        assert_eq!(sanitize_name("q3-report_v2"), "q3-report_v2");
    }
}
