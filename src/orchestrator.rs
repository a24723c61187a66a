//! Task-level operations: the layer a frontend drives.
//!
//! The [`Orchestrator`] owns nothing global. It holds `Arc`s to the backend
//! registry, the task store, the pipeline, and the frontend, and every
//! conversion it starts runs on its own tokio task with its own cancel token.
//! Each exposed operation mutates the store and then refreshes the frontend.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::BackendRegistry;
use crate::cancel::CancelToken;
use crate::config::ConverterConfig;
use crate::convert::{ConversionOutput, ConversionPipeline, ConversionRequest};
use crate::error::ConvertError;
use crate::frontend::{Frontend, NoticeLevel};
use crate::pipeline::PdfiumMerger;
use crate::progress::PipelineProgress;
use crate::tabs::TabMap;
use crate::task::{
    sanitize_name, EditRejected, Task, TaskId, TaskStore, CANCELLED_STATUS, COMPLETED_STATUS,
    ERROR_STATUS,
};
use crate::worker::ConversionWorker;

const EDIT_WHILE_RUNNING: &str = "Cannot edit files while this task is converting.";
const REORDER_WHILE_RUNNING: &str = "Cannot reorder files while this task is converting.";
const SORT_WHILE_RUNNING: &str = "Cannot sort files while this task is converting.";

/// Coordinates tasks, runs, and the frontend. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<BackendRegistry>,
    store: Arc<TaskStore>,
    pipeline: Arc<ConversionPipeline>,
    frontend: Arc<dyn Frontend>,
    config: ConverterConfig,
    tabs: Arc<Mutex<TabMap>>,
}

impl Orchestrator {
    /// Wire up an orchestrator and create the first task.
    pub fn new(
        registry: Arc<BackendRegistry>,
        pipeline: Arc<ConversionPipeline>,
        frontend: Arc<dyn Frontend>,
        config: ConverterConfig,
    ) -> Self {
        let store = Arc::new(TaskStore::new());
        store.create_task();
        let orchestrator = Self {
            registry,
            store,
            pipeline,
            frontend,
            config,
            tabs: Arc::new(Mutex::new(TabMap::default())),
        };
        orchestrator.refresh();
        orchestrator
    }

    /// Production wiring: probe the real system, convert with the detected
    /// backend, merge with PDFium.
    pub fn with_system(frontend: Arc<dyn Frontend>, config: ConverterConfig) -> Self {
        let registry = Arc::new(BackendRegistry::system());
        let worker = Arc::new(ConversionWorker::new(Arc::clone(&registry), &config));
        let pipeline = Arc::new(ConversionPipeline::new(
            worker,
            Arc::new(PdfiumMerger::new()),
            config.clone(),
        ));
        Self::new(registry, pipeline, frontend, config)
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    // ── Backend ───────────────────────────────────────────────────────────

    /// Report which backend will be used, or warn that none is installed.
    ///
    /// Probing may spawn helper processes; call from a blocking context.
    pub fn check_backend(&self) -> bool {
        if self.registry.list_available().is_empty() {
            self.frontend.notify(
                NoticeLevel::Warning,
                "No Backend Found",
                &self.registry.install_message(),
            );
            self.frontend
                .update_status("No backend found - install required app", 0.0);
            return false;
        }
        match self.registry.active_backend() {
            Ok(active) => {
                self.frontend
                    .update_status(&format!("Ready - Backend: {}", active.display_name()), 0.0);
                true
            }
            Err(e) => {
                self.frontend
                    .notify(NoticeLevel::Warning, "Backend Check Failed", &e.to_string());
                self.frontend.update_status("Backend check failed", 0.0);
                false
            }
        }
    }

    // ── File list ─────────────────────────────────────────────────────────

    fn warn(&self, title: &str, message: &str) {
        warn!(title, "{message}");
        self.frontend.notify(NoticeLevel::Warning, title, message);
    }

    /// Run `edit` on the active task, warning with `busy_message` if it is
    /// converting. Returns `None` when nothing was edited.
    fn edit_active<R>(&self, busy_message: &str, edit: impl FnOnce(&mut Task) -> R) -> Option<R> {
        let id = self.store.active_id()?;
        match self.store.edit_files(id, edit) {
            Ok(r) => Some(r),
            Err(EditRejected::Converting) => {
                self.warn("Task Running", busy_message);
                None
            }
            Err(EditRejected::NoSuchTask) => None,
        }
    }

    fn active_is_converting(&self) -> bool {
        self.store.active().is_some_and(|t| t.is_converting)
    }

    pub fn add_files(&self) {
        if self.active_is_converting() {
            self.warn("Task Running", EDIT_WHILE_RUNNING);
            return;
        }
        let picked = self.frontend.ask_open_files();
        if picked.is_empty() {
            return;
        }
        self.add_paths(picked);
    }

    /// Add paths directly, skipping the dialog.
    pub fn add_paths(&self, paths: Vec<PathBuf>) -> usize {
        let added = self
            .edit_active(EDIT_WHILE_RUNNING, |t| t.add_files(paths))
            .unwrap_or(0);
        self.refresh();
        added
    }

    pub fn remove_selected(&self) {
        let Some(index) = self.frontend.selected_index() else {
            if self.active_is_converting() {
                self.warn("Task Running", EDIT_WHILE_RUNNING);
            }
            return;
        };
        if self
            .edit_active(EDIT_WHILE_RUNNING, |t| t.remove_at(index))
            .flatten()
            .is_some()
        {
            self.refresh();
        }
    }

    pub fn clear_all(&self) {
        if self.edit_active(EDIT_WHILE_RUNNING, Task::clear).is_some() {
            self.refresh();
        }
    }

    pub fn move_up(&self) {
        let Some(index) = self.frontend.selected_index() else {
            return;
        };
        if let Some(new_index) = self
            .edit_active(REORDER_WHILE_RUNNING, |t| t.move_up(index))
            .flatten()
        {
            self.refresh();
            self.frontend.set_selection(new_index);
        }
    }

    pub fn move_down(&self) {
        let Some(index) = self.frontend.selected_index() else {
            return;
        };
        if let Some(new_index) = self
            .edit_active(REORDER_WHILE_RUNNING, |t| t.move_down(index))
            .flatten()
        {
            self.refresh();
            self.frontend.set_selection(new_index);
        }
    }

    /// Drop-to-reorder. Silently ignored while converting; the drag gesture
    /// itself is feedback enough.
    pub fn drag_reorder(&self, from: usize, to: usize) {
        let Some(id) = self.store.active_id() else {
            return;
        };
        if let Ok(Some(new_index)) = self.store.edit_files(id, |t| t.reorder(from, to)) {
            self.refresh();
            self.frontend.set_selection(new_index);
        }
    }

    pub fn sort_files(&self) {
        if self
            .edit_active(SORT_WHILE_RUNNING, Task::sort_by_name)
            .is_some()
        {
            self.refresh();
        }
    }

    // ── Conversion ────────────────────────────────────────────────────────

    /// Merge the active task's files into one PDF chosen through the save
    /// dialog.
    pub fn start_conversion(&self) -> Option<JoinHandle<()>> {
        let task = self.startable_active_task()?;
        let suggested = format!("{}.pdf", sanitize_name(&task.name));
        let output = self.frontend.ask_save_file(&suggested)?;
        self.start_task(task.id, ConversionRequest::Merge { output })
    }

    /// Convert each of the active task's files into a chosen directory.
    pub fn start_separate_conversion(&self) -> Option<JoinHandle<()>> {
        let task = self.startable_active_task()?;
        let output_dir = self.frontend.ask_directory()?;
        self.start_task(task.id, ConversionRequest::Separate { output_dir })
    }

    fn startable_active_task(&self) -> Option<Task> {
        let task = self.store.active()?;
        if task.files.is_empty() {
            self.warn("No Files", &ConvertError::NoInputs.to_string());
            return None;
        }
        if task.is_converting {
            self.warn("Task Running", &format!("{} is already converting.", task.name));
            return None;
        }
        Some(task)
    }

    /// Start a run for `id` on its own tokio task.
    ///
    /// A no-op plus a warning if the task is already converting. Must be
    /// called from within a tokio runtime.
    pub fn start_task(&self, id: TaskId, request: ConversionRequest) -> Option<JoinHandle<()>> {
        let task = self.store.get(id)?;
        if task.files.is_empty() {
            self.warn("No Files", &ConvertError::NoInputs.to_string());
            return None;
        }
        let Some((cancel, files)) = self.store.begin_run(id) else {
            self.warn("Task Running", &format!("{} is already converting.", task.name));
            return None;
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("No tokio runtime to run the conversion on: {e}");
                self.store
                    .finish_run(id, ERROR_STATUS, 0.0, Some(e.to_string()));
                self.refresh();
                return None;
            }
        };

        info!(task = %task.name, mode = ?request.mode(), files = files.len(), "Conversion started");
        self.refresh();

        let this = self.clone();
        Some(runtime.spawn(async move {
            this.run_task(id, task.name, files, request, cancel).await;
        }))
    }

    async fn run_task(
        &self,
        id: TaskId,
        name: String,
        files: Vec<PathBuf>,
        request: ConversionRequest,
        cancel: CancelToken,
    ) {
        let progress = TaskProgress {
            orchestrator: self,
            id,
        };
        let result = self
            .pipeline
            .run(&files, &request, &cancel, &progress)
            .await;

        match result {
            Ok(output) => {
                info!(task = %name, "Conversion completed");
                self.store.finish_run(id, COMPLETED_STATUS, 100.0, None);
                self.refresh();
                self.frontend.notify(
                    NoticeLevel::Info,
                    success_title(&output),
                    &success_message(&name, &output, &request),
                );
                if self.config.open_after_conversion {
                    let target = match &request {
                        ConversionRequest::Merge { output } => output,
                        ConversionRequest::Separate { output_dir } => output_dir,
                    };
                    self.frontend.open_path(target);
                }
            }
            Err(e) if e.is_cancelled() => {
                info!(task = %name, "Conversion cancelled");
                self.store.finish_run(id, CANCELLED_STATUS, 0.0, None);
                self.refresh();
            }
            Err(e) => {
                error!(task = %name, category = ?e.category(), "Conversion failed: {e}");
                self.store
                    .finish_run(id, ERROR_STATUS, 0.0, Some(e.to_string()));
                self.refresh();
                self.frontend.notify(
                    NoticeLevel::Error,
                    "Error",
                    &format!("Conversion failed:\n{e}"),
                );
            }
        }
    }

    /// Ask the active task's run to stop.
    pub fn cancel_conversion(&self) {
        let Some(id) = self.store.active_id() else {
            return;
        };
        if !self.cancel_task(id) {
            self.warn("Nothing to Cancel", "Current tab has no running conversion.");
        }
    }

    /// Ask a task's run to stop. Cooperative: the run notices within one
    /// poll interval. Returns `false` if the task is not running.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        let requested = self.store.request_cancel(id);
        if requested {
            debug!(task = %id, "Cancel requested");
            self.refresh();
        }
        requested
    }

    // ── Tabs ──────────────────────────────────────────────────────────────

    pub fn create_task_tab(&self) -> TaskId {
        let id = self.store.create_task();
        self.refresh();
        id
    }

    fn resolve_tab(&self, label: &str) -> Option<TaskId> {
        let mapped = self
            .tabs
            .lock()
            .ok()
            .and_then(|tabs| tabs.task_for(label));
        mapped.or_else(|| self.store.find_by_name(label))
    }

    /// Close a tab, confirming first if its task is running (which then
    /// requests cancel) or still has files.
    pub fn close_task_tab(&self, label: &str) {
        let Some(id) = self.resolve_tab(label) else {
            return;
        };
        let Some(task) = self.store.get(id) else {
            return;
        };

        if task.is_converting {
            let confirmed = self.frontend.ask_confirm(
                "Cancel Running Task?",
                &format!(
                    "{label} is currently converting.\n\nClose this tab and cancel the running task?"
                ),
            );
            if !confirmed {
                return;
            }
            self.store.request_cancel(id);
        } else if !task.files.is_empty() {
            let confirmed = self.frontend.ask_confirm(
                "Clear Task?",
                &format!("{label} has files in its list.\n\nClose this tab and clear this task?"),
            );
            if !confirmed {
                return;
            }
        }

        self.store.remove_task(id);
        self.refresh();
    }

    pub fn switch_task_tab(&self, label: &str) {
        if let Some(id) = self.resolve_tab(label) {
            if self.store.set_active(id) {
                self.refresh();
            }
        }
    }

    // ── Display ───────────────────────────────────────────────────────────

    /// Push the current state to the frontend.
    pub fn refresh(&self) {
        let tasks = self.store.tasks();
        let map = TabMap::build(&tasks, self.config.max_tab_label_len);
        let active = self.store.active();

        let active_label = active
            .as_ref()
            .and_then(|t| map.label_for(t.id).map(str::to_string))
            .unwrap_or_else(|| "Task 1".to_string());
        let running: Vec<String> = tasks
            .iter()
            .filter(|t| t.is_converting)
            .filter_map(|t| map.label_for(t.id).map(str::to_string))
            .collect();

        self.frontend
            .update_task_tabs(&map.labels(), &active_label, &running);
        if let Some(task) = &active {
            self.frontend.update_file_list(&task.files);
            let phase = if task.is_converting { "Running" } else { "Idle" };
            self.frontend.update_status(
                &format!("[{}] {} - {}", task.name, phase, task.status),
                task.progress,
            );
            self.frontend.update_task_actions(task.is_converting);
        }
        self.frontend.update_queue_status(running.len());

        if let Ok(mut tabs) = self.tabs.lock() {
            *tabs = map;
        }
    }
}

fn success_title(output: &ConversionOutput) -> &'static str {
    match output {
        ConversionOutput::Merge { .. } => "Success",
        ConversionOutput::Separate { .. } => "Done",
    }
}

fn success_message(name: &str, output: &ConversionOutput, request: &ConversionRequest) -> String {
    match (output, request) {
        (ConversionOutput::Separate { outputs }, ConversionRequest::Separate { output_dir }) => {
            format!(
                "{name}: {} PDF files created in:\n{}",
                outputs.len(),
                output_dir.display()
            )
        }
        (ConversionOutput::Merge { output, .. }, _) => {
            format!("{name}: PDF created successfully!\n{}", output.display())
        }
        (other, _) => format!("{name}: {}", other.summary()),
    }
}

/// Writes pipeline progress into the task record.
struct TaskProgress<'a> {
    orchestrator: &'a Orchestrator,
    id: TaskId,
}

impl PipelineProgress for TaskProgress<'_> {
    fn on_progress(&self, status: &str, percent: f64) {
        if self.orchestrator.store.set_progress(self.id, status, percent) {
            self.orchestrator.refresh();
        }
    }
}
