//! Task-level behaviour: concurrent runs, edit locking, tabs, notifications.

use async_trait::async_trait;
use deck2pdf::backend::BackendProbe;
use deck2pdf::task::{CANCELLED_STATUS, COMPLETED_STATUS, ERROR_STATUS, STOPPING_STATUS};
use deck2pdf::{
    ActiveBackend, Backend, BackendRegistry, CancelToken, ConversionPipeline, ConversionRequest,
    ConvertError, ConverterConfig, Frontend, HostPlatform, NoticeLevel, Orchestrator, PdfMerger,
    SlideConverter,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Converter that holds each file until the gate opens or the run is
/// cancelled.
struct GatedConverter {
    open: AtomicBool,
}

impl GatedConverter {
    fn new(open: bool) -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(open),
        })
    }

    fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SlideConverter for GatedConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        while !self.open.load(Ordering::SeqCst) {
            cancel.check()?;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if input.to_string_lossy().contains("corrupt") {
            return Err(ConvertError::WorkerFailed("Presentation is corrupt".into()));
        }
        std::fs::write(output, b"%PDF").map_err(|e| ConvertError::io(output, e))
    }
}

struct CopyFirstMerger;

#[async_trait]
impl PdfMerger for CopyFirstMerger {
    async fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        std::fs::copy(&inputs[0], output).map_err(|e| ConvertError::io(output, e))?;
        Ok(())
    }
}

struct FixedProbe(Vec<Backend>);

impl BackendProbe for FixedProbe {
    fn probe(&self, backend: Backend) -> Option<ActiveBackend> {
        self.0
            .contains(&backend)
            .then(|| ActiveBackend::new(backend, None))
    }
}

/// Frontend that answers dialogs from fixed values and records output.
#[derive(Default)]
struct RecordingFrontend {
    save_path: Mutex<Option<PathBuf>>,
    directory: Mutex<Option<PathBuf>>,
    confirm: AtomicBool,
    selected: Mutex<Option<usize>>,
    notices: Mutex<Vec<(NoticeLevel, String, String)>>,
    statuses: Mutex<Vec<String>>,
    tabs: Mutex<Vec<String>>,
    files: Mutex<Vec<PathBuf>>,
    opened: Mutex<Vec<PathBuf>>,
}

impl RecordingFrontend {
    fn notices(&self) -> Vec<(NoticeLevel, String, String)> {
        self.notices.lock().unwrap().clone()
    }

    fn last_notice(&self) -> (NoticeLevel, String, String) {
        self.notices().last().cloned().expect("no notice recorded")
    }
}

impl Frontend for RecordingFrontend {
    fn ask_open_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn ask_save_file(&self, suggested_name: &str) -> Option<PathBuf> {
        self.statuses
            .lock()
            .unwrap()
            .push(format!("suggested {suggested_name}"));
        self.save_path.lock().unwrap().clone()
    }

    fn ask_directory(&self) -> Option<PathBuf> {
        self.directory.lock().unwrap().clone()
    }

    fn ask_confirm(&self, _title: &str, _message: &str) -> bool {
        self.confirm.load(Ordering::SeqCst)
    }

    fn selected_index(&self) -> Option<usize> {
        *self.selected.lock().unwrap()
    }

    fn notify(&self, level: NoticeLevel, title: &str, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((level, title.to_string(), message.to_string()));
    }

    fn update_status(&self, message: &str, _percent: f64) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn update_task_tabs(&self, labels: &[String], _active: &str, _running: &[String]) {
        *self.tabs.lock().unwrap() = labels.to_vec();
    }

    fn update_file_list(&self, files: &[PathBuf]) {
        *self.files.lock().unwrap() = files.to_vec();
    }

    fn open_path(&self, path: &Path) {
        self.opened.lock().unwrap().push(path.to_path_buf());
    }
}

fn setup(
    converter: Arc<GatedConverter>,
    installed: &[Backend],
    config: ConverterConfig,
) -> (Orchestrator, Arc<RecordingFrontend>) {
    let registry = Arc::new(BackendRegistry::new(
        HostPlatform::Linux,
        Arc::new(FixedProbe(installed.to_vec())),
    ));
    let pipeline = Arc::new(ConversionPipeline::new(
        converter,
        Arc::new(CopyFirstMerger),
        config.clone(),
    ));
    let frontend = Arc::new(RecordingFrontend::default());
    let orchestrator = Orchestrator::new(registry, pipeline, frontend.clone(), config);
    (orchestrator, frontend)
}

fn fast_config() -> ConverterConfig {
    ConverterConfig::builder()
        .cancel_cleanup_grace_ms(10)
        .build()
        .unwrap()
}

fn decks(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| dir.join(n)).collect()
}

// ── Backend check ────────────────────────────────────────────────────────────

#[test]
fn check_backend_reports_selected_backend() {
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::OnlyOffice], fast_config());
    assert!(orchestrator.check_backend());
    assert_eq!(
        frontend.statuses.lock().unwrap().last().unwrap(),
        "Ready - Backend: ONLYOFFICE"
    );
    assert!(frontend.notices().is_empty());
}

#[test]
fn check_backend_warns_when_nothing_installed() {
    let (orchestrator, frontend) = setup(GatedConverter::new(true), &[], fast_config());
    assert!(!orchestrator.check_backend());
    let (level, title, message) = frontend.last_notice();
    assert_eq!(level, NoticeLevel::Warning);
    assert_eq!(title, "No Backend Found");
    assert!(message.contains("LibreOffice or ONLYOFFICE"));
}

// ── Runs ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_run_completes_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("talk.pdf");
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    *frontend.save_path.lock().unwrap() = Some(output.clone());

    orchestrator.add_paths(decks(dir.path(), &["a.pptx", "b.pptx"]));
    let handle = orchestrator.start_conversion().expect("run should start");
    handle.await.unwrap();

    let task = orchestrator.store().active().unwrap();
    assert_eq!(task.status, COMPLETED_STATUS);
    assert_eq!(task.progress, 100.0);
    assert!(!task.is_converting);
    assert!(output.is_file());

    assert!(frontend
        .statuses
        .lock()
        .unwrap()
        .contains(&"suggested Task_1.pdf".to_string()));
    let (level, title, message) = frontend.last_notice();
    assert_eq!(level, NoticeLevel::Info);
    assert_eq!(title, "Success");
    assert!(message.starts_with("Task 1: PDF created successfully!"));
    assert!(frontend.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn separate_run_opens_directory_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("pdfs");
    let config = ConverterConfig::builder()
        .open_after_conversion(true)
        .build()
        .unwrap();
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], config);
    *frontend.directory.lock().unwrap() = Some(out_dir.clone());

    orchestrator.add_paths(decks(dir.path(), &["a.pptx", "b.pptx"]));
    orchestrator
        .start_separate_conversion()
        .unwrap()
        .await
        .unwrap();

    let (_, title, message) = frontend.last_notice();
    assert_eq!(title, "Done");
    assert!(message.starts_with("Task 1: 2 PDF files created in:"));
    assert_eq!(*frontend.opened.lock().unwrap(), vec![out_dir.clone()]);
    assert!(out_dir.join("a_converted_pdf.pdf").is_file());
}

#[tokio::test]
async fn dismissed_save_dialog_starts_nothing() {
    let (orchestrator, _frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(vec!["a.pptx".into()]);
    assert!(orchestrator.start_conversion().is_none());
    assert!(!orchestrator.store().active().unwrap().is_converting);
}

#[tokio::test]
async fn starting_without_files_warns() {
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    assert!(orchestrator.start_conversion().is_none());
    let (level, title, message) = frontend.last_notice();
    assert_eq!(level, NoticeLevel::Warning);
    assert_eq!(title, "No Files");
    assert_eq!(message, "Add presentation files first.");
}

#[tokio::test]
async fn second_start_of_running_task_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let converter = GatedConverter::new(false);
    let (orchestrator, frontend) =
        setup(converter.clone(), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(decks(dir.path(), &["a.pptx"]));
    let id = orchestrator.store().active_id().unwrap();
    let request = ConversionRequest::Merge {
        output: dir.path().join("out.pdf"),
    };

    let handle = orchestrator.start_task(id, request.clone()).unwrap();
    assert!(orchestrator.start_task(id, request).is_none());
    let (_, title, message) = frontend.last_notice();
    assert_eq!(title, "Task Running");
    assert_eq!(message, "Task 1 is already converting.");
    assert_eq!(orchestrator.store().running_count(), 1);

    converter.release();
    handle.await.unwrap();
    assert_eq!(orchestrator.store().running_count(), 0);
}

#[tokio::test]
async fn edits_are_rejected_while_converting() {
    let dir = tempfile::tempdir().unwrap();
    let converter = GatedConverter::new(false);
    let (orchestrator, frontend) =
        setup(converter.clone(), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(decks(dir.path(), &["b.pptx", "a.pptx"]));
    let id = orchestrator.store().active_id().unwrap();
    let handle = orchestrator
        .start_task(
            id,
            ConversionRequest::Merge {
                output: dir.path().join("out.pdf"),
            },
        )
        .unwrap();

    assert_eq!(orchestrator.add_paths(vec![dir.path().join("c.pptx")]), 0);
    assert_eq!(
        frontend.last_notice().2,
        "Cannot edit files while this task is converting."
    );
    orchestrator.sort_files();
    assert_eq!(
        frontend.last_notice().2,
        "Cannot sort files while this task is converting."
    );
    *frontend.selected.lock().unwrap() = Some(1);
    orchestrator.move_up();
    assert_eq!(
        frontend.last_notice().2,
        "Cannot reorder files while this task is converting."
    );

    let notices_before = frontend.notices().len();
    orchestrator.drag_reorder(1, 0);
    assert_eq!(frontend.notices().len(), notices_before);

    assert_eq!(
        orchestrator.store().get(id).unwrap().files,
        decks(dir.path(), &["b.pptx", "a.pptx"])
    );

    converter.release();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancel_stops_run_and_allows_restart() {
    let dir = tempfile::tempdir().unwrap();
    let converter = GatedConverter::new(false);
    let (orchestrator, frontend) =
        setup(converter.clone(), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(decks(dir.path(), &["a.pptx"]));
    let id = orchestrator.store().active_id().unwrap();
    let output = dir.path().join("out.pdf");
    let request = ConversionRequest::Merge {
        output: output.clone(),
    };

    let handle = orchestrator.start_task(id, request.clone()).unwrap();
    orchestrator.cancel_conversion();
    assert_eq!(orchestrator.store().get(id).unwrap().status, STOPPING_STATUS);
    handle.await.unwrap();

    let task = orchestrator.store().get(id).unwrap();
    assert_eq!(task.status, CANCELLED_STATUS);
    assert_eq!(task.progress, 0.0);
    assert!(!task.is_converting);
    assert!(!output.exists());
    assert!(frontend.notices().is_empty());

    converter.release();
    orchestrator.start_task(id, request).unwrap().await.unwrap();
    assert_eq!(orchestrator.store().get(id).unwrap().status, COMPLETED_STATUS);
    assert!(output.is_file());
}

#[tokio::test]
async fn cancel_with_nothing_running_warns() {
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    orchestrator.cancel_conversion();
    let (level, title, message) = frontend.last_notice();
    assert_eq!(level, NoticeLevel::Warning);
    assert_eq!(title, "Nothing to Cancel");
    assert_eq!(message, "Current tab has no running conversion.");
}

#[tokio::test]
async fn cancelling_one_task_leaves_the_other_running() {
    let dir = tempfile::tempdir().unwrap();
    let converter = GatedConverter::new(false);
    let (orchestrator, _frontend) =
        setup(converter.clone(), &[Backend::LibreOffice], fast_config());

    orchestrator.add_paths(decks(dir.path(), &["a.pptx"]));
    let first = orchestrator.store().active_id().unwrap();
    let second = orchestrator.create_task_tab();
    orchestrator.add_paths(decks(dir.path(), &["b.pptx"]));

    let h1 = orchestrator
        .start_task(
            first,
            ConversionRequest::Merge {
                output: dir.path().join("one.pdf"),
            },
        )
        .unwrap();
    let h2 = orchestrator
        .start_task(
            second,
            ConversionRequest::Merge {
                output: dir.path().join("two.pdf"),
            },
        )
        .unwrap();
    assert_eq!(orchestrator.store().running_count(), 2);

    assert!(orchestrator.cancel_task(first));
    h1.await.unwrap();
    assert_eq!(orchestrator.store().get(first).unwrap().status, CANCELLED_STATUS);
    assert!(orchestrator.store().get(second).unwrap().is_converting);

    converter.release();
    h2.await.unwrap();
    assert_eq!(orchestrator.store().get(second).unwrap().status, COMPLETED_STATUS);
    assert!(dir.path().join("two.pdf").is_file());
}

#[tokio::test]
async fn failed_run_records_error_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(decks(dir.path(), &["corrupt.pptx"]));
    let id = orchestrator.store().active_id().unwrap();

    orchestrator
        .start_task(
            id,
            ConversionRequest::Merge {
                output: dir.path().join("out.pdf"),
            },
        )
        .unwrap()
        .await
        .unwrap();

    let task = orchestrator.store().get(id).unwrap();
    assert_eq!(task.status, ERROR_STATUS);
    assert_eq!(task.last_error.as_deref(), Some("Presentation is corrupt"));
    let (level, _, message) = frontend.last_notice();
    assert_eq!(level, NoticeLevel::Error);
    assert_eq!(message, "Conversion failed:\nPresentation is corrupt");
}

// ── File list and tabs ───────────────────────────────────────────────────────

#[test]
fn sort_and_move_follow_selection() {
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(vec!["/d/b.pptx".into(), "/d/C.pptx".into(), "/d/a.pptx".into()]);

    orchestrator.sort_files();
    assert_eq!(
        *frontend.files.lock().unwrap(),
        vec![
            PathBuf::from("/d/a.pptx"),
            PathBuf::from("/d/b.pptx"),
            PathBuf::from("/d/C.pptx")
        ]
    );

    *frontend.selected.lock().unwrap() = Some(2);
    orchestrator.move_up();
    assert_eq!(
        frontend.files.lock().unwrap()[1],
        PathBuf::from("/d/C.pptx")
    );

    *frontend.selected.lock().unwrap() = Some(0);
    orchestrator.remove_selected();
    assert_eq!(frontend.files.lock().unwrap().len(), 2);
}

#[test]
fn tabs_are_labelled_by_first_file() {
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(vec!["/d/quarterly.pptx".into()]);
    orchestrator.create_task_tab();
    orchestrator.add_paths(vec!["/e/quarterly.pptx".into()]);
    orchestrator.create_task_tab();

    assert_eq!(
        *frontend.tabs.lock().unwrap(),
        vec![
            "quarterly.pptx".to_string(),
            "quarterly.pptx (2)".to_string(),
            "Task 3".to_string()
        ]
    );

    orchestrator.switch_task_tab("quarterly.pptx (2)");
    assert_eq!(
        orchestrator.store().active().unwrap().files,
        vec![PathBuf::from("/e/quarterly.pptx")]
    );
}

#[test]
fn closing_last_tab_leaves_a_fresh_task() {
    let (orchestrator, frontend) =
        setup(GatedConverter::new(true), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(vec!["/d/a.pptx".into()]);

    frontend.confirm.store(false, Ordering::SeqCst);
    orchestrator.close_task_tab("a.pptx");
    assert_eq!(orchestrator.store().active().unwrap().name, "Task 1");

    frontend.confirm.store(true, Ordering::SeqCst);
    orchestrator.close_task_tab("a.pptx");
    let task = orchestrator.store().active().unwrap();
    assert_eq!(orchestrator.store().len(), 1);
    assert_eq!(task.name, "Task 2");
    assert!(task.files.is_empty());
    assert_eq!(*frontend.tabs.lock().unwrap(), vec!["Task 2".to_string()]);
}

#[tokio::test]
async fn closing_running_tab_cancels_its_run() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, frontend) =
        setup(GatedConverter::new(false), &[Backend::LibreOffice], fast_config());
    orchestrator.add_paths(decks(dir.path(), &["deck.pptx"]));
    let id = orchestrator.store().active_id().unwrap();
    let handle = orchestrator
        .start_task(
            id,
            ConversionRequest::Merge {
                output: dir.path().join("out.pdf"),
            },
        )
        .unwrap();

    frontend.confirm.store(true, Ordering::SeqCst);
    orchestrator.close_task_tab("deck.pptx");
    assert!(orchestrator.store().get(id).is_none());

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("cancelled run should wind down")
        .unwrap();
    assert_eq!(orchestrator.store().running_count(), 0);
}
