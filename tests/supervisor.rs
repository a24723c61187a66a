//! Process supervision against real child processes (`sh`), plus the headless
//! adapter driven end-to-end by a stand-in `soffice` script.

#![cfg(unix)]

use deck2pdf::backend::Backend;
use deck2pdf::supervisor::{RESULT_MARKER, WORKER_FAILED};
use deck2pdf::worker::headless::HeadlessConverter;
use deck2pdf::{
    ActiveBackend, CancelToken, ConvertError, ConverterConfig, IsolatedRoutine,
    ProcessSupervisor, SlideConverter,
};
use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn supervisor() -> ProcessSupervisor {
    let config = ConverterConfig::builder()
        .poll_interval_ms(20)
        .kill_grace_secs(1)
        .command_timeout_secs(10)
        .build()
        .unwrap();
    ProcessSupervisor::new(&config)
}

fn sh(script: &str) -> Vec<OsString> {
    vec!["sh".into(), "-c".into(), script.into()]
}

/// Routine whose "automation" is a shell snippet.
struct ShellRoutine(String);

impl IsolatedRoutine for ShellRoutine {
    fn name(&self) -> &str {
        "shell-routine"
    }

    fn command_line(&self, _input: &Path, _output: &Path) -> Vec<OsString> {
        sh(&self.0)
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ── Commands ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn captures_output_and_exit_code() {
    let out = supervisor()
        .run_cancellable_command(
            &sh("echo converted; echo 'font missing' >&2; exit 3"),
            Duration::from_secs(10),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(out.exit_code, Some(3));
    assert!(!out.success());
    assert_eq!(out.stdout.trim(), "converted");
    assert_eq!(out.diagnostic(), "font missing");
}

#[tokio::test]
async fn cancel_stops_a_hung_process() {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = supervisor()
        .run_cancellable_command(&sh("sleep 30"), Duration::from_secs(60), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn sigterm_ignoring_process_is_killed_after_grace() {
    let cancel = CancelToken::new();
    cancel.cancel();

    let started = Instant::now();
    let err = supervisor()
        .run_cancellable_command(
            &sh("trap '' TERM; while true; do sleep 1; done"),
            Duration::from_secs(60),
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn timeout_stops_the_process() {
    let err = supervisor()
        .run_cancellable_command(
            &sh("sleep 30"),
            Duration::from_millis(200),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::Timeout { .. }));
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let err = supervisor()
        .run_cancellable_command(
            &[OsString::from("/nonexistent/soffice")],
            Duration::from_secs(1),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::SpawnFailed { .. }));
}

// ── Isolated workers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn worker_error_report_is_surfaced() {
    let routine = ShellRoutine(format!(
        "echo 'opening deck'; echo '{RESULT_MARKER}{{\"error\":\"Presentation is password protected\"}}'; exit 1"
    ));
    let err = supervisor()
        .run_cancellable_worker(
            &routine,
            Path::new("a.pptx"),
            Path::new("a.pdf"),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Presentation is password protected");
}

#[tokio::test]
async fn worker_success_report_is_ok() {
    let routine = ShellRoutine(format!("echo '{RESULT_MARKER}{{\"error\":null}}'"));
    supervisor()
        .run_cancellable_worker(
            &routine,
            Path::new("a.pptx"),
            Path::new("a.pdf"),
            &CancelToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn worker_crash_without_report_is_generic_failure() {
    let routine = ShellRoutine("echo 'segfault' >&2; exit 139".into());
    let err = supervisor()
        .run_cancellable_worker(
            &routine,
            Path::new("a.pptx"),
            Path::new("a.pdf"),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), WORKER_FAILED);
}

#[tokio::test]
async fn cancelled_worker_reports_cancelled() {
    let routine = ShellRoutine("sleep 30".into());
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = supervisor()
        .run_cancellable_worker(&routine, Path::new("a.pptx"), Path::new("a.pdf"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

// ── Headless adapter with a stand-in soffice ─────────────────────────────────

/// Writes `<outdir>/<stem>.pdf` the way `soffice --convert-to pdf` does.
const FAKE_SOFFICE: &str = r#"
while [ $# -gt 2 ]; do shift; done
outdir="$1"
name=$(basename "$2")
printf '%%PDF-1.7 fake' > "$outdir/${name%.*}.pdf"
"#;

#[tokio::test]
async fn headless_converter_moves_pdf_to_requested_path() {
    let dir = tempfile::tempdir().unwrap();
    let soffice = write_script(dir.path(), "soffice", FAKE_SOFFICE);
    let input = dir.path().join("Q3 review.pptx");
    std::fs::write(&input, b"deck").unwrap();
    let output = dir.path().join("nested").join("temp_0.pdf");

    let converter = HeadlessConverter::new(
        ActiveBackend::new(Backend::LibreOffice, Some(soffice)),
        supervisor(),
    );
    converter
        .convert(&input, &output, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.7 fake");
}

#[tokio::test]
async fn headless_failure_carries_backend_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let soffice = write_script(
        dir.path(),
        "soffice",
        "echo 'Error: source file could not be loaded' >&2; exit 1",
    );
    let converter = HeadlessConverter::new(
        ActiveBackend::new(Backend::LibreOffice, Some(soffice)),
        supervisor(),
    );

    let err = converter
        .convert(
            &dir.path().join("broken.pptx"),
            &dir.path().join("out.pdf"),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "LibreOffice conversion failed: Error: source file could not be loaded"
    );
}

#[tokio::test]
async fn headless_success_without_pdf_is_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let editors = write_script(dir.path(), "desktopeditors", "exit 0");
    let converter = HeadlessConverter::new(
        ActiveBackend::new(Backend::OnlyOffice, Some(editors)),
        supervisor(),
    );

    let err = converter
        .convert(
            &dir.path().join("deck.odp"),
            &dir.path().join("out.pdf"),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::NoOutput {
            backend: Backend::OnlyOffice,
            ..
        }
    ));
    assert!(!dir.path().join("out.pdf").exists());
}
