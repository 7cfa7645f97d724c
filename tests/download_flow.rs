//! End-to-end runs against a fake downloader script
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use ytdl_frontend::{build_arguments, DownloadOptions, DownloadStatus, Downloader, Preset};

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-downloader.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    path
}

/// Run the script through sh so the test never execs a freshly written file
fn start(script: &Path, args: Vec<String>) -> ytdl_frontend::DownloadHandle {
    let mut full = vec![script.display().to_string()];
    full.extend(args);
    Downloader::new("/bin/sh").start(full).unwrap()
}

#[test]
fn progress_is_parsed_from_both_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        r#"echo "args: $*"
echo "[youtube] abc: Downloading webpage"
echo "[download]   0.0% of 36.35MiB at 20.40KiB/s ETA 30:24"
echo "WARNING: falling back to generic extractor" 1>&2
printf '[download]  65.1%% of 36.35MiB at  2.81MiB/s ETA 00:04\r'
printf '[download] 100%% of 36.35MiB in 00:10\n'
exit 0"#,
    );

    let options = DownloadOptions {
        output_dir: None,
        add_metadata: false,
        ..DownloadOptions::default()
    };
    let preset = Preset::new(Some("testName"), Some("248+251"), None);
    let handle = start(&script, build_arguments(&options, &preset, "URL"));
    let outcome = handle.wait().unwrap();

    assert_eq!(outcome.status, DownloadStatus::Finished);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.progress.percentage, Some(1.0));
    assert_eq!(outcome.progress.file_size, "36.35MiB");
    assert_eq!(outcome.progress.speed, "2.81MiB/s");
    assert_eq!(outcome.progress.eta, "00:04");

    assert!(outcome
        .output
        .iter()
        .any(|l| l == "args: --newline --no-playlist -f 248+251 URL"));
    assert!(outcome.output.iter().any(|l| l.starts_with("WARNING:")));
    assert!(outcome.output.iter().any(|l| l == "[youtube] abc: Downloading webpage"));
    assert_eq!(outcome.output.len(), 6);
}

#[test]
fn non_zero_exit_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), r#"echo "ERROR: Unsupported URL: nope" 1>&2
exit 2"#);

    let outcome = start(&script, vec!["nope".into()]).wait().unwrap();

    assert_eq!(outcome.status, DownloadStatus::Failed("exit code 2".into()));
    assert_eq!(outcome.exit_code, Some(2));
    assert!(outcome.progress.percentage.is_none());
    assert_eq!(outcome.output, vec!["ERROR: Unsupported URL: nope".to_string()]);
}

#[test]
fn abort_stops_a_running_download() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        r#"trap 'echo "interrupted"; exit 130' INT
echo "[download]   1.0% of 10.00MiB at 1.00MiB/s ETA 00:09"
sleep 30 >/dev/null 2>&1 &
wait"#,
    );

    let handle = start(&script, Vec::new());
    let updates = handle.subscribe();
    let first = updates.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(first.eta, "00:09");
    assert_eq!(handle.status(), DownloadStatus::Running);

    let started = Instant::now();
    let abort = handle.abort_handle();
    assert!(handle.abort().unwrap());
    assert_eq!(handle.status(), DownloadStatus::Aborted);

    let outcome = handle.wait().unwrap();
    assert_eq!(outcome.status, DownloadStatus::Aborted);
    assert!(started.elapsed() < Duration::from_secs(20));

    // already waited for, nothing left to stop
    assert!(!abort.abort().unwrap());
}

#[test]
fn abort_after_a_clean_exit_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        r#"echo "[download] 100% of 1.00MiB in 00:01"
exit 0"#,
    );

    let handle = start(&script, Vec::new());
    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.output_log().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    // let the shell exit after its last line
    thread::sleep(Duration::from_millis(500));

    assert!(!handle.abort().unwrap());
    assert_eq!(handle.status(), DownloadStatus::Running);

    let outcome = handle.wait().unwrap();
    assert_eq!(outcome.status, DownloadStatus::Finished);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.progress.percentage, Some(1.0));
}

#[test]
fn silent_download_stays_pending_until_output() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        r#"sleep 1
echo "[download]  10.0% of 5.00MiB at 1.00MiB/s ETA 00:04""#,
    );

    let handle = start(&script, Vec::new());
    assert_eq!(handle.status(), DownloadStatus::Pending);

    let outcome = handle.wait().unwrap();
    assert_eq!(outcome.status, DownloadStatus::Finished);
    assert_eq!(outcome.progress.eta, "00:04");
}

#[test]
fn carriage_return_updates_arrive_before_the_newline() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        r#"printf '[download]  42.0%% of 5.00MiB at 1.00MiB/s ETA 00:03\r'
sleep 2
printf '\n'"#,
    );

    let handle = start(&script, Vec::new());
    let deadline = Instant::now() + Duration::from_millis(1500);
    while handle.progress().percentage.is_none() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(handle.progress().percentage, Some(0.42));
    assert_eq!(handle.status(), DownloadStatus::Running);

    let outcome = handle.wait().unwrap();
    assert_eq!(outcome.status, DownloadStatus::Finished);
    assert_eq!(outcome.output.len(), 1);
}
