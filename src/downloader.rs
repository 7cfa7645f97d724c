//! Running the downloader as a child process
//!
//! Builds the full command line (global arguments, compiled preset, URL),
//! spawns the backend, streams both output pipes through the progress parser
//! and supports a graceful abort.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::config::{ABORT_GRACE_PERIOD, PROCESS_POLL_INTERVAL};
use crate::data_structures::{DownloadOptions, DownloadStatus, Preset};
use crate::error::{AppError, Result};
use crate::helper_functions::Utils;
use crate::progress::{ProgressSnapshot, SharedProgress};
use crate::tool_manager::ToolManager;

/// Arguments derived from the session toggles, placed before the preset
pub fn global_arguments(options: &DownloadOptions) -> Vec<String> {
    let mut args = vec!["--newline".to_string()];

    if let Some(dir) = &options.output_dir {
        args.push("-o".to_string());
        args.push(
            Utils::output_template_path(dir, &options.output_template)
                .to_string_lossy()
                .into_owned(),
        );
    }
    if options.add_metadata {
        args.push("--add-metadata".to_string());
    }
    if options.embed_thumbnail {
        args.push("--embed-thumbnail".to_string());
    }
    if options.subtitles {
        args.push("--write-sub".to_string());
        args.push("--embed-subs".to_string());
    }
    args.push(if options.playlist { "--yes-playlist" } else { "--no-playlist" }.to_string());
    if let Some(ffmpeg) = &options.ffmpeg_location {
        args.push("--ffmpeg-location".to_string());
        args.push(ffmpeg.to_string_lossy().into_owned());
    }
    args.extend(options.global_args.iter().cloned());
    args
}

/// Full argument list: global arguments, preset arguments, then the URL
pub fn build_arguments(options: &DownloadOptions, preset: &Preset, url: &str) -> Vec<String> {
    let mut args = global_arguments(options);
    args.extend(preset.to_args());
    args.push(url.to_string());
    args
}

/// Starts downloads with one backend executable
#[derive(Clone, Debug)]
pub struct Downloader {
    executable: PathBuf,
}

impl Downloader {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Assemble the arguments for `url` and start the download
    pub fn download(&self, options: &DownloadOptions, preset: &Preset, url: &str) -> Result<DownloadHandle> {
        info!("Starting download of {} with preset '{}'", url, preset.display_name());
        self.start(build_arguments(options, preset, url))
    }

    /// Spawn the backend with a ready-made argument list
    pub fn start(&self, args: Vec<String>) -> Result<DownloadHandle> {
        let program = self.executable.display().to_string();
        debug!("Running {}", Utils::format_command_line(&program, &args));

        let mut command: Command = ToolManager::command(&self.executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::ToolNotFound { tool: program.clone() }
            } else {
                AppError::Io(e)
            }
        })?;

        let progress = SharedProgress::new();
        let status = Arc::new(Mutex::new(DownloadStatus::Pending));
        let readers = spawn_readers(&mut child, &progress, &status);
        let readers = reap_on_error(&mut child, readers)?;
        info!("Started {} (pid {})", program, child.id());

        Ok(DownloadHandle {
            program,
            abort: AbortHandle {
                child: Arc::new(Mutex::new(child)),
                aborted: Arc::new(AtomicBool::new(false)),
                finished: Arc::new(AtomicBool::new(false)),
            },
            progress,
            status,
            readers,
        })
    }
}

fn spawn_readers(
    child: &mut Child,
    progress: &SharedProgress,
    status: &Arc<Mutex<DownloadStatus>>,
) -> Result<Vec<thread::JoinHandle<()>>> {
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, "stdout", progress.clone(), status.clone())?);
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, "stderr", progress.clone(), status.clone())?);
    }
    Ok(readers)
}

/// Kill and reap the child when setting up its download failed
fn reap_on_error<T>(child: &mut Child, result: Result<T>) -> Result<T> {
    if result.is_err() {
        warn!("Stopping downloader (pid {}) after a setup failure", child.id());
        let _ = child.kill();
        let _ = child.wait();
    }
    result
}

/// Feed one output pipe into the shared progress.
///
/// Both `\r` and `\n` end a line, so progress rewritten in place is seen as
/// it arrives even when `--newline` is not honoured.
fn spawn_reader<R>(
    stream: R,
    name: &'static str,
    progress: SharedProgress,
    status: Arc<Mutex<DownloadStatus>>,
) -> Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("download-{}", name))
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut line = Vec::new();
            loop {
                let chunk = match reader.fill_buf() {
                    Ok([]) => break,
                    Ok(chunk) => chunk,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Failed to read downloader {}: {}", name, e);
                        break;
                    }
                };
                let consumed = chunk.len();
                for &byte in chunk {
                    if byte == b'\r' || byte == b'\n' {
                        emit_line(&mut line, name, &progress, &status);
                    } else {
                        line.push(byte);
                    }
                }
                reader.consume(consumed);
            }
            emit_line(&mut line, name, &progress, &status);
        })?;
    Ok(handle)
}

fn emit_line(line: &mut Vec<u8>, name: &str, progress: &SharedProgress, status: &Mutex<DownloadStatus>) {
    if line.is_empty() {
        return;
    }
    {
        // first output marks the download as running
        let mut status = status.lock().unwrap_or_else(|p| p.into_inner());
        if *status == DownloadStatus::Pending {
            *status = DownloadStatus::Running;
        }
    }
    let text = String::from_utf8_lossy(line).into_owned();
    debug!("{}: {}", name, text);
    progress.handle_line(&text);
    line.clear();
}

/// Result of a finished download
#[derive(Clone, Debug)]
pub struct DownloadOutcome {
    pub status: DownloadStatus,
    pub exit_code: Option<i32>,
    pub progress: ProgressSnapshot,
    /// Raw output of both pipes in arrival order
    pub output: Vec<String>,
}

/// Cloneable handle that can stop a running download from any thread
#[derive(Clone, Debug)]
pub struct AbortHandle {
    child: Arc<Mutex<Child>>,
    aborted: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl AbortHandle {
    fn lock_child(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Ask the downloader to stop, killing it after a grace period.
    ///
    /// Returns `false` when the downloader had already exited.
    pub fn abort(&self) -> Result<bool> {
        let mut child = self.lock_child();
        if self.finished.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if child.try_wait()?.is_some() {
            self.finished.store(true, Ordering::SeqCst);
            return Ok(false);
        }
        self.aborted.store(true, Ordering::SeqCst);
        info!("Aborting download (pid {})", child.id());

        if request_graceful_stop(&child) {
            let deadline = Instant::now() + ABORT_GRACE_PERIOD;
            while Instant::now() < deadline {
                if child.try_wait()?.is_some() {
                    debug!("Downloader stopped gracefully");
                    return Ok(true);
                }
                thread::sleep(PROCESS_POLL_INTERVAL);
            }
            warn!("Downloader ignored the stop request, killing it");
        }

        match child.kill() {
            Ok(()) => {}
            // exited between the last poll and the kill
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e.into()),
        }
        let _ = child.wait();
        Ok(true)
    }
}

fn request_graceful_stop(child: &Child) -> bool {
    let pid = child.id().to_string();

    #[cfg(unix)]
    {
        let status = Command::new("kill").args(["-INT", &pid]).status();
        status.map(|result| result.success()).unwrap_or(false)
    }

    #[cfg(windows)]
    {
        // without /F taskkill asks the process tree to close
        let status = ToolManager::command("taskkill").args(["/PID", &pid, "/T"]).status();
        status.map(|result| result.success()).unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        false
    }
}

/// A running download
#[derive(Debug)]
pub struct DownloadHandle {
    program: String,
    abort: AbortHandle,
    progress: SharedProgress,
    status: Arc<Mutex<DownloadStatus>>,
    readers: Vec<thread::JoinHandle<()>>,
}

impl DownloadHandle {
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn subscribe(&self) -> std::sync::mpsc::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Raw lines received so far from both pipes, in arrival order
    pub fn output_log(&self) -> Vec<String> {
        self.progress.output_log()
    }

    pub fn status(&self) -> DownloadStatus {
        self.status.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort(&self) -> Result<bool> {
        let stopped = self.abort.abort()?;
        if stopped {
            self.set_status(DownloadStatus::Aborted);
        }
        Ok(stopped)
    }

    fn set_status(&self, status: DownloadStatus) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }

    /// Block until the process exits and both pipes are drained
    pub fn wait(self) -> Result<DownloadOutcome> {
        let exit = loop {
            {
                let mut child = self.abort.lock_child();
                if let Some(exit) = child.try_wait()? {
                    self.abort.finished.store(true, Ordering::SeqCst);
                    break exit;
                }
            }
            thread::sleep(PROCESS_POLL_INTERVAL);
        };

        for reader in self.readers {
            if reader.join().is_err() {
                error!("Output reader for {} panicked", self.program);
            }
        }

        let status = if self.abort.is_aborted() {
            DownloadStatus::Aborted
        } else if exit.success() {
            DownloadStatus::Finished
        } else {
            match exit.code() {
                Some(code) => DownloadStatus::Failed(format!("exit code {}", code)),
                None => DownloadStatus::Failed("terminated by signal".to_string()),
            }
        };
        info!("{} finished: {}", self.program, status);
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status.clone();

        Ok(DownloadOutcome {
            status,
            exit_code: exit.code(),
            progress: self.progress.snapshot(),
            output: self.progress.output_log(),
        })
    }
}
