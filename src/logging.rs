//! Asynchronous logging system for the downloader front-end
//!
//! Records from the `log` macros are written to a log file by a background
//! thread, so a chatty download never blocks on disk writes. The same records
//! are offered to an `env_logger` console logger, filtered by `RUST_LOG`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

use crate::config::APP_DIR_NAME;
use crate::error::{AppError, Result};

/// Messages understood by the writer thread
enum LogMessage {
    Line(String),
    Shutdown,
}

/// Asynchronous logger that writes to file without blocking the caller
pub struct AsyncLogger {
    sender: Mutex<mpsc::Sender<LogMessage>>,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
    console: env_logger::Logger,
    path: PathBuf,
}

impl AsyncLogger {
    /// Create a new async logger appending to `log_path`
    pub fn new(log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || write_loop(log_file, rx))?;

        let console = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp(None)
            .build();

        Ok(AsyncLogger {
            sender: Mutex::new(tx),
            handle: Mutex::new(Some(handle)),
            console,
            path: log_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&self, msg: LogMessage) {
        if let Ok(sender) = self.sender.lock() {
            // writer gone means we are shutting down; drop the message
            let _ = sender.send(msg);
        }
    }

    /// Flush pending lines and stop the writer thread
    pub fn shutdown(&self) {
        self.send(LogMessage::Shutdown);
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn write_loop(log_file: std::fs::File, rx: mpsc::Receiver<LogMessage>) {
    let mut file = std::io::BufWriter::new(log_file);
    while let Ok(msg) = rx.recv() {
        let mut pending = vec![msg];
        // batch whatever else is already queued
        while let Ok(more) = rx.try_recv() {
            pending.push(more);
        }
        for msg in pending {
            match msg {
                LogMessage::Line(line) => {
                    let _ = writeln!(file, "{}", line);
                }
                LogMessage::Shutdown => {
                    let _ = file.flush();
                    return;
                }
            }
        }
        let _ = file.flush();
    }
    let _ = file.flush();
}

fn file_enabled(metadata: &Metadata) -> bool {
    // our own debug output is kept, dependencies only from info up
    if metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
        metadata.level() <= LevelFilter::Debug
    } else {
        metadata.level() <= LevelFilter::Info
    }
}

impl Log for AsyncLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        file_enabled(metadata) || self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if file_enabled(record.metadata()) {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let line = format!(
                "[{} {} {}:{}] {}",
                record.level(),
                timestamp,
                record.file().unwrap_or(record.target()),
                record.line().unwrap_or(0),
                record.args()
            );
            self.send(LogMessage::Line(line));
        }
        if self.console.matches(record) {
            self.console.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

// Global logger instance
static LOGGER: OnceCell<AsyncLogger> = OnceCell::new();

/// Default location of the log file
pub fn default_log_path() -> std::io::Result<PathBuf> {
    #[cfg(windows)]
    {
        let exe_path = std::env::current_exe()?;
        let exe_dir = exe_path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Failed to get executable directory")
        })?;
        Ok(exe_dir.join(format!("{}_log.txt", APP_DIR_NAME)))
    }

    #[cfg(not(windows))]
    {
        // XDG cache directory, falling back to a dot directory in home
        match xdg::BaseDirectories::new() {
            Ok(xdg_dirs) => Ok(xdg_dirs
                .get_cache_home()
                .join(APP_DIR_NAME)
                .join(format!("{}.log", APP_DIR_NAME))),
            Err(_) => {
                let home_dir = dirs::home_dir().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "Failed to get home directory")
                })?;
                Ok(home_dir
                    .join(format!(".{}", APP_DIR_NAME))
                    .join(format!("{}.log", APP_DIR_NAME)))
            }
        }
    }
}

/// Install the global logger; returns the log file in use.
///
/// Calling it again keeps the first logger.
pub fn setup_logging(log_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(existing) = LOGGER.get() {
        return Ok(existing.path().to_path_buf());
    }
    let path = match log_path {
        Some(path) => path,
        None => default_log_path()?,
    };
    let logger = AsyncLogger::new(&path).map_err(|e| AppError::Logging {
        path: path.clone(),
        message: e.to_string(),
    })?;
    let logger = LOGGER.get_or_init(|| logger);
    log::set_logger(logger).map_err(|e| AppError::Logging {
        path: path.clone(),
        message: e.to_string(),
    })?;
    log::set_max_level(LevelFilter::Debug);
    Ok(logger.path().to_path_buf())
}

/// Flush and stop the global logger
pub fn shutdown_logging() {
    if let Some(logger) = LOGGER.get() {
        logger.shutdown();
    }
}
