//! Downloader executable discovery, version checks and installation
//!
//! This module finds the youtube-dl / yt-dlp binary to run, queries its
//! version and fetches or updates yt-dlp when asked to.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use log::{debug, info, warn};

use crate::config::{
    MIN_TOOL_BINARY_BYTES, YOUTUBE_DL_LATEST_RELEASE_API, YT_DLP_DOWNLOAD_URL,
    YT_DLP_LATEST_RELEASE_API,
};
use crate::data_structures::Backend;
use crate::error::{AppError, Result};
use crate::settings::config_dir;

/// Downloader tool discovery and management utilities
pub struct ToolManager;

impl ToolManager {
    /// Directory where installed tools live
    pub fn tools_dir() -> std::io::Result<PathBuf> {
        Ok(config_dir()?.join("tools"))
    }

    /// Find the executable for a backend.
    ///
    /// An explicit override wins, then PATH, then the tools directory.
    pub fn locate(backend: Backend, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = override_path {
            if path.is_file() {
                debug!("Using configured {} at {}", backend, path.display());
                return Ok(path.to_path_buf());
            }
            warn!("Configured {} path {} does not exist", backend, path.display());
        }

        if let Ok(path) = which::which(backend.executable_name()) {
            debug!("Found {} on PATH at {}", backend, path.display());
            return Ok(path);
        }

        if let Ok(dir) = Self::tools_dir() {
            let candidate = dir.join(backend.executable_name());
            if candidate.is_file() {
                debug!("Found installed {} at {}", backend, candidate.display());
                return Ok(candidate);
            }
        }

        Err(AppError::ToolNotFound {
            tool: backend.executable_name().to_string(),
        })
    }

    /// Build a command that does not pop up a console window on Windows
    pub fn command(program: impl AsRef<OsStr>) -> Command {
        let mut command = Command::new(program);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(0x08000000); // CREATE_NO_WINDOW
        }

        // keep Python based tools from buffering their output
        command.env("PYTHONUNBUFFERED", "1");
        command.env("PYTHONIOENCODING", "utf-8");
        command
    }

    /// Run a command with hidden console window and captured output
    pub fn run_command_hidden(program: &Path, args: &[&str]) -> std::io::Result<Output> {
        let mut command = Self::command(program);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.output()
    }

    /// Version string reported by the executable
    pub fn version(executable: &Path) -> Result<String> {
        let output = Self::run_command_hidden(executable, &["--version"])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(AppError::ToolFailed {
                tool: executable.display().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let version = stdout.lines().next().unwrap_or("").trim().to_string();
        debug!("{} --version: {}", executable.display(), version);
        Ok(version)
    }

    /// Ask the tool to replace itself with the latest release
    pub fn self_update(backend: Backend, executable: &Path) -> Result<String> {
        if backend == Backend::YoutubeDl {
            return Err(AppError::Unsupported("self update".to_string()));
        }
        info!("Updating {} at {}", backend, executable.display());
        let output = Self::run_command_hidden(executable, &["-U"])?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            return Err(AppError::ToolFailed {
                tool: executable.display().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(stdout)
    }

    /// Download the latest yt-dlp release into `dir`
    pub fn install_latest(backend: Backend, dir: &Path) -> Result<PathBuf> {
        if backend == Backend::YoutubeDl {
            return Err(AppError::Unsupported("automatic install".to_string()));
        }
        std::fs::create_dir_all(dir)?;
        let target = dir.join(backend.executable_name());
        info!("Downloading {} to {}", YT_DLP_DOWNLOAD_URL, target.display());

        let client = reqwest::blocking::Client::new();
        let response = client
            .get(YT_DLP_DOWNLOAD_URL)
            .header("User-Agent", concat!("ytdl-frontend/", env!("CARGO_PKG_VERSION")))
            .send()?
            .error_for_status()?;
        let bytes = response.bytes()?;
        if (bytes.len() as u64) < MIN_TOOL_BINARY_BYTES {
            return Err(AppError::InstallFailed(format!(
                "downloaded {} is unexpectedly small ({} bytes)",
                backend,
                bytes.len()
            )));
        }

        // write beside the target, then rename over it
        let partial = target.with_extension("part");
        {
            let mut file = std::fs::File::create(&partial)?;
            file.write_all(&bytes)?;
            file.flush()?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o755))?;
        }
        std::fs::rename(&partial, &target)?;
        info!("Installed {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }

    /// Latest published release tag for a backend
    pub fn latest_release(backend: Backend) -> Result<String> {
        let url = match backend {
            Backend::YoutubeDl => YOUTUBE_DL_LATEST_RELEASE_API,
            Backend::YtDlp => YT_DLP_LATEST_RELEASE_API,
        };
        let client = reqwest::blocking::Client::new();
        let json: serde_json::Value = client
            .get(url)
            .header("User-Agent", "ytdl-frontend-version-check")
            .send()?
            .error_for_status()?
            .json()?;
        json.get("tag_name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::InstallFailed("No tag_name in release response".to_string()))
    }

    /// Compare two version strings (ignoring 'v' prefix). Returns true if current < latest.
    pub fn is_outdated(current: &str, latest: &str) -> bool {
        let parse = |s: &str| {
            s.trim()
                .trim_start_matches('v')
                .split('.')
                .map(|x| x.parse::<u32>().unwrap_or(0))
                .collect::<Vec<_>>()
        };
        let c = parse(current);
        let l = parse(latest);
        for (a, b) in c.iter().zip(l.iter()) {
            if a < b {
                return true;
            }
            if a > b {
                return false;
            }
        }
        c.len() < l.len() // e.g. 2024.08.06 < 2024.08.06.1
    }
}
