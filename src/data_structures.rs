//! Data structures and types for the downloader front-end
//!
//! This module contains the core data structures including backends, presets,
//! per-download options and status values shared throughout the application.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_OUTPUT_TEMPLATE, YOUTUBE_DL_EXECUTABLE, YT_DLP_EXECUTABLE};

/// One of the supported downloader command-line tools
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    #[serde(rename = "youtube-dl")]
    YoutubeDl,
    #[serde(rename = "yt-dlp")]
    YtDlp,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::YoutubeDl, Backend::YtDlp];

    /// Name of the executable looked up on PATH
    pub fn executable_name(self) -> &'static str {
        match self {
            Backend::YoutubeDl => YOUTUBE_DL_EXECUTABLE,
            Backend::YtDlp => YT_DLP_EXECUTABLE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::YoutubeDl => "youtube-dl",
            Backend::YtDlp => "yt-dlp",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Backend::YoutubeDl => 0b01,
            Backend::YtDlp => 0b10,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::YtDlp
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube-dl" | "youtube_dl" | "youtubedl" => Ok(Backend::YoutubeDl),
            "yt-dlp" | "yt_dlp" | "ytdlp" => Ok(Backend::YtDlp),
            other => Err(format!("unknown backend '{}' (expected youtube-dl or yt-dlp)", other)),
        }
    }
}

/// Set of backends a preset can be used with
///
/// Serialized as a list of backend names so settings files stay readable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Backend>", into = "Vec<Backend>")]
pub struct BackendSupport(u8);

impl BackendSupport {
    pub const NONE: BackendSupport = BackendSupport(0);
    pub const YOUTUBE_DL: BackendSupport = BackendSupport(0b01);
    pub const YT_DLP: BackendSupport = BackendSupport(0b10);
    pub const ALL: BackendSupport = BackendSupport(0b11);

    pub fn contains(self, backend: Backend) -> bool {
        self.0 & backend.bit() != 0
    }

    pub fn insert(&mut self, backend: Backend) {
        self.0 |= backend.bit();
    }

    pub fn union(self, other: BackendSupport) -> BackendSupport {
        BackendSupport(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn backends(self) -> Vec<Backend> {
        Backend::ALL.into_iter().filter(|b| self.contains(*b)).collect()
    }
}

impl Default for BackendSupport {
    fn default() -> Self {
        BackendSupport::ALL
    }
}

impl From<Backend> for BackendSupport {
    fn from(backend: Backend) -> Self {
        BackendSupport(backend.bit())
    }
}

impl From<Vec<Backend>> for BackendSupport {
    fn from(backends: Vec<Backend>) -> Self {
        let mut support = BackendSupport::NONE;
        for backend in backends {
            support.insert(backend);
        }
        support
    }
}

impl From<BackendSupport> for Vec<Backend> {
    fn from(support: BackendSupport) -> Self {
        support.backends()
    }
}

impl fmt::Display for BackendSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.backends().into_iter().map(Backend::as_str).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}

/// A named, reusable bundle of format/container/extra-argument choices
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub name: Option<String>,
    pub format_arg: Option<String>,
    pub container_arg: Option<String>,
    pub supported_backends: BackendSupport,
    pub is_predefined: bool,
    pub extra_args: Vec<String>,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            name: None,
            format_arg: None,
            container_arg: None,
            supported_backends: BackendSupport::ALL,
            is_predefined: false,
            extra_args: Vec::new(),
        }
    }
}

/// Status of a single download
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Running,
    Finished,
    Aborted,
    Failed(String),
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Finished | DownloadStatus::Aborted | DownloadStatus::Failed(_)
        )
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStatus::Pending => f.write_str("Pending"),
            DownloadStatus::Running => f.write_str("Running"),
            DownloadStatus::Finished => f.write_str("Finished"),
            DownloadStatus::Aborted => f.write_str("Aborted"),
            DownloadStatus::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

/// Session toggles that turn into global downloader arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadOptions {
    pub output_dir: Option<PathBuf>,
    pub output_template: String,
    pub add_metadata: bool,
    pub embed_thumbnail: bool,
    pub subtitles: bool,
    pub playlist: bool,
    pub ffmpeg_location: Option<PathBuf>,
    pub global_args: Vec<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            add_metadata: true,
            embed_thumbnail: false,
            subtitles: false,
            playlist: false,
            ffmpeg_location: None,
            global_args: Vec::new(),
        }
    }
}
