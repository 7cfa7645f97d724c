//! Configuration constants for the downloader front-end
//!
//! This module contains application-wide values including executable names,
//! release locations and process management timings.

use std::time::Duration;

/// The current application version (keep in sync with Cargo.toml)
pub const APP_VERSION: &str = "1.4.0";

/// Directory name used for settings, logs and installed tools
pub const APP_DIR_NAME: &str = "ytdl-frontend";

/// Executable name of youtube-dl
#[cfg(windows)]
pub static YOUTUBE_DL_EXECUTABLE: &str = "youtube-dl.exe";
#[cfg(not(windows))]
pub static YOUTUBE_DL_EXECUTABLE: &str = "youtube-dl";

/// Executable name of yt-dlp
#[cfg(windows)]
pub static YT_DLP_EXECUTABLE: &str = "yt-dlp.exe";
#[cfg(not(windows))]
pub static YT_DLP_EXECUTABLE: &str = "yt-dlp";

/// Release asset for the current platform
#[cfg(windows)]
pub static YT_DLP_DOWNLOAD_URL: &str =
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe";
#[cfg(target_os = "macos")]
pub static YT_DLP_DOWNLOAD_URL: &str =
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos";
#[cfg(not(any(windows, target_os = "macos")))]
pub static YT_DLP_DOWNLOAD_URL: &str =
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp";

/// GitHub API endpoints used for release checks
pub static YT_DLP_LATEST_RELEASE_API: &str =
    "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest";
pub static YOUTUBE_DL_LATEST_RELEASE_API: &str =
    "https://api.github.com/repos/ytdl-org/youtube-dl/releases/latest";

/// Anything smaller than this is an error page, not a binary
pub static MIN_TOOL_BINARY_BYTES: u64 = 1024 * 1024;

/// Default output file name template
pub static DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Time a child gets to exit after a graceful stop request
pub static ABORT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Poll interval while waiting on a child process
pub static PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Maximum number of raw output lines kept in memory per download
pub static MAX_OUTPUT_LOG_LINES: usize = 5000;
