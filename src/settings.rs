//! Application settings and persistence management
//!
//! This module handles loading, saving, and managing user preferences,
//! including the user's own presets, that persist between sessions.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{APP_DIR_NAME, DEFAULT_OUTPUT_TEMPLATE};
use crate::data_structures::{Backend, DownloadOptions, Preset};
use crate::error::Result;

/// Application settings that persist between sessions
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub backend: Backend,
    pub youtube_dl_path: Option<PathBuf>,
    pub yt_dlp_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_template: String,
    pub add_metadata: bool,
    pub embed_thumbnail: bool,
    pub subtitles: bool,
    pub playlist: bool,
    pub ffmpeg_location: Option<PathBuf>,
    pub global_args: Vec<String>,
    pub selected_preset: Option<String>,
    pub custom_presets: Vec<Preset>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            youtube_dl_path: None,
            yt_dlp_path: None,
            output_dir: dirs::download_dir(),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            add_metadata: true,
            embed_thumbnail: false,
            subtitles: false,
            playlist: false,
            ffmpeg_location: None,
            global_args: Vec::new(),
            selected_preset: None,
            custom_presets: Vec::new(),
        }
    }
}

impl Settings {
    /// Get the path where settings are stored
    pub fn get_path() -> std::io::Result<PathBuf> {
        Ok(config_dir()?.join("settings.json"))
    }

    /// Load settings from a file, falling back to defaults.
    ///
    /// A file that exists but does not parse is moved to `<name>.bak`
    /// before the defaults are returned.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    info!("Settings loaded from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings file: {}. Using defaults.", e);
                    let backup = backup_path(path);
                    match std::fs::rename(path, &backup) {
                        Ok(()) => warn!("Unreadable settings moved to {}", backup.display()),
                        Err(e) => warn!("Failed to move unreadable settings aside: {}", e),
                    }
                    Settings::default()
                }
            },
            Err(e) => {
                debug!("Settings file not found or unreadable: {}. Using defaults.", e);
                Settings::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Executable override configured for a backend
    pub fn executable_override(&self, backend: Backend) -> Option<&Path> {
        match backend {
            Backend::YoutubeDl => self.youtube_dl_path.as_deref(),
            Backend::YtDlp => self.yt_dlp_path.as_deref(),
        }
    }

    /// Session toggles for the next download
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            output_dir: self.output_dir.clone(),
            output_template: self.output_template.clone(),
            add_metadata: self.add_metadata,
            embed_thumbnail: self.embed_thumbnail,
            subtitles: self.subtitles,
            playlist: self.playlist,
            ffmpeg_location: self.ffmpeg_location.clone(),
            global_args: self.global_args.clone(),
        }
    }
}

/// Where an unreadable settings file is moved to
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

/// Per-platform directory holding settings and installed tools
pub fn config_dir() -> std::io::Result<PathBuf> {
    #[cfg(windows)]
    {
        let exe_path = std::env::current_exe()?;
        let exe_dir = exe_path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Failed to get executable directory")
        })?;
        Ok(exe_dir.to_path_buf())
    }

    #[cfg(target_os = "macos")]
    {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Failed to get home directory")
        })?;
        let app_support = home_dir.join("Library/Application Support").join(APP_DIR_NAME);
        std::fs::create_dir_all(&app_support)?;
        Ok(app_support)
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        // XDG config directory, falling back to a dot directory in home
        let app_dir = match xdg::BaseDirectories::new() {
            Ok(xdg_dirs) => xdg_dirs.get_config_home().join(APP_DIR_NAME),
            Err(_) => {
                let home_dir = dirs::home_dir().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "Failed to get home directory")
                })?;
                home_dir.join(format!(".{}", APP_DIR_NAME))
            }
        };
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir)
    }
}
