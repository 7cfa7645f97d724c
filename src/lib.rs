//! ytdl-frontend - Downloader Front-end Library
//!
//! This library provides the core functionality for driving youtube-dl and
//! yt-dlp: compiling presets into command-line arguments, running the
//! downloader and tracking its progress output.

pub mod cli;
pub mod config;
pub mod data_structures;
pub mod downloader;
pub mod error;
pub mod helper_functions;
pub mod logging;
pub mod presets;
pub mod progress;
pub mod settings;
pub mod tool_manager;

// Re-export commonly used items
pub use config::*;
pub use data_structures::*;
pub use downloader::*;
pub use error::{AppError, Result};
pub use helper_functions::*;
pub use logging::{setup_logging, shutdown_logging};
pub use presets::*;
pub use progress::*;
pub use settings::Settings;
pub use tool_manager::ToolManager;
