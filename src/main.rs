//! ytdl-frontend - Downloader Front-end
//!
//! A command-line front-end for youtube-dl and yt-dlp with reusable presets
//! and live progress reporting.

use std::process;

use clap::Parser;
use log::info;

use ytdl_frontend::cli::Args;
use ytdl_frontend::{setup_logging, shutdown_logging, APP_VERSION};

/// Initialize the application logging
fn initialize_app() {
    match setup_logging(None) {
        Ok(path) => info!("Starting ytdl-frontend {} (log: {})", APP_VERSION, path.display()),
        Err(e) => eprintln!("Failed to initialize logging: {}", e),
    }
}

/// Cleanup resources when the application exits
fn cleanup_on_exit() {
    shutdown_logging();
}

fn main() {
    let args = Args::parse();
    initialize_app();

    let result = args.execute();
    if let Err(e) = &result {
        info!("Exiting with error: {}", e);
    }
    cleanup_on_exit();

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
