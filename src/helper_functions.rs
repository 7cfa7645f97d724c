//! Common utility functions and validation helpers
//!
//! This module provides string formatting, output path handling and input
//! validation used throughout the application.

use std::path::{Path, PathBuf};

use crate::progress::ProgressSnapshot;

/// Common utility functions used throughout the application
pub struct Utils;

impl Utils {
    /// Truncate a string to a maximum number of characters, adding ellipsis if needed
    pub fn truncate_string(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }

    /// Percentage text for a fraction, "--%" while indeterminate
    pub fn format_progress(percentage: Option<f64>) -> String {
        match percentage {
            Some(p) => format!("{:.1}%", (p * 100.0).clamp(0.0, 100.0)),
            None => "--%".to_string(),
        }
    }

    /// One-line summary of a progress snapshot
    pub fn format_snapshot(snapshot: &ProgressSnapshot) -> String {
        let mut parts = vec![Self::format_progress(snapshot.percentage)];
        if !snapshot.file_size.is_empty() {
            parts.push(format!("of {}", snapshot.file_size));
        }
        if !snapshot.speed.is_empty() {
            parts.push(format!("at {}", snapshot.speed));
        }
        if !snapshot.eta.is_empty() {
            parts.push(format!("ETA {}", snapshot.eta));
        }
        parts.join(" ")
    }

    /// Join the output directory and the file name template for `-o`
    pub fn output_template_path(output_dir: &Path, template: &str) -> PathBuf {
        output_dir.join(template)
    }

    /// Render a command line for display, quoting arguments with spaces
    pub fn format_command_line(program: &str, args: &[String]) -> String {
        std::iter::once(program.to_string())
            .chain(args.iter().map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("\"{}\"", a)
                } else {
                    a.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Input validation utilities
pub struct Validation;

impl Validation {
    /// Validate that a folder path exists and is a directory
    pub fn is_valid_folder(path: &str) -> bool {
        if path.is_empty() {
            return false;
        }

        let path = Path::new(path);
        path.exists() && path.is_dir()
    }

    /// Loose check that a link looks like something the downloader accepts
    pub fn is_valid_url(url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || url.contains(char::is_whitespace) {
            return false;
        }
        match url.split_once("://") {
            Some((scheme, rest)) => {
                matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https") && !rest.is_empty()
            }
            // bare video ids and "ytsearch:" style queries are passed through
            None => !url.starts_with('-'),
        }
    }
}
