//! Progress tracking for a running download
//!
//! The downloader reports progress as plain text lines such as
//! `[download]  65.1% of 36.35MiB at  2.81MiB/s ETA 00:04`. Lines that do not
//! have that shape are ignored and leave the previous values in place.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::MAX_OUTPUT_LOG_LINES;

const DOWNLOAD_PREFIX: &str = "[download] ";
const PERCENT_OF: &str = "% of ";
const SPEED_MARKER: &str = " at ";
const ETA_MARKER: &str = " ETA ";
const ELAPSED_MARKER: &str = " in ";

/// Latest known progress values
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Fraction in `0.0..=1.0`, `None` while indeterminate
    pub percentage: Option<f64>,
    pub file_size: String,
    pub speed: String,
    pub eta: String,
}

impl ProgressSnapshot {
    pub fn is_indeterminate(&self) -> bool {
        self.percentage.is_none()
    }

    /// Apply one line of downloader output.
    ///
    /// Returns `true` when the line carried a percentage. A line whose
    /// percentage does not parse changes nothing at all.
    pub fn parse_line(&mut self, line: &str) -> bool {
        let Some(rest) = line.strip_prefix(DOWNLOAD_PREFIX) else {
            return false;
        };
        let Some(pos) = rest.find(PERCENT_OF) else {
            return false;
        };
        let Some(value) = parse_percentage(&rest[..pos]) else {
            return false;
        };
        self.percentage = Some(value / 100.0);

        let rest = &rest[pos + PERCENT_OF.len()..];
        if let Some(pos) = rest.find(SPEED_MARKER) {
            self.file_size = rest[..pos].to_string();
            let rest = &rest[pos + SPEED_MARKER.len()..];
            if let Some(pos) = rest.find(ETA_MARKER) {
                self.speed = rest[..pos].trim_start().to_string();
                self.eta = rest[pos + ETA_MARKER.len()..].to_string();
            }
        } else if let Some(pos) = rest.find(ELAPSED_MARKER) {
            // finished: speed and ETA keep their last values
            self.file_size = rest[..pos].to_string();
        }
        true
    }
}

/// Plain decimal with leading whitespace, independent of locale.
fn parse_percentage(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let mut dots = 0;
    for b in text.bytes() {
        match b {
            b'0'..=b'9' => {}
            b'.' => dots += 1,
            _ => return None,
        }
    }
    if dots > 1 {
        return None;
    }
    text.parse().ok()
}

/// Snapshot plus the raw output of the current download
#[derive(Debug, Default)]
pub struct ProgressState {
    pub snapshot: ProgressSnapshot,
    pub output: VecDeque<String>,
    subscribers: Vec<Sender<ProgressSnapshot>>,
}

/// Progress state shared between the output readers and observers.
///
/// Lines from stdout and stderr are applied one at a time under the lock so a
/// snapshot is never updated by two lines at once.
#[derive(Clone, Debug, Default)]
pub struct SharedProgress {
    inner: Arc<Mutex<ProgressState>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a line in the output log and feed it to the parser
    pub fn handle_line(&self, line: &str) -> bool {
        let mut state = self.lock();
        if state.output.len() >= MAX_OUTPUT_LOG_LINES {
            state.output.pop_front();
        }
        state.output.push_back(line.to_string());

        if !state.snapshot.parse_line(line) {
            return false;
        }
        let snapshot = state.snapshot.clone();
        state.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        true
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn output_log(&self) -> Vec<String> {
        self.lock().output.iter().cloned().collect()
    }

    /// Receive a snapshot after every applied progress line
    pub fn subscribe(&self) -> Receiver<ProgressSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Back to indeterminate with an empty log, subscribers are kept
    pub fn reset(&self) {
        let mut state = self.lock();
        state.snapshot = ProgressSnapshot::default();
        state.output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn in_progress_line() {
        let mut s = ProgressSnapshot::default();
        assert!(s.parse_line("[download]   0.0% of 36.35MiB at 20.40KiB/s ETA 30:24"));
        assert!(approx(s.percentage, 0.0));
        assert_eq!(s.file_size, "36.35MiB");
        assert_eq!(s.speed, "20.40KiB/s");
        assert_eq!(s.eta, "30:24");
    }

    #[test]
    fn speed_leading_whitespace_trimmed() {
        let mut s = ProgressSnapshot::default();
        s.parse_line("[download]  65.1% of 36.35MiB at  2.81MiB/s ETA 00:04");
        assert!(approx(s.percentage, 0.651));
        assert_eq!(s.speed, "2.81MiB/s");
        assert_eq!(s.eta, "00:04");
    }

    #[test]
    fn finished_line_keeps_speed_and_eta() {
        let mut s = ProgressSnapshot::default();
        s.parse_line("[download]  99.9% of 36.35MiB at  5.00MiB/s ETA 00:01");
        assert!(s.parse_line("[download] 100% of 36.35MiB in 00:10"));
        assert!(approx(s.percentage, 1.0));
        assert_eq!(s.file_size, "36.35MiB");
        assert_eq!(s.speed, "5.00MiB/s");
        assert_eq!(s.eta, "00:01");
    }

    #[test]
    fn unrelated_lines_change_nothing() {
        let mut s = ProgressSnapshot::default();
        s.parse_line("[download]  10.0% of 1.00MiB at 1.00KiB/s ETA 10:00");
        let before = s.clone();
        for line in [
            "[youtube] dQw4w9WgXcQ: Downloading webpage",
            "[download] Destination: video.webm",
            "download]  20.0% of 1.00MiB",
            "[download]  abc% of 1.00MiB at 1KiB/s ETA 00:01",
            "[download]  1.2.3% of 1.00MiB at 1KiB/s ETA 00:01",
            "[download]  -5% of 1.00MiB at 1KiB/s ETA 00:01",
            "[download]  inf% of 1.00MiB",
            "[Download]  20.0% of 1.00MiB at 1KiB/s ETA 00:01",
            "",
        ] {
            assert!(!s.parse_line(line), "{line}");
            assert_eq!(s, before, "{line}");
        }
    }

    #[test]
    fn missing_eta_records_size_only() {
        let mut s = ProgressSnapshot {
            speed: "old".into(),
            eta: "old".into(),
            ..Default::default()
        };
        assert!(s.parse_line("[download]  42.0% of 10.00MiB at Unknown speed"));
        assert!(approx(s.percentage, 0.42));
        assert_eq!(s.file_size, "10.00MiB");
        assert_eq!(s.speed, "old");
        assert_eq!(s.eta, "old");
    }

    #[test]
    fn percentage_only_line() {
        let mut s = ProgressSnapshot {
            file_size: "keep".into(),
            ..Default::default()
        };
        assert!(s.is_indeterminate());
        assert!(s.parse_line("[download]  12.5% of "));
        assert!(!s.is_indeterminate());
        assert!(approx(s.percentage, 0.125));
        assert_eq!(s.file_size, "keep");
    }

    #[test]
    fn size_text_is_verbatim() {
        let mut s = ProgressSnapshot::default();
        s.parse_line("[download]   3.0% of ~ 120.51MiB at    1.02MiB/s ETA 01:55 (frag 2/60)");
        assert_eq!(s.file_size, "~ 120.51MiB");
        assert_eq!(s.speed, "1.02MiB/s");
        assert_eq!(s.eta, "01:55 (frag 2/60)");
    }

    #[test]
    fn shared_progress_logs_every_line_and_notifies() {
        let progress = SharedProgress::new();
        let rx = progress.subscribe();
        assert!(!progress.handle_line("[info] Available formats"));
        assert!(progress.handle_line("[download]  50.0% of 2.00MiB at 1.00MiB/s ETA 00:01"));

        assert_eq!(progress.output_log().len(), 2);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.file_size, "2.00MiB");
        assert!(rx.try_recv().is_err());

        progress.reset();
        assert!(progress.snapshot().is_indeterminate());
        assert!(progress.output_log().is_empty());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let progress = SharedProgress::new();
        drop(progress.subscribe());
        assert!(progress.handle_line("[download]  1.0% of 1MiB in 00:01"));
        assert!(progress.lock().subscribers.is_empty());
    }
}
