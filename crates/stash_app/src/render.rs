use std::io::{self, Write};

use stash_core::{SessionState, SessionView};
use stash_engine::SessionReport;

/// Single-line progress display, redrawn in place.
#[derive(Default)]
pub struct ProgressLine {
    last: String,
}

impl ProgressLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &SessionView) {
        let line = format_line(view);
        if line == self.last {
            return;
        }
        let mut out = io::stdout().lock();
        let _ = write!(out, "\r{:<width$}", line, width = self.last.len());
        let _ = out.flush();
        self.last = line;
    }

    /// Ends the progress line so later output starts on a fresh one.
    pub fn close(&mut self) {
        if !self.last.is_empty() {
            println!();
            self.last.clear();
        }
    }
}

pub fn format_line(view: &SessionView) -> String {
    let target = match (&view.user, view.listing) {
        (Some(user), Some(listing)) => format!("{user} [{listing}]"),
        _ => String::new(),
    };
    let status = match view.state {
        SessionState::InvalidUser => "user not found".to_string(),
        SessionState::Failed => match &view.failure {
            Some(reason) => format!("failed: {reason}"),
            None => "failed".to_string(),
        },
        SessionState::Cancelling => "stopping...".to_string(),
        _ => format!("{} | {}", view.page_label, view.submission_label),
    };
    format!("{target} {status}").trim().to_string()
}

pub fn summary(report: &SessionReport) -> String {
    format!(
        "{:?} after {:.1}s: {} page(s), {} downloaded, {} skipped, {} failed",
        report.state,
        report.elapsed.as_secs_f64(),
        report.pages,
        report.downloaded,
        report.skipped,
        report.failed
    )
}
