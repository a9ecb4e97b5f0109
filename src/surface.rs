//! Host-facing surfaces the switcher reports through.
//!
//! The switcher only sees these traits, so it can be driven from the CLI,
//! from a file watcher, or from tests with recording doubles.

use crate::error::Result;
use crate::utils::{confirm, print_error, print_success, print_warning};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Single status line, overwritten by every switch attempt.
pub trait StatusSink: Send + Sync {
    fn set_text(&self, text: &str);
}

/// Notifications, yes/no questions and progress for long-running gvm calls.
pub trait Interaction: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn confirm(&self, question: &str) -> bool;
    fn task_started(&self, title: &str);
    fn task_finished(&self);
}

/// Input stream of an interactive terminal session.
pub trait TerminalSink {
    fn send_text(&mut self, text: &str) -> Result<()>;
}

/// Prints the status line to stderr and optionally mirrors it into a file.
pub struct ConsoleStatus {
    text: Mutex<String>,
    mirror: Option<PathBuf>,
}

impl ConsoleStatus {
    pub fn new(mirror: Option<PathBuf>) -> Self {
        Self {
            text: Mutex::new("GVM: ...".to_string()),
            mirror,
        }
    }
}

impl StatusSink for ConsoleStatus {
    fn set_text(&self, text: &str) {
        if let Ok(mut current) = self.text.lock() {
            *current = text.to_string();
        }

        eprintln!("{}", text.cyan().bold());

        if let Some(path) = &self.mirror {
            if let Err(e) = std::fs::write(path, format!("{}\n", text)) {
                warn!("Could not write status to {}: {}", path.display(), e);
            }
        }
    }
}

/// Terminal-backed interaction: colored messages, dialoguer prompts, an indicatif spinner.
pub struct ConsoleUi {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }
}

impl Default for ConsoleUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Interaction for ConsoleUi {
    fn info(&self, message: &str) {
        print_success(message);
    }

    fn warn(&self, message: &str) {
        print_warning(message);
    }

    fn error(&self, message: &str) {
        print_error(message);
    }

    fn confirm(&self, question: &str) -> bool {
        confirm(question)
    }

    fn task_started(&self, title: &str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(title.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(previous) = spinner.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn task_finished(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
        }
    }
}

/// Writes each line to stdout, for `eval "$(gvm-switch env)"`.
pub struct StdoutTerminal;

impl TerminalSink for StdoutTerminal {
    fn send_text(&mut self, text: &str) -> Result<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        writeln!(lock, "{}", text)?;
        lock.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_console_status_mirrors_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("status");
        let status = ConsoleStatus::new(Some(path.clone()));
        assert_eq!(*status.text.lock().unwrap(), "GVM: ...");

        status.set_text("GVM: go1.22.0 (myset)");
        status.set_text("GVM: go1.21");

        assert_eq!(*status.text.lock().unwrap(), "GVM: go1.21");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "GVM: go1.21\n");
    }

    #[test]
    fn test_spinner_lifecycle() {
        let ui = ConsoleUi::new();
        ui.task_started("Installing go1.22.0 via gvm...");
        ui.task_started("Creating pkgset myset...");
        ui.task_finished();
        ui.task_finished();
        assert!(ui.spinner.lock().unwrap().is_none());
    }
}
