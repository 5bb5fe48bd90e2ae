/*
[INPUT]:  Session teardown notifications and redirect requests
[OUTPUT]: Terminal messages standing in for page navigation
[POS]:    Binary UI collaborator - the CLI's navigation surface
[UPDATE]: When terminal presentation of session events changes
*/

use std::sync::{Mutex, PoisonError};

use console::style;
use marquee_session::Navigator;

/// Tracks the "page" the current command acts on and prints session events
#[derive(Debug)]
pub struct TerminalNavigator {
    path: Mutex<String>,
}

impl TerminalNavigator {
    pub fn new() -> Self {
        Self {
            path: Mutex::new("/".to_string()),
        }
    }

    /// Record the resource a command is about to work with
    pub fn visit(&self, path: &str) {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = path;
    }
}

impl Default for TerminalNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn notify(&self, message: &str) {
        eprintln!("{}", style(message).yellow());
    }

    fn redirect(&self, path: &str) {
        self.visit(path);
        eprintln!(
            "{} run `marquee login` to sign in again",
            style("Signed out:").bold().red()
        );
    }
}
