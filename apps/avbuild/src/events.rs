//! Event handling and progress display

use avbuild_events::{
    AppEvent, BuildEvent, EventMessage, GeneralEvent, ProgressEvent, WorkspaceEvent,
};
use console::{Style, Term};

use crate::logging::log_event_with_tracing;

/// Renders build events to stderr while a command runs
pub struct EventHandler {
    term: Term,
    colors: bool,
    quiet: bool,
    last_status: Option<String>,
}

impl EventHandler {
    /// `quiet` suppresses terminal output but still logs every event
    pub fn new(colors: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors,
            quiet,
            last_status: None,
        }
    }

    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }
        match message.event {
            AppEvent::Progress(ProgressEvent::Updated { ratio, status, .. }) => {
                self.show_progress(ratio, &status);
            }
            AppEvent::Build(BuildEvent::StepCompleted { step, priority, .. }) => {
                self.show_status(&format!("  step {step} (priority {priority}) done"));
            }
            AppEvent::Workspace(WorkspaceEvent::Restored { open_documents }) => {
                self.show_warning(&format!(
                    "workspace restored ({open_documents} open documents)"
                ));
            }
            AppEvent::Workspace(WorkspaceEvent::RestoreFailed { failure }) => {
                self.show_error(&format!("workspace restore failed: {}", failure.message));
                if let Some(hint) = failure.hint {
                    self.show_status(&format!("  hint: {hint}"));
                }
            }
            AppEvent::General(GeneralEvent::Warning { message, context }) => {
                match context {
                    Some(context) => self.show_warning(&format!("{message} ({context})")),
                    None => self.show_warning(&message),
                }
            }
            AppEvent::General(GeneralEvent::Error { message, .. }) => self.show_error(&message),
            _ => {}
        }
    }

    fn show_progress(&mut self, ratio: f32, status: &str) {
        if self.last_status.as_deref() == Some(status) {
            return;
        }
        self.last_status = Some(status.to_string());
        let percent = (ratio.clamp(0.0, 1.0) * 100.0).round();
        self.show_status(&format!("[{percent:>3}%] {status}"));
    }

    fn show_status(&self, line: &str) {
        let _ = self.term.write_line(line);
    }

    fn show_warning(&self, line: &str) {
        let style = if self.colors {
            Style::new().yellow()
        } else {
            Style::new()
        };
        let _ = self.term.write_line(&format!("{} {line}", style.apply_to("warning:")));
    }

    fn show_error(&self, line: &str) {
        let style = if self.colors {
            Style::new().red().bold()
        } else {
            Style::new()
        };
        let _ = self.term.write_line(&format!("{} {line}", style.apply_to("error:")));
    }
}
