//! Tracing subscriber setup and structured logging of domain events

use std::path::Path;

use avbuild_events::{
    AppEvent, BuildEvent, EventMessage, GeneralEvent, WorkspaceEvent, STAGE_LABEL,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,avbuild=debug,avbuild_builder=debug";
const QUIET_FILTER: &str = "warn,avbuild=info";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber.
///
/// JSON mode keeps stdout clean for the rendered result: logs go to a file
/// when debugging and nowhere otherwise. `--debug` (or `RUST_LOG`) writes
/// JSON lines to a timestamped file under `logs_dir`.
pub fn init_tracing(json_mode: bool, debug_flag: bool, logs_dir: &Path) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_flag;

    if debug_enabled {
        let log_file = logs_dir.join(format!(
            "avbuild-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));
        let file = std::fs::create_dir_all(logs_dir)
            .and_then(|()| std::fs::File::create(&log_file));
        match file {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(env_filter(DEFAULT_FILTER))
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) if !json_mode => {
                eprintln!("Warning: Failed to create log file: {e}");
            }
            Err(_) => {}
        }
    }

    if json_mode {
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter(env_filter(QUIET_FILTER))
            .init();
    }
}

/// Mirror a domain event into the log with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let correlation = meta.correlation_id.as_deref().unwrap_or("-");
    let stage = meta.labels.get(STAGE_LABEL).map_or("-", String::as_str);
    match &message.event {
        AppEvent::Build(BuildEvent::Started { build_id, request }) => {
            info!(source, %build_id, document = %request.document, subject = %request.subject, "build started");
        }
        AppEvent::Build(BuildEvent::StageChanged { build_id, stage: next }) => {
            debug!(source, %build_id, stage = %next, "stage changed");
        }
        AppEvent::Build(BuildEvent::StepCompleted {
            build_id,
            step,
            priority,
        }) => {
            debug!(source, %build_id, step, priority, "compile step completed");
        }
        AppEvent::Build(BuildEvent::Finished {
            build_id,
            result,
            duration,
        }) => {
            if result.is_failed() {
                warn!(source, %build_id, status = %result.status(), elapsed = ?duration, "build failed");
            } else {
                info!(source, %build_id, elapsed = ?duration, "build finished");
            }
        }
        AppEvent::Progress(progress) => {
            debug!(source, ?progress, "progress");
        }
        AppEvent::Workspace(WorkspaceEvent::RestoreFailed { failure }) => {
            error!(source, correlation, stage, code = ?failure.code, message = %failure.message, "workspace restore failed");
        }
        AppEvent::Workspace(event) => {
            debug!(source, correlation, stage, ?event, "workspace");
        }
        AppEvent::General(GeneralEvent::Warning { message, context }) => {
            warn!(source, correlation, stage, context = ?context, "{message}");
        }
        AppEvent::General(GeneralEvent::Error { message, details }) => {
            error!(source, correlation, stage, details = ?details, "{message}");
        }
        AppEvent::General(event) => {
            debug!(source, correlation, stage, ?event, "general");
        }
    }
}
