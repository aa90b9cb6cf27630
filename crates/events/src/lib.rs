#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for avbuild
//!
//! Library crates never print. Everything a user may want to see leaves the
//! pipeline as an [`AppEvent`] on an unbounded channel, wrapped in an
//! [`EventMessage`] carrying [`EventMeta`]. Subscribers are best-effort: a
//! dropped receiver never fails the sender.

pub mod meta;
pub use meta::{EventLevel, EventMessage, EventMeta, EventSource, STAGE_LABEL};

pub mod events;
pub use events::{
    AppEvent, BuildEvent, BuildRequestInfo, FailureContext, GeneralEvent, ProgressEvent,
    WorkspaceEvent,
};

pub mod reporter;
pub use reporter::{ProgressReporter, ProgressSink};

use avbuild_types::{BuildResult, BuildStage};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Type alias for the event sender
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events
///
/// Implemented by the raw [`EventSender`] and by any struct that may hold one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Hook for adding correlation ids or labels before an event leaves.
    ///
    /// Runs after events that carry a build id have been correlated with it.
    fn enrich_event_meta(&self, _event: &AppEvent, _meta: &mut EventMeta) {}

    /// Send an event with explicit metadata
    fn emit_with_meta(&self, meta: EventMeta, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(EventMessage::new(meta, event));
        }
    }

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        let mut meta = EventMeta::new(event.log_level(), event.event_source());
        if let Some(build_id) = event.build_id() {
            meta.correlation_id = Some(build_id.to_string());
        }
        self.enrich_event_meta(&event, &mut meta);
        self.emit_with_meta(meta, event);
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit a build started event
    fn emit_build_started(&self, build_id: Uuid, request: BuildRequestInfo) {
        self.emit(AppEvent::Build(BuildEvent::Started { build_id, request }));
    }

    /// Emit a stage transition
    fn emit_stage_changed(&self, build_id: Uuid, stage: BuildStage) {
        self.emit(AppEvent::Build(BuildEvent::StageChanged { build_id, stage }));
    }

    /// Emit a build finished event
    fn emit_build_finished(&self, build_id: Uuid, result: BuildResult, duration: Duration) {
        self.emit(AppEvent::Build(BuildEvent::Finished {
            build_id,
            result,
            duration,
        }));
    }

    /// Emit a progress update
    fn emit_progress(&self, build_id: Uuid, ratio: f32, status: impl Into<String>) {
        self.emit(AppEvent::Progress(ProgressEvent::Updated {
            build_id,
            ratio,
            status: status.into(),
        }));
    }

    /// Emit a workspace event
    fn emit_workspace(&self, event: WorkspaceEvent) {
        self.emit(AppEvent::Workspace(event));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct InStage {
        events: EventSender,
        build_id: Uuid,
    }

    impl EventEmitter for InStage {
        fn event_sender(&self) -> Option<&EventSender> {
            Some(&self.events)
        }

        fn enrich_event_meta(&self, _event: &AppEvent, meta: &mut EventMeta) {
            meta.tag_build(self.build_id, BuildStage::Packaging);
        }
    }

    #[test]
    fn build_events_are_correlated_by_their_build_id() {
        let (tx, mut rx) = channel();
        let build_id = Uuid::new_v4();
        tx.emit_stage_changed(build_id, BuildStage::Compiling);
        tx.emit_warning("unrelated");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.meta.correlation_id, Some(build_id.to_string()));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.meta.correlation_id, None);
        assert!(second.meta.labels.is_empty());
    }

    #[test]
    fn enrich_hook_tags_events_without_a_build_id() {
        let (tx, mut rx) = channel();
        let emitter = InStage {
            events: tx,
            build_id: Uuid::new_v4(),
        };
        emitter.emit_workspace(WorkspaceEvent::Persisted { documents: 2 });

        let message = rx.try_recv().unwrap();
        assert_eq!(
            message.meta.correlation_id,
            Some(emitter.build_id.to_string())
        );
        assert_eq!(
            message.meta.labels.get(STAGE_LABEL).map(String::as_str),
            Some("packaging")
        );
    }
}
