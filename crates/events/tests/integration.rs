//! Integration tests for events

#[cfg(test)]
mod tests {
    use avbuild_events::*;
    use avbuild_types::{BuildResult, BuildStatus};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_emit_wraps_event_with_meta() {
        let (tx, mut rx) = channel();
        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Error);
        assert_eq!(first.meta.source, EventSource::GENERAL);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.meta.level, EventLevel::Debug);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit_warning("ignored");
    }

    #[tokio::test]
    async fn test_failed_build_logs_as_warning() {
        let (tx, mut rx) = channel();
        tx.emit_build_finished(
            Uuid::new_v4(),
            BuildResult::failed(BuildStatus::FAILED, "boom"),
            Duration::from_millis(5),
        );
        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.level, EventLevel::Warn);
        assert_eq!(message.event.log_target(), "avbuild::events::build");
    }

    #[tokio::test]
    async fn test_reporter_forwards_to_channel() {
        let (tx, mut rx) = channel();
        let build_id = Uuid::new_v4();
        let reporter = ProgressReporter::new(build_id).with_events(Some(tx));
        reporter.report(0.25, "compiling");
        let message = rx.recv().await.unwrap();
        match message.event {
            AppEvent::Progress(ProgressEvent::Updated {
                build_id: id,
                ratio,
                status,
            }) => {
                assert_eq!(id, build_id);
                assert!((ratio - 0.25).abs() < f32::EPSILON);
                assert_eq!(status, "compiling");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_event_serialization_is_domain_tagged() {
        let event = AppEvent::General(GeneralEvent::warning("careful"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "general");
        assert_eq!(json["event"]["type"], "Warning");
    }

    proptest! {
        #[test]
        fn reported_sequence_is_monotonic(values in proptest::collection::vec(-1.0f32..2.0, 1..40)) {
            let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
            let clone = Arc::clone(&seen);
            let sink: ProgressSink = Arc::new(move |v: f32, _: &str| clone.lock().unwrap().push(v));
            let reporter = ProgressReporter::new(Uuid::new_v4()).with_sink(Some(sink));
            for value in values {
                reporter.report(value, "step");
            }
            let seen = seen.lock().unwrap();
            prop_assert!(seen.windows(2).all(|w| w[0] <= w[1]));
            prop_assert!(seen.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
