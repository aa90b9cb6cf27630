//! Integration tests for error types

#[cfg(test)]
mod tests {
    use avbuild_errors::*;

    #[test]
    fn test_error_conversion() {
        let err: Error = BuildError::StepFailed {
            step: "avatar_descriptor".into(),
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, Error::Build(BuildError::StepFailed { .. })));
        assert_eq!(err.user_code(), Some("build.step_failed"));
    }

    #[test]
    fn test_user_message_has_no_domain_prefix() {
        let err: Error = PackageError::NoArtifacts {
            dir: "/tmp/x".into(),
        }
        .into();
        assert_eq!(err.to_string(), "package error: no valid artifacts found in /tmp/x");
        assert_eq!(err.user_message(), "no valid artifacts found in /tmp/x");
    }

    #[test]
    fn test_removal_failed_layout() {
        let err = BuildError::RemovalFailed {
            messages: "a: x\n\tb: y".into(),
        };
        assert_eq!(err.to_string(), "Script removal failed:\n\ta: x\n\tb: y");
    }

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io_with_path(&io_err, "/root/out");
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                ..
            }
        ));
        assert_eq!(err.user_message(), "/root/out: denied");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_cancellation_detection() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(Error::from(BuildError::Cancelled).is_cancelled());
        assert!(!Error::internal("x").is_cancelled());
    }

    #[test]
    fn test_config_hint() {
        let err = ConfigError::InvalidValue {
            field: "AVBUILD_COLOR".into(),
            value: "purple".into(),
        };
        assert!(err.user_hint().is_some());
    }
}
