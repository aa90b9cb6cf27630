//! Integration tests for config

#[cfg(test)]
mod tests {
    use avbuild_config::*;
    use avbuild_types::{ColorChoice, CompressionLevel, OutputFormat, Platform};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "AVBUILD_OUTPUT",
        "AVBUILD_COLOR",
        "AVBUILD_OUTPUT_DIR",
        "AVBUILD_TEMP_ROOT",
        "AVBUILD_EXTENSION",
        "AVBUILD_COMPRESSION",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
default_output = "plain"
color = "never"

[build]
output_dir = "out"
extension = "bundle"
supported_platforms = ["windows", "ios"]

[packaging]
backends = ["zip"]
compression = "fast"
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Plain);
        assert_eq!(config.general.color, ColorChoice::Never);
        assert_eq!(config.build.output_dir, PathBuf::from("out"));
        assert_eq!(config.build.temp_root, PathBuf::from("Temp"));
        assert_eq!(config.build.extension, "bundle");
        assert_eq!(
            config.build.supported_platforms,
            vec![Platform::Windows, Platform::Ios]
        );
        assert_eq!(config.packaging.backends, vec!["zip"]);
        assert_eq!(config.packaging.compression, CompressionLevel::Fast);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = Config::load_from_file(std::path::Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            avbuild_errors::Error::Config(avbuild_errors::ConfigError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_toml_is_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[build\noutput_dir = ").unwrap();
        let err = Config::load_from_file(temp_file.path()).await.unwrap_err();
        assert!(matches!(
            err,
            avbuild_errors::Error::Config(avbuild_errors::ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("AVBUILD_OUTPUT", "json");
        std::env::set_var("AVBUILD_COLOR", "always");
        std::env::set_var("AVBUILD_OUTPUT_DIR", "/tmp/builds");
        std::env::set_var("AVBUILD_EXTENSION", ".zipx");
        std::env::set_var("AVBUILD_COMPRESSION", "balanced");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.general.default_output, OutputFormat::Json);
        assert_eq!(config.general.color, ColorChoice::Always);
        assert_eq!(config.build.output_dir, PathBuf::from("/tmp/builds"));
        assert_eq!(config.build.extension, "zipx");
        assert_eq!(config.packaging.compression, CompressionLevel::Balanced);

        clear_env();
    }

    #[test]
    fn test_merge_env_rejects_invalid_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("AVBUILD_COLOR", "rainbow");
        let mut config = Config::default();
        let err = config.merge_env().unwrap_err();
        assert!(matches!(
            err,
            avbuild_errors::Error::Config(avbuild_errors::ConfigError::InvalidValue { ref field, .. })
                if field == "AVBUILD_COLOR"
        ));

        clear_env();
    }
}
