//! Configuration file tests
//!
//! Loads YAML documents from disk the way the CLI does.

#[cfg(test)]
mod tests {
    use hayate_uploadr::config::{Config, ConfigError, LogFormat};
    use hayate_uploadr::orchestrator::Strategy;
    use serial_test::serial;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    /// A production-style file with credentials pulled from the environment
    #[test]
    #[serial]
    fn test_load_config_file_with_env_credentials() {
        std::env::set_var("HAYATE_TEST_ACCESS_KEY", "AKIAEXAMPLE");
        std::env::remove_var("HAYATE_TEST_BUCKET");

        let file = write_config(
            r#"
storage:
  bucket: ${HAYATE_TEST_BUCKET:-media-uploads}
  region: eu-west-1
  endpoint: https://s3.eu-west-1.amazonaws.com
  access_key: ${HAYATE_TEST_ACCESS_KEY}
  secret_key: secret
  force_path_style: false
signing:
  expiry_seconds: 900
upload:
  strategy: batch
logging:
  level: debug
  format: json
metrics:
  enabled: false
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.storage.bucket, "media-uploads");
        assert_eq!(config.storage.access_key.as_deref(), Some("AKIAEXAMPLE"));
        assert!(!config.storage.force_path_style);
        assert_eq!(config.signing.expiry(), Duration::from_secs(900));
        assert_eq!(config.upload.strategy, Strategy::Batch);
        assert_eq!(config.upload.default_content_type, "application/octet-stream");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.metrics.enabled);

        std::env::remove_var("HAYATE_TEST_ACCESS_KEY");
    }

    /// Only one half of a key pair is a validation error
    #[test]
    fn test_half_credentials_rejected() {
        let file = write_config(
            r#"
storage:
  access_key: lonely
"#,
        );

        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("upload:\n  strategy: sequential\n");

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.upload.strategy, Strategy::Sequential);
        assert_eq!(config.storage.bucket, "test-uploads");
        assert_eq!(config.signing.expiry_seconds, 3600);
    }
}
