use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are separated by a double underscore, for example
/// `TRANSFORM_ENGINE__STRICT_MIMETYPE_CHECK=false` or
/// `TRANSFORM_TRANSFORMER_URLS__LIBREOFFICE=http://lo:8090`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TRANSFORM_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[availability]
probe_timeout_secs = 3

[[transformers]]
name = "tika"
kind = "simple"
base_url = "http://tika:8090"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.availability.probe_timeout_secs, 3);
        assert_eq!(config.transformers[0].name, "tika");
    }

    #[test]
    fn test_load_config_from_str_pipeline_without_steps() {
        let toml = r#"
[[transformers]]
name = "broken"
kind = "pipeline"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/transform.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[debug]
enabled = false

[[transformers]]
name = "PassThrough"
kind = "pass_through"

[[transformers.supported]]
source_mimetype = "text/html"
target_mimetype = "text/plain"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert!(!config.debug.enabled);
        assert_eq!(config.transformers[0].kind.label(), "pass_through");
        assert_eq!(config.transformers[0].supported.len(), 1);
    }
}
