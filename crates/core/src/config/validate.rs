use std::collections::HashSet;

use super::{
    types::{Config, TransformerKindConfig},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Probe timeout is not 0
/// - Spool directory is set
/// - Transformer names are unique
/// - Every simple transformer has a base URL or a URL override
///
/// Structural rules of pipelines and failovers are enforced at registration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.availability.probe_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "availability.probe_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.engine.spool_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.spool_dir cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for transformer in &config.transformers {
        if !seen.insert(transformer.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "transformer '{}' is defined more than once",
                transformer.name
            )));
        }

        if let TransformerKindConfig::Simple { base_url, .. } = &transformer.kind {
            let has_url = base_url.as_deref().is_some_and(|u| !u.trim().is_empty())
                || config.url_override(&transformer.name).is_some();
            if !has_url {
                return Err(ConfigError::ValidationError(format!(
                    "transformer '{}' needs base_url or a transformer_urls entry",
                    transformer.name
                )));
            }
        }
    }

    Ok(())
}
