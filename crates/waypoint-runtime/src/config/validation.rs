//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatchConfig, LogOutput, LoggingConfig, WaypointConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &WaypointConfig) -> ConfigResult<()> {
    validate_dispatch_config(&config.dispatch)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for prefix in &dispatch.destination_prefixes {
        validate_prefix("dispatch.destination_prefixes", prefix)?;
        if !seen.insert(prefix.trim_end_matches('/')) {
            return Err(ConfigError::validation(format!(
                "Duplicate destination prefix: {prefix}"
            )));
        }
    }

    validate_prefix("dispatch.broker_prefix", &dispatch.broker_prefix)?;
    if dispatch.broker_prefix.len() < 2 {
        return Err(ConfigError::validation("Broker prefix cannot be just '/'"));
    }

    Ok(())
}

fn validate_prefix(field: &'static str, prefix: &str) -> ConfigResult<()> {
    if !prefix.starts_with('/') {
        return Err(ConfigError::invalid_prefix(field, prefix));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output = \"file\" requires logging.file_path",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&WaypointConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_prefix_without_slash() {
        let mut config = WaypointConfig::default();
        config.dispatch.destination_prefixes = vec!["app".into()];

        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPrefix { field: "dispatch.destination_prefixes", .. }
        ));
    }

    #[test]
    fn test_validate_duplicate_prefix() {
        let mut config = WaypointConfig::default();
        config.dispatch.destination_prefixes = vec!["/app".into(), "/app/".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_broker_prefix() {
        let mut config = WaypointConfig::default();
        config.dispatch.broker_prefix = String::new();
        assert!(validate_config(&config).is_err());

        config.dispatch.broker_prefix = "/".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = WaypointConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("waypoint.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
