//! Configuration loading from disk.

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    let mut out = String::new();
    for (i, error) in errors.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}", error);
    }
    out
}

/// Load and validate a topology configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_config(Path::new("/nonexistent/topology.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validation_errors_are_joined() {
        let error = ConfigError::Validation(vec![
            ValidationError::DuplicateRoute("a".to_string()),
            ValidationError::DuplicateRule("r".to_string()),
        ]);
        let text = error.to_string();
        assert!(text.contains("duplicate route name 'a'"));
        assert!(text.contains("duplicate rule name 'r'"));
    }
}
