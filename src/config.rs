// src/config.rs

//! Configuration loading utilities.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load configuration from a TOML file, apply environment overrides and
/// validate the result.
///
/// Only a missing file falls back to defaults. Unreadable files, malformed
/// TOML and invalid values are errors.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Resolve a credential from the process environment.
///
/// Empty values count as unset.
pub fn secret_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[feeds]
alerts_url = "https://example.com/alerts.pb"

[[destinations]]
kind = "log"
name = "stdout"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.destinations.len(), 1);
        assert_eq!(config.destinations[0].name(), "stdout");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[feeds]\nalerts_url = \"not a url\"").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_malformed_file_does_not_fall_back() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[[destinations]]\nkind = \"log\nname = \"stdout\"\n").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Toml(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config("/nonexistent/metrolert.toml").unwrap();
        assert_eq!(config.destinations.len(), 2);
    }
}
