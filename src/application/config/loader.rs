use crate::application::config::models::EventConfig;
use crate::application::config::parser::{parse_config, parse_config_file};
use crate::application::config::validator::validate_config;
use crate::common::error::Result;
use log::debug;

/// Parses, then validates, an event configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &str) -> Result<EventConfig> {
        let config = parse_config_file(path)?;
        validate_config(&config)?;
        debug!("loaded event configuration from {}", path);
        Ok(config)
    }

    pub fn load_from_str(content: &str) -> Result<EventConfig> {
        let config = parse_config(content)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Defaults when no path is given.
    pub fn load_optional(path: Option<&str>) -> Result<EventConfig> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = EventConfig::default();
                validate_config(&config)?;
                Ok(config)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::poller::BackendPreference;

    #[test]
    fn test_load_from_str() {
        let config = ConfigLoader::load_from_str(
            r#"
            max_fds = 1024
            backend = "poll"
        "#,
        )
        .unwrap();
        assert_eq!(config.max_fds, 1024);
        assert_eq!(config.backend, BackendPreference::Poll);
    }

    #[test]
    fn test_validation_runs_after_parsing() {
        assert!(ConfigLoader::load_from_str("max_fds = 0").is_err());
    }

    #[test]
    fn test_missing_path_gives_defaults() {
        let config = ConfigLoader::load_optional(None).unwrap();
        assert_eq!(config.backend, BackendPreference::Auto);
    }
}
