use crate::application::config::models::EventConfig;
use crate::common::error::{EventError, Result};
use std::fs;

/// Reads and parses an event configuration file.
pub fn parse_config_file(path: &str) -> Result<EventConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        EventError::Config(format!("cannot read {}: {}", path, e))
    })?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<EventConfig> {
    toml::from_str(content)
        .map_err(|e| EventError::Config(format!("invalid event configuration: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::poller::BackendPreference;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, EventConfig::default());
        assert_eq!(config.backend, BackendPreference::Auto);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            max_fds = 512
            backend = "linux-sysepoll"
            poll_timeout_ms = -1
            log_level = "debug"
        "#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.max_fds, 512);
        assert_eq!(config.backend, BackendPreference::LinuxSysepoll);
        assert_eq!(config.poll_timeout_ms, -1);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_parse_unknown_backend() {
        let result = parse_config(r#"backend = "rtsig""#);
        assert!(matches!(result, Err(EventError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(parse_config_file("/nonexistent/fdevent.toml").is_err());
    }
}
