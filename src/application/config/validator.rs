use crate::application::config::models::EventConfig;
use crate::common::constants::{FD_SETSIZE, MAX_FDS_CEILING};
use crate::common::error::{EventError, Result};
use crate::core::event::poller::BackendKind;

/// Validate configuration for correctness and consistency
pub fn validate_config(config: &EventConfig) -> Result<()> {
    validate_capacity(config)?;
    validate_backend(config)?;
    config.log_level_filter()?;
    Ok(())
}

fn validate_capacity(config: &EventConfig) -> Result<()> {
    if config.max_fds == 0 {
        return Err(EventError::Config(
            "max_fds must be greater than 0".to_string(),
        ));
    }

    if config.max_fds > MAX_FDS_CEILING {
        return Err(EventError::Config(format!(
            "max_fds {} exceeds the limit of {}",
            config.max_fds, MAX_FDS_CEILING
        )));
    }

    Ok(())
}

fn validate_backend(config: &EventConfig) -> Result<()> {
    let Some(kind) = config.backend.kind() else {
        return Ok(());
    };

    if !kind.is_compiled() {
        let available: Vec<&str> = BackendKind::available().iter().map(|k| k.name()).collect();
        return Err(EventError::Config(format!(
            "event handler '{}' is not available, choose one of {:?}",
            kind, available
        )));
    }

    if kind == BackendKind::Select && config.max_fds > FD_SETSIZE {
        return Err(EventError::Config(format!(
            "select can watch at most {} descriptors, max_fds is {}",
            FD_SETSIZE, config.max_fds
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::poller::BackendPreference;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&EventConfig::default()).is_ok());
    }

    #[test]
    fn test_capacity_bounds() {
        let mut config = EventConfig::default();
        config.max_fds = 0;
        assert!(validate_config(&config).is_err());

        config.max_fds = MAX_FDS_CEILING + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_select_limited_by_setsize() {
        let mut config = EventConfig {
            backend: BackendPreference::Select,
            ..EventConfig::default()
        };
        config.max_fds = FD_SETSIZE;
        assert!(validate_config(&config).is_ok());
        config.max_fds = FD_SETSIZE + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = EventConfig {
            log_level: "loud".to_string(),
            ..EventConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_backend_not_compiled() {
        let config = EventConfig {
            backend: BackendPreference::FreebsdKqueue,
            ..EventConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
