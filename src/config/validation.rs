use crate::config::types::{Config, DatabaseConfig, FetchConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_database_config(&config.database)?;
    validate_fetch_config(&config.fetch)?;
    Ok(())
}

fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database path cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates refresh run settings
pub fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.threads < 1 || config.threads > 256 {
        return Err(ConfigError::Validation(format!(
            "threads must be between 1 and 256, got {}",
            config.threads
        )));
    }

    if config.retries < 1 {
        return Err(ConfigError::Validation(format!(
            "retries must be >= 1 (it counts the first attempt), got {}",
            config.retries
        )));
    }

    if config.timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout must be >= 1 second, got {}",
            config.timeout
        )));
    }

    if config.early_release_slots > config.threads {
        return Err(ConfigError::Validation(format!(
            "early-release-slots ({}) cannot exceed threads ({})",
            config.early_release_slots, config.threads
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    // Header values must be visible ASCII
    if !config
        .user_agent
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control())
    {
        return Err(ConfigError::Validation(format!(
            "user-agent must be printable ASCII, got '{}'",
            config.user_agent
        )));
    }

    Ok(())
}
