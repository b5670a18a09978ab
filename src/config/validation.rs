use crate::config::types::{Config, CrawlerConfig, ExportConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on any configured worker count
const MAX_CONCURRENCY: usize = 32;

/// Hard ceiling on the discovered set
pub const MAX_PAGES_CEILING: usize = 2000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_export_config(&config.export)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Clamps a requested page cap into `1..=MAX_PAGES_CEILING`
pub fn clamp_max_pages(requested: usize) -> usize {
    let clamped = requested.clamp(1, MAX_PAGES_CEILING);
    if clamped != requested {
        tracing::warn!("max-pages {} is out of range, using {}", requested, clamped);
    }
    clamped
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_concurrency("crawler.concurrency", config.concurrency)?;

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be greater than 0".to_string(),
        ));
    }

    if let Some(root) = &config.root_path {
        if !root.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "root-path must start with '/', got '{}'",
                root
            )));
        }
    }

    if config.exclude_patterns.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "exclude-patterns cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates export configuration
fn validate_export_config(config: &ExportConfig) -> Result<(), ConfigError> {
    validate_concurrency("export.page-concurrency", config.page_concurrency)?;
    validate_concurrency("export.image-concurrency", config.image_concurrency)?;

    if config.archive_deadline_ms == 0 {
        return Err(ConfigError::Validation(
            "archive-deadline-ms must be greater than 0".to_string(),
        ));
    }

    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters, '-' or '_', got '{}'",
            config.name
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

fn validate_concurrency(key: &str, value: usize) -> Result<(), ConfigError> {
    if value < 1 || value > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            key, MAX_CONCURRENCY, value
        )));
    }
    Ok(())
}
