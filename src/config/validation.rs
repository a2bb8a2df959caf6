use crate::config::types::{
    Config, CrawlerConfig, CredentialsConfig, GatewayConfig, OutputConfig, Phase,
};
use crate::state::{KIND_WIDTH, REGION_WIDTH};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_gateway_config(&config.gateway)?;
    validate_credentials_config(&config.credentials)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates endpoint and pacing settings
fn validate_gateway_config(config: &GatewayConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.endpoint_path.trim_matches('/').is_empty() {
        return Err(ConfigError::Validation(
            "endpoint-path cannot be empty".to_string(),
        ));
    }

    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.requests_per_second < 1 {
        return Err(ConfigError::Validation(format!(
            "requests-per-second must be >= 1, got {}",
            config.requests_per_second
        )));
    }

    if config.result_cap < 1 {
        return Err(ConfigError::Validation(format!(
            "result-cap must be >= 1, got {}",
            config.result_cap
        )));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    Ok(())
}

fn validate_credentials_config(config: &CredentialsConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "credentials directory cannot be empty".to_string(),
        ));
    }

    if config.budget < 1 {
        return Err(ConfigError::Validation(format!(
            "budget must be >= 1, got {}",
            config.budget
        )));
    }

    if config.api_key_var.is_empty() || config.secret_key_var.is_empty() {
        return Err(ConfigError::Validation(
            "credential variable names cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.phases.is_empty() {
        return Err(ConfigError::Validation(
            "at least one phase must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for phase in &config.phases {
        if !seen.insert(*phase) {
            return Err(ConfigError::Validation(format!(
                "phase '{}' is listed more than once",
                phase
            )));
        }
    }

    if config.phases.contains(&Phase::Prefix) {
        if config.alphabet.is_empty() {
            return Err(ConfigError::Validation(
                "alphabet cannot be empty when the prefix phase is enabled".to_string(),
            ));
        }

        if config.max_depth < 1 {
            return Err(ConfigError::Validation(format!(
                "max-depth must be >= 1, got {}",
                config.max_depth
            )));
        }
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    if config.miss_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "miss-threshold must be >= 1, got {}",
            config.miss_threshold
        )));
    }

    if config.gap_span < 1 {
        return Err(ConfigError::Validation(format!(
            "gap-span must be >= 1, got {}",
            config.gap_span
        )));
    }

    if config.probe_count < 1 {
        return Err(ConfigError::Validation(format!(
            "probe-count must be >= 1, got {}",
            config.probe_count
        )));
    }

    for region in &config.wide_regions {
        validate_segment(region, REGION_WIDTH, |c| c.is_ascii_digit(), "region")?;
    }

    for kind in &config.kinds {
        validate_segment(kind, KIND_WIDTH, |c| c.is_ascii_uppercase(), "type")?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.snapshot_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "snapshot-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks a fixed-width key segment such as a region or type code
fn validate_segment(
    segment: &str,
    width: usize,
    allowed: impl Fn(char) -> bool,
    label: &str,
) -> Result<(), ConfigError> {
    if segment.chars().count() != width || !segment.chars().all(allowed) {
        return Err(ConfigError::Validation(format!(
            "invalid {} code '{}': expected {} characters",
            label, segment, width
        )));
    }
    Ok(())
}
