use crate::config::{parse_duration, Config};
use crate::error::{Result, ValidationError, ViralscanError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_cache(config, &mut errors);
        Self::validate_fetch(config, &mut errors);
        Self::validate_reddit(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ViralscanError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;

        if !(1..=100).contains(&search.max_result_count) {
            errors.push(ValidationError::new(
                "search.max_result_count",
                format!(
                    "Max result count must be between 1 and 100, got {}",
                    search.max_result_count
                ),
            ));
        }

        if search.default_result_count == 0 || search.default_result_count > search.max_result_count
        {
            errors.push(ValidationError::new(
                "search.default_result_count",
                format!(
                    "Default result count must be between 1 and {}, got {}",
                    search.max_result_count, search.default_result_count
                ),
            ));
        }

        if search.max_sources == 0 {
            errors.push(ValidationError::new(
                "search.max_sources",
                "Max sources must be greater than 0",
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.max_size == 0 {
            errors.push(ValidationError::new(
                "cache.max_size",
                "Cache size must be greater than 0",
            ));
        }

        Self::validate_duration("cache.ttl", &config.cache.ttl, false, errors);
    }

    fn validate_fetch(config: &Config, errors: &mut Vec<ValidationError>) {
        Self::validate_duration(
            "fetch.overall_timeout",
            &config.fetch.overall_timeout,
            false,
            errors,
        );
        // A zero debounce window means "fire on the next tick"
        Self::validate_duration(
            "fetch.debounce_window",
            &config.fetch.debounce_window,
            true,
            errors,
        );
    }

    fn validate_reddit(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.reddit.user_agent.is_empty() {
            errors.push(ValidationError::new(
                "reddit.user_agent",
                "User agent cannot be empty",
            ));
        }

        for (path, url) in [
            ("reddit.auth_url", &config.reddit.auth_url),
            ("reddit.api_url", &config.reddit.api_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                errors.push(ValidationError::new(
                    path,
                    format!("URL must start with http:// or https://, got '{}'", url),
                ));
            }
        }

        Self::validate_duration(
            "reddit.request_timeout",
            &config.reddit.request_timeout,
            false,
            errors,
        );
    }

    fn validate_duration(
        path: &str,
        value: &str,
        allow_zero: bool,
        errors: &mut Vec<ValidationError>,
    ) {
        match parse_duration(value) {
            None => errors.push(ValidationError::new(
                path,
                format!("Invalid duration format: {}", value),
            )),
            Some(d) if d.is_zero() && !allow_zero => errors.push(ValidationError::new(
                path,
                "Duration must be greater than 0",
            )),
            Some(_) => {}
        }
    }
}
