#![allow(clippy::collapsible_if)]

use std::net::SocketAddr;

use eyre::Result;
use url::Url;

use crate::config::models::{HealthCheckConfig, ServerConfig, SqlBackendConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration, collecting every problem
    /// before failing.
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.httpd.listen_addr) {
            errors.push(e);
        }

        for (name, sql) in [
            ("assets", &config.assets),
            ("customers", &config.customers),
        ] {
            errors.extend(Self::validate_sql_backend(name, sql, false));
        }
        errors.extend(Self::validate_sql_backend(
            "reference",
            &config.reference,
            true,
        ));

        errors.extend(Self::validate_service_desk(config));
        errors.extend(Self::validate_health_check_config(&config.health_check));

        for origin in &config.httpd.allow_origins {
            if origin != "*" {
                if let Err(e) = Self::validate_url(origin, "httpd.allow_origins") {
                    errors.push(e);
                }
            }
        }

        if config.consul.enabled {
            if let Err(e) = Self::validate_url(&config.consul.address, "consul.address") {
                errors.push(e);
            }
            if config.consul.service_name.trim().is_empty() {
                errors.push(ValidationError::MissingField {
                    field: "consul.service_name".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:8000' or '0.0.0.0:8000')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_sql_backend(
        name: &str,
        sql: &SqlBackendConfig,
        allow_postgres: bool,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let dsn = sql.dsn.trim();

        if dsn.is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("{name}.dsn"),
            });
        } else if dsn.contains("postgres://") {
            if !allow_postgres {
                errors.push(ValidationError::InvalidField {
                    field: format!("{name}.dsn"),
                    message: "Only the reference store may use a postgres:// DSN".to_string(),
                });
            }
        } else if !dsn.contains("://")
            && !dsn
                .to_ascii_lowercase()
                .split(';')
                .any(|part| part.trim_start().starts_with("server="))
        {
            errors.push(ValidationError::InvalidField {
                field: format!("{name}.dsn"),
                message: "SQL Server DSN must contain a 'server=' key".to_string(),
            });
        }

        if sql.sql_timeout_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: format!("{name}.sql_timeout_secs"),
                message: "Timeout must be greater than 0".to_string(),
            });
        }

        errors
    }

    fn validate_service_desk(config: &ServerConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let sd = &config.service_desk;

        if sd.url.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "service_desk.url".to_string(),
            });
        } else if let Err(e) = Self::validate_url(&sd.url, "service_desk.url") {
            errors.push(e);
        }

        if sd.http_timeout_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "service_desk.http_timeout_secs".to_string(),
                message: "Timeout must be greater than 0".to_string(),
            });
        }

        errors
    }

    fn validate_health_check_config(health: &HealthCheckConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if health.interval_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "health_check.interval_secs".to_string(),
                message: "Interval must be greater than 0".to_string(),
            });
        }
        errors
    }

    /// Validate URL format
    fn validate_url(url: &str, field_name: &str) -> ValidationResult<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ValidationError::InvalidField {
                field: field_name.to_string(),
                message: format!("URL must start with 'http://' or 'https://', got: {url}"),
            });
        }

        if let Err(e) = Url::parse(url) {
            return Err(ValidationError::InvalidField {
                field: field_name.to_string(),
                message: format!("Invalid URL format: {e}"),
            });
        }

        Ok(())
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
