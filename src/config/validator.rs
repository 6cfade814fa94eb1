//! Configuration validation for access files.
//!
//! Problems that make a pass meaningless are errors. Entries that are
//! legal but probably unintended are reported as warnings.

use crate::access::AccessDeclaration;
use crate::error::{ConfigError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{AccessConfig, BrokerRef, PlatformConfig};

/// Validator for access configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self, config: &AccessConfig) -> Result<ValidationResult> {
        let result = self.collect(config);

        match result.errors.first() {
            None => {
                debug!("Configuration validation passed");
                Ok(result)
            }
            Some(first) => {
                Err(ConfigError::validation(first.message.clone(), first.field.clone()).into())
            }
        }
    }

    /// Collects every error and warning of a configuration.
    #[must_use]
    pub fn collect(&self, config: &AccessConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_platform(&config.platform, &mut result);

        if config.broker.reference().is_none() {
            result.errors.push(ValidationError {
                field: String::from("broker"),
                message: String::from("Either broker.name or broker.id is required"),
            });
        }

        Self::validate_registration(&config.broker, &mut result);

        Self::validate_access(config, &mut result);
        result
    }

    fn validate_platform(platform: &PlatformConfig, result: &mut ValidationResult) {
        if platform.api.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("platform.api"),
                message: String::from("API endpoint cannot be empty"),
            });
        } else if !platform.api.starts_with("https://") && !platform.api.starts_with("http://") {
            result.errors.push(ValidationError {
                field: String::from("platform.api"),
                message: format!(
                    "API endpoint '{}' must start with http:// or https://",
                    platform.api
                ),
            });
        }

        if platform.timeout_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("platform.timeout_secs"),
                message: String::from("Timeout must be at least 1 second"),
            });
        }

        if platform.skip_ssl_validation {
            result
                .warnings
                .push(String::from("platform.skip_ssl_validation: TLS certificates are not verified"));
        }
    }

    fn validate_registration(broker: &BrokerRef, result: &mut ValidationResult) {
        let Some(url) = broker.url.as_deref() else {
            if broker.username.is_some() {
                result.warnings.push(String::from(
                    "broker.username is set without broker.url: the broker is not registered",
                ));
            }
            return;
        };

        if !url.starts_with("https://") && !url.starts_with("http://") {
            result.errors.push(ValidationError {
                field: String::from("broker.url"),
                message: format!("Broker URL '{url}' must start with http:// or https://"),
            });
        }

        if broker.name.as_deref().is_none_or(str::is_empty) {
            result.errors.push(ValidationError {
                field: String::from("broker.name"),
                message: String::from("A broker name is required to register the broker"),
            });
        }
    }

    fn validate_access(config: &AccessConfig, result: &mut ValidationResult) {
        if config.service_access.is_empty() {
            result.warnings.push(String::from(
                "service_access is empty: every grant of the broker will be revoked",
            ));
        }

        for (i, entry) in config.service_access.iter().enumerate() {
            if entry.service.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("service_access[{i}].service"),
                    message: String::from("Service cannot be empty"),
                });
            }

            if entry
                .org_id
                .as_deref()
                .is_some_and(|org| org.chars().any(char::is_whitespace))
            {
                result.errors.push(ValidationError {
                    field: format!("service_access[{i}].org_id"),
                    message: format!(
                        "Organization id '{}' contains whitespace",
                        entry.org_id.as_deref().unwrap_or_default()
                    ),
                });
            }
        }

        let declarations = config.declarations();
        let mut seen = HashSet::new();
        for (i, declaration) in declarations.iter().enumerate() {
            if !seen.insert(declaration) {
                result
                    .warnings
                    .push(format!("service_access[{i}]: duplicate entry {declaration}"));
            }
        }

        let public: HashSet<&str> = declarations
            .iter()
            .filter(|d| d.is_public())
            .map(AccessDeclaration::service)
            .collect();
        let restricted: HashSet<&str> = declarations
            .iter()
            .filter(|d| !d.is_public())
            .map(AccessDeclaration::service)
            .collect();

        let mut mixed: Vec<&&str> = public.intersection(&restricted).collect();
        mixed.sort();
        for service in mixed {
            result.warnings.push(format!(
                "service '{service}' is declared both public and restricted; the last entry decides its public flag"
            ));
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::error::AccessError;

    fn parse(yaml: &str) -> AccessConfig {
        ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("config should parse")
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r"
platform:
  api: https://api.sys.example.com
broker:
  id: broker-guid
service_access:
  - service: db
    plan: small
",
        );

        let result = ConfigValidator::new()
            .validate(&config)
            .expect("config should be valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_errors_are_collected() {
        let config = parse(
            r#"
platform:
  api: api.sys.example.com
  timeout_secs: 0
broker: {}
service_access:
  - service: ""
  - service: db
    org_id: "org a"
"#,
        );

        let result = ConfigValidator::new().collect(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();

        assert_eq!(
            fields,
            vec![
                "platform.api",
                "platform.timeout_secs",
                "broker",
                "service_access[0].service",
                "service_access[1].org_id"
            ]
        );
        assert_eq!(result.error_count(), 5);

        let first = ConfigValidator::new().validate(&config);
        assert!(matches!(
            first,
            Err(AccessError::Config(ConfigError::ValidationError { field: Some(ref f), .. })) if f == "platform.api"
        ));
    }

    #[test]
    fn test_warnings() {
        let config = parse(
            r"
platform:
  api: https://api.sys.example.com
  skip_ssl_validation: true
broker:
  name: my-broker
service_access:
  - service: db
  - service: db
    plan: small
    org_id: org-a
  - service: db
    plan: small
    org_id: org-a
",
        );

        let result = ConfigValidator::new().collect(&config);

        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 3);
        assert!(result.warnings[1].contains("duplicate entry db:small@org-a"));
        assert!(result.warnings[2].contains("both public and restricted"));
    }

    #[test]
    fn test_registration_checks() {
        let config = parse(
            r"
platform:
  api: https://api.sys.example.com
broker:
  id: broker-guid
  url: broker.example.com
service_access:
  - service: db
",
        );

        let result = ConfigValidator::new().collect(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["broker.url", "broker.name"]);

        let username_only = parse(
            r"
platform:
  api: https://api.sys.example.com
broker:
  name: my-broker
  username: admin
service_access:
  - service: db
",
        );

        let result = ConfigValidator::new().collect(&username_only);
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
        assert!(result.warnings[0].contains("broker.username"));
    }
}
