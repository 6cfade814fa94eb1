//! Configuration parser for loading access files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{AccessError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::AccessConfig;

/// Environment variable overriding `platform.api`.
pub const ENV_API: &str = "BROKER_ACCESS_API";

/// Environment variable overriding the broker reference.
pub const ENV_BROKER: &str = "BROKER_ACCESS_BROKER";

/// Environment variable holding the Cloud Controller bearer token.
pub const ENV_TOKEN: &str = "CF_ACCESS_TOKEN";

/// Environment variable holding the broker's basic auth password.
pub const ENV_BROKER_PASSWORD: &str = "BROKER_ACCESS_BROKER_PASSWORD";

/// Configuration parser for loading access configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<AccessConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(AccessError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AccessError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<AccessConfig> {
        debug!("Parsing YAML configuration");

        let config: AccessConfig = serde_yaml::from_str(content).map_err(|e| {
            AccessError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!(
            "Parsed {} access entries for broker {}",
            config.service_access.len(),
            config.broker.reference().unwrap_or("<unset>")
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<AccessConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    fn apply_overrides(config: &mut AccessConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api) = lookup(ENV_API) {
            debug!("Overriding platform.api from environment");
            config.platform.api = api;
        }

        if let Some(broker) = lookup(ENV_BROKER) {
            debug!("Overriding broker from environment");
            config.broker.name = Some(broker);
            config.broker.id = None;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                AccessError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the Cloud Controller bearer token from environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn get_access_token() -> Result<String> {
        std::env::var(ENV_TOKEN)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AccessError::Config(ConfigError::MissingEnvVar {
                    name: String::from(ENV_TOKEN),
                })
            })
    }

    /// Gets the broker password used for registration from environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is not set.
    pub fn get_broker_password() -> Result<String> {
        Self::broker_password_from(|name| std::env::var(name).ok())
    }

    fn broker_password_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        lookup(ENV_BROKER_PASSWORD)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                AccessError::Config(ConfigError::MissingEnvVar {
                    name: String::from(ENV_BROKER_PASSWORD),
                })
            })
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "broker-access.yaml",
    "broker-access.yml",
    "access.yaml",
    "access.yml",
];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(AccessError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessDeclaration;

    const FULL: &str = r"
platform:
  api: https://api.sys.example.com
  skip_ssl_validation: true
  timeout_secs: 10
broker:
  name: my-broker
  url: https://broker.example.com
  username: admin
service_access:
  - service: db
  - service: cache
    plan: small
  - service: cache
    org_id: org-a
  - service: queue
    plan: large
    org_id: org-b
";

    #[test]
    fn test_parse_full_config() {
        let config = ConfigParser::new()
            .parse_yaml(FULL, None)
            .expect("config should parse");

        assert_eq!(config.platform.api, "https://api.sys.example.com");
        assert!(config.platform.skip_ssl_validation);
        assert_eq!(config.platform.timeout_secs, 10);
        assert_eq!(config.broker.reference(), Some("my-broker"));
        assert_eq!(config.broker.url.as_deref(), Some("https://broker.example.com"));
        assert_eq!(config.broker.username.as_deref(), Some("admin"));

        let declarations = config.declarations();
        assert_eq!(declarations.len(), 4);
        assert!(declarations[0].is_public());
        assert_eq!(
            declarations[3],
            AccessDeclaration::from_parts("queue", Some("large"), Some("org-b"))
        );
    }

    #[test]
    fn test_parse_error_carries_location() {
        let result = ConfigParser::new().parse_yaml("platform: [", Some(Path::new("bad.yaml")));

        assert!(matches!(
            result,
            Err(AccessError::Config(ConfigError::ParseError { location: Some(ref l), .. })) if l == "bad.yaml"
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = ConfigParser::new()
            .parse_yaml(FULL, None)
            .expect("config should parse");

        ConfigParser::apply_overrides(&mut config, |name| match name {
            ENV_API => Some(String::from("https://api.other.example.com")),
            ENV_BROKER => Some(String::from("other-broker")),
            _ => None,
        });

        assert_eq!(config.platform.api, "https://api.other.example.com");
        assert_eq!(config.broker.reference(), Some("other-broker"));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("nested dirs");
        std::fs::write(dir.path().join("access.yml"), FULL).expect("config written");

        let found = find_config_file(&nested).expect("config should be found");
        assert_eq!(found, dir.path().join("access.yml"));

        let config = ConfigParser::new()
            .load_file(&found)
            .expect("config should load");
        assert_eq!(config.service_access.len(), 4);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = ConfigParser::new().load_file(dir.path().join("broker-access.yaml"));

        assert!(matches!(
            result,
            Err(AccessError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_dotenv_in_base_path_is_optional() {
        let dir = tempfile::tempdir().expect("temp dir");
        ConfigParser::new()
            .with_base_path(dir.path())
            .load_dotenv()
            .expect("missing .env is not an error");
    }

    #[test]
    fn test_broker_password_lookup() {
        let password = ConfigParser::broker_password_from(|name| {
            (name == ENV_BROKER_PASSWORD).then(|| String::from("secret"))
        })
        .expect("password should be found");
        assert_eq!(password, "secret");

        let missing = ConfigParser::broker_password_from(|_| Some(String::new()));
        assert!(matches!(
            missing,
            Err(AccessError::Config(ConfigError::MissingEnvVar { ref name })) if name == ENV_BROKER_PASSWORD
        ));
    }
}
