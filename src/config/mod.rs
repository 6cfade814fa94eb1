//! Configuration module for the broker access reconciler.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `broker-access.yaml`
//! - Validation of configuration values
//! - Hashing the desired declarations for plans

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_API, ENV_BROKER, ENV_BROKER_PASSWORD, ENV_TOKEN,
    find_config_file,
};
pub use spec::{AccessConfig, BrokerRef, PlatformConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
