//! Configuration system
//!
//! Loads ~/.config/cycle-autotag/config.yaml with support for:
//! - GraphQL endpoint and token environment variable
//! - Workspace id (or slug resolved at startup)
//! - Target select attribute and the ordered category rules
//! - Retry and webhook receiver settings

mod autotag_config;
pub mod validation;

pub use autotag_config::{
    AutotagConfig, RetrySettings, ServerConfig, DEFAULT_ENDPOINT, DEFAULT_TOKEN_ENV,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
