//! Configuration module for podrun.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `podrun.yaml`
//! - Validation of configuration values
//! - Hashing template specs for reuse decisions
//! - Reading the API credential

mod credentials;
mod hash;
mod parser;
mod spec;
mod validator;

pub use credentials::{API_KEY_VAR, Credentials};
pub use hash::SpecHasher;
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{
    ApiConfig, CloudType, DEFAULT_GRAPHQL_URL, DEFAULT_REST_URL, LifecycleConfig, PodSpec,
    RunConfig, StoreConfig, TemplateSpec,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, parse_port};
