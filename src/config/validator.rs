//! Configuration validation.
//!
//! Collects every problem in one pass; the first error is returned to the
//! caller and warnings are surfaced by the `validate` command.

use crate::error::{ConfigError, PodrunError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{ApiConfig, LifecycleConfig, PodSpec, RunConfig, TemplateSpec};

/// Protocols the provider accepts in a port specification.
const PORT_PROTOCOLS: &[&str] = &["http", "tcp", "udp"];

/// Validator for run configurations.
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

    /// Validates a run configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &RunConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_template(&config.template, &mut result);
        Self::validate_pod(&config.pod, &mut result);
        Self::validate_lifecycle(&config.lifecycle, &mut result);
        Self::validate_api(&config.api, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(PodrunError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        }
    }

    /// Validates the template spec.
    fn validate_template(template: &TemplateSpec, result: &mut ValidationResult) {
        if !is_valid_name(&template.name) {
            result.errors.push(ValidationError {
                field: String::from("template.name"),
                message: format!(
                    "Template name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    template.name
                ),
            });
        }

        if template.image.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("template.image"),
                message: String::from("Container image cannot be empty"),
            });
        } else if template.image.ends_with(":latest") {
            result.warnings.push(String::from(
                "template.image: ':latest' makes the template hash blind to image updates",
            ));
        }

        if !template.volume_mount_path.starts_with('/') {
            result.errors.push(ValidationError {
                field: String::from("template.volume_mount_path"),
                message: format!(
                    "Mount path must be absolute: {}",
                    template.volume_mount_path
                ),
            });
        }

        if template.container_disk_gb == 0 {
            result.errors.push(ValidationError {
                field: String::from("template.container_disk_gb"),
                message: String::from("Container disk must be at least 1 GB"),
            });
        }

        let mut seen_ports = HashSet::new();
        for (i, spec) in template.ports.iter().enumerate() {
            match parse_port(spec) {
                Ok((port, _)) => {
                    if !seen_ports.insert(port) {
                        result.errors.push(ValidationError {
                            field: format!("template.ports[{i}]"),
                            message: format!("Duplicate port {port}"),
                        });
                    }
                }
                Err(e) => result.errors.push(ValidationError {
                    field: format!("template.ports[{i}]"),
                    message: e.to_string(),
                }),
            }
        }
    }

    /// Validates pod sizing.
    fn validate_pod(pod: &PodSpec, result: &mut ValidationResult) {
        if pod.name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("pod.name"),
                message: String::from("Pod name cannot be empty"),
            });
        }

        if pod.min_memory_gb == 0 {
            result.errors.push(ValidationError {
                field: String::from("pod.min_memory_gb"),
                message: String::from("Minimum GPU memory must be positive"),
            });
        }

        if pod.gpu_count == 0 {
            result.errors.push(ValidationError {
                field: String::from("pod.gpu_count"),
                message: String::from("GPU count must be at least 1"),
            });
        } else if pod.gpu_count > 8 {
            result.warnings.push(format!(
                "pod.gpu_count: Requesting {} GPUs is unusual",
                pod.gpu_count
            ));
        }
    }

    /// Validates polling settings.
    fn validate_lifecycle(lifecycle: &LifecycleConfig, result: &mut ValidationResult) {
        if lifecycle.poll_interval_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("lifecycle.poll_interval_secs"),
                message: String::from("Poll interval must be at least 1 second"),
            });
        }

        if lifecycle.ready_timeout().is_none() {
            result.warnings.push(String::from(
                "lifecycle.ready_timeout_secs: no deadline, a pod stuck before RUNNING is polled forever",
            ));
        }
    }

    /// Validates API endpoints.
    fn validate_api(api: &ApiConfig, result: &mut ValidationResult) {
        for (field, url) in [("api.graphql_url", &api.graphql_url), ("api.rest_url", &api.rest_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.errors.push(ValidationError {
                    field: String::from(field),
                    message: format!("Endpoint must be an http(s) URL: {url}"),
                });
            }
        }
    }
}

/// Parses a `<port>/<protocol>` specification.
///
/// # Errors
///
/// Returns an invalid-port error if the port or protocol is malformed.
pub fn parse_port(spec: &str) -> std::result::Result<(u16, &str), ConfigError> {
    let invalid = || ConfigError::InvalidPort {
        spec: spec.to_string(),
    };

    let (port, protocol) = spec.split_once('/').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;

    if port == 0 || !PORT_PROTOCOLS.contains(&protocol) {
        return Err(invalid());
    }

    Ok((port, protocol))
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    // First character must be a letter
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    // Rest must be lowercase alphanumeric or hyphen
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
