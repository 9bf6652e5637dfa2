//! Error types for podrun.
//!
//! Errors are grouped by the area that raises them: configuration and
//! credentials, the local template store, the `RunPod` API transport, and
//! the pod lifecycle itself. Every lifecycle failure reaches the caller of
//! the orchestrator; none is downgraded to a log line.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for podrun.
#[derive(Debug, Error)]
pub enum PodrunError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template store errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// `RunPod` API errors.
    #[error("RunPod API error: {0}")]
    RunPod(#[from] RunPodError),

    /// Pod lifecycle errors.
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The API credential is absent from the environment.
    #[error("Missing credential: environment variable {name} is not set")]
    MissingCredential {
        /// Name of the missing variable.
        name: String,
    },

    /// Invalid port specification.
    #[error("Invalid port specification: {spec}")]
    InvalidPort {
        /// The invalid port specification.
        spec: String,
    },
}

/// Local template store errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// A stored record could not be read or parsed.
    #[error("Template record is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Writing to the store failed.
    #[error("Failed to write template store: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire store lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// The store is locked by another process.
    #[error("Template store is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("Template serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// `RunPod` API transport errors.
#[derive(Debug, Error)]
pub enum RunPodError {
    /// Authentication failed.
    #[error("RunPod authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("RunPod API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("RunPod API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Pod not found.
    #[error("Pod not found: {pod_id}")]
    PodNotFound {
        /// ID of the missing pod.
        pod_id: String,
    },

    /// Network error.
    #[error("Network error communicating with RunPod: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from RunPod API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Errors raised while driving a pod through its lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No GPU offer passed the memory, stock and price filters.
    #[error("No eligible GPU offer with at least {min_memory_gb} GB of VRAM ({total_offers} offers inspected)")]
    NoEligibleOffer {
        /// Requested memory floor.
        min_memory_gb: u32,
        /// Number of offers returned by the provider.
        total_offers: usize,
    },

    /// The provider rejected template creation.
    #[error("Failed to create template '{name}': {message}")]
    TemplateCreation {
        /// Template name sent to the provider.
        name: String,
        /// Provider error message.
        message: String,
    },

    /// The provider rejected pod creation, or the pod never started.
    #[error("Failed to create pod: {message}")]
    PodCreation {
        /// Provider error message.
        message: String,
    },

    /// The pod did not reach RUNNING before the deadline.
    #[error("Pod {pod_id} did not reach RUNNING within {waited_secs} seconds")]
    PollingTimeout {
        /// ID of the pod.
        pod_id: String,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },

    /// The caller cancelled the run.
    #[error("Run cancelled during {phase}")]
    Cancelled {
        /// Lifecycle phase that was interrupted.
        phase: String,
        /// ID of the pod, if one had been created.
        pod_id: Option<String>,
    },

    /// Terminating a created pod failed. The pod may still be billing.
    #[error("Failed to terminate pod {pod_id}, it may still be running and billing: {message}")]
    Termination {
        /// ID of the pod left behind.
        pod_id: String,
        /// Provider error message.
        message: String,
        /// Error that triggered the cleanup, if any.
        cause: Option<String>,
    },
}

/// Result type alias for podrun operations.
pub type Result<T> = std::result::Result<T, PodrunError>;

impl PodrunError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RunPod(RunPodError::RateLimited { .. } | RunPodError::NetworkError { .. })
                | Self::State(StateError::LockedByOther { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RunPod(RunPodError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::RunPod(RunPodError::NetworkError { .. }) => Some(5),
            Self::State(StateError::LockedByOther { .. }) => Some(2),
            _ => None,
        }
    }

    /// Returns true if this error means a billable pod may have been left running.
    #[must_use]
    pub const fn is_leaked_pod(&self) -> bool {
        matches!(self, Self::Lifecycle(LifecycleError::Termination { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl RunPodError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
