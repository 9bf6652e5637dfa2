//! Configuration specification types.
//!
//! These structs map to `podrun.yaml`. Every field has a default, so an
//! absent file yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default `RunPod` GraphQL endpoint.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.runpod.io/graphql";

/// Default `RunPod` REST endpoint.
pub const DEFAULT_REST_URL: &str = "https://rest.runpod.io/v1";

/// The root configuration for a provisioning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Launch template to reuse or create.
    pub template: TemplateSpec,
    /// Pod sizing and GPU requirements.
    pub pod: PodSpec,
    /// Polling behavior.
    pub lifecycle: LifecycleConfig,
    /// Local template store.
    pub store: StoreConfig,
    /// `RunPod` API endpoints.
    pub api: ApiConfig,
}

/// Creation-time configuration of a pod template.
///
/// All fields are immutable once the template exists on the provider; any
/// change produces a different spec hash and thus a new template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplateSpec {
    /// Logical template name.
    pub name: String,
    /// Container image reference.
    pub image: String,
    /// Container disk in GB.
    pub container_disk_gb: u32,
    /// Volume size in GB.
    pub volume_gb: u32,
    /// Volume mount path.
    pub volume_mount_path: String,
    /// Exposed ports (e.g., "8888/http").
    pub ports: Vec<String>,
}

/// Pod sizing and GPU selection requirements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PodSpec {
    /// Pod name.
    pub name: String,
    /// Minimum GPU memory in GB.
    pub min_memory_gb: u32,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Volume size in GB.
    pub volume_gb: u32,
    /// Container disk in GB.
    pub container_disk_gb: u32,
    /// Cloud reliability tier.
    pub cloud_type: CloudType,
}

/// Cloud type options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudType {
    /// Secure cloud (dedicated, non-interruptible hardware).
    #[default]
    Secure,
    /// Community cloud (shared resources).
    Community,
}

/// Polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Seconds between status checks.
    pub poll_interval_secs: u64,
    /// Seconds to wait for RUNNING; `None` or `0` waits forever.
    pub ready_timeout_secs: Option<u64>,
}

/// Local template store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one record per template.
    pub dir: PathBuf,
}

/// `RunPod` API endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// GraphQL endpoint.
    pub graphql_url: String,
    /// REST endpoint base.
    pub rest_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TemplateSpec {
    fn default() -> Self {
        Self {
            name: String::from("comic-gen-template"),
            image: String::from("runpod/pytorch:2.1.0-py3.10-cuda11.8.0-devel-ubuntu22.04"),
            container_disk_gb: 10,
            volume_gb: 10,
            volume_mount_path: String::from("/workspace"),
            ports: vec![String::from("8888/http"), String::from("666/tcp")],
        }
    }
}

impl TemplateSpec {
    /// Returns the ports in the provider's comma-separated form.
    #[must_use]
    pub fn ports_string(&self) -> String {
        self.ports.join(",")
    }
}

impl Default for PodSpec {
    fn default() -> Self {
        Self {
            name: String::from("ComicGenPod"),
            min_memory_gb: 24,
            gpu_count: 1,
            volume_gb: 100,
            container_disk_gb: 100,
            cloud_type: CloudType::Secure,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            ready_timeout_secs: Some(1800),
        }
    }
}

impl LifecycleConfig {
    /// Returns the polling deadline, if one is configured.
    #[must_use]
    pub fn ready_timeout(&self) -> Option<std::time::Duration> {
        self.ready_timeout_secs
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("templates/pod_templates"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            graphql_url: String::from(DEFAULT_GRAPHQL_URL),
            rest_url: String::from(DEFAULT_REST_URL),
            timeout_secs: 30,
        }
    }
}

impl CloudType {
    /// Returns the provider's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secure => "SECURE",
            Self::Community => "COMMUNITY",
        }
    }
}

impl std::fmt::Display for CloudType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.template.ports_string(), "8888/http,666/tcp");
        assert_eq!(config.pod.min_memory_gb, 24);
        assert_eq!(config.pod.cloud_type.as_str(), "SECURE");
        assert_eq!(config.lifecycle.poll_interval_secs, 5);
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let lifecycle = LifecycleConfig {
            poll_interval_secs: 5,
            ready_timeout_secs: Some(0),
        };
        assert!(lifecycle.ready_timeout().is_none());
        assert_eq!(
            LifecycleConfig::default().ready_timeout(),
            Some(std::time::Duration::from_secs(1800))
        );
    }
}
