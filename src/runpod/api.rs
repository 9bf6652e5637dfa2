//! The provider operations podrun depends on.
//!
//! Catalog, resolver and orchestrator are written against this trait so
//! they can be driven by a mock in tests.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::config::TemplateSpec;
use crate::error::Result;

use super::types::{CreatePodRequest, GpuOffer, Pod, PodTemplate};

/// Operations against the `RunPod` API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RunPodApi: Send + Sync {
    /// Lists every GPU type priced for a single-GPU request with at least
    /// `min_memory_gb` of memory, in provider order.
    async fn gpu_offers(&self, min_memory_gb: u32) -> Result<Vec<GpuOffer>>;

    /// Lists the templates owned by the account.
    async fn list_templates(&self) -> Result<Vec<PodTemplate>>;

    /// Creates a template named `name` from `spec`.
    async fn create_template(&self, name: &str, spec: &TemplateSpec) -> Result<PodTemplate>;

    /// Deletes a template.
    async fn delete_template(&self, template_id: &str) -> Result<()>;

    /// Creates a pod.
    async fn create_pod(&self, request: &CreatePodRequest) -> Result<Pod>;

    /// Fetches a pod's current state.
    async fn get_pod(&self, pod_id: &str) -> Result<Pod>;

    /// Terminates a pod.
    async fn terminate_pod(&self, pod_id: &str) -> Result<()>;
}
