//! `RunPod` API types and data structures.
//!
//! This module defines the types used for communication with the `RunPod` API.

use serde::{Deserialize, Serialize};

use crate::config::{CloudType, PodSpec};

/// A GPU type annotated with its lowest current price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpuOffer {
    /// GPU type ID, used as the selection key.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Memory in GB.
    #[serde(default)]
    pub memory_in_gb: Option<u32>,
    /// Lowest price for a single-GPU request.
    #[serde(default)]
    pub lowest_price: Option<LowestPrice>,
}

/// Lowest price record for a GPU type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LowestPrice {
    /// Hourly rate for non-interruptible use.
    #[serde(default)]
    pub uninterruptable_price: Option<f64>,
    /// Minimum spot bid.
    #[serde(default)]
    pub minimum_bid_price: Option<f64>,
    /// Stock availability.
    #[serde(default)]
    pub stock_status: Option<StockStatus>,
}

/// Stock availability reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StockStatus {
    /// Plenty of stock.
    High,
    /// Some stock.
    Medium,
    /// Little stock.
    Low,
    /// Out of stock.
    #[serde(rename = "No-Stock")]
    NoStock,
    /// Any value not known to this client.
    #[serde(other)]
    Other,
}

/// A pod template as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    /// Template ID, assigned at creation.
    pub id: String,
    /// Template name.
    pub name: String,
    /// Container image.
    #[serde(default)]
    pub image_name: String,
    /// Container disk in GB.
    #[serde(default)]
    pub container_disk_in_gb: u32,
    /// Volume in GB.
    #[serde(default)]
    pub volume_in_gb: u32,
    /// Volume mount path.
    #[serde(default)]
    pub volume_mount_path: Option<String>,
    /// Exposed ports.
    #[serde(default)]
    pub ports: Option<String>,
}

/// A `RunPod` pod instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// Unique pod identifier.
    pub id: String,
    /// Pod name.
    #[serde(default)]
    pub name: String,
    /// Current status.
    #[serde(default)]
    pub desired_status: PodStatus,
    /// Image name.
    #[serde(default)]
    pub image_name: String,
    /// Machine information.
    #[serde(default)]
    pub machine: Option<PodMachine>,
    /// GPU count.
    #[serde(default)]
    pub gpu_count: u32,
    /// Volume in GB.
    #[serde(default)]
    pub volume_in_gb: u32,
    /// Container disk in GB.
    #[serde(default)]
    pub container_disk_in_gb: u32,
    /// Hourly cost charged for the pod.
    #[serde(default)]
    pub cost_per_hr: Option<f64>,
}

/// Pod machine information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodMachine {
    /// GPU type identifier.
    pub gpu_type_id: Option<String>,
}

/// Pod status enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodStatus {
    /// Pod has been accepted but not scheduled.
    Created,
    /// Pod is waiting for resources.
    Pending,
    /// Pod is running.
    Running,
    /// Pod is being restarted.
    Restarting,
    /// Container exited.
    Exited,
    /// Pod has been terminated.
    Terminated,
    /// Unknown status.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Request to create a new pod.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePodRequest {
    /// Pod name.
    pub name: String,
    /// Template to launch from.
    pub template_id: String,
    /// GPU type ID.
    pub gpu_type_id: String,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Volume in GB.
    pub volume_in_gb: u32,
    /// Container disk in GB.
    pub container_disk_in_gb: u32,
    /// Cloud type (SECURE or COMMUNITY).
    pub cloud_type: CloudType,
    /// Container image override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

impl GpuOffer {
    /// Returns the non-interruptible hourly price, ignoring non-finite values.
    #[must_use]
    pub fn uninterruptible_price(&self) -> Option<f64> {
        self.lowest_price
            .as_ref()
            .and_then(|p| p.uninterruptable_price)
            .filter(|price| price.is_finite())
    }

    /// Returns the reported stock status, if any.
    #[must_use]
    pub fn stock_status(&self) -> Option<StockStatus> {
        self.lowest_price.as_ref().and_then(|p| p.stock_status)
    }

    /// Returns true if the provider reports no stock.
    #[must_use]
    pub fn is_out_of_stock(&self) -> bool {
        self.stock_status() == Some(StockStatus::NoStock)
    }
}

impl Pod {
    /// Returns the GPU type ID if available.
    #[must_use]
    pub fn gpu_type_id(&self) -> Option<&str> {
        self.machine
            .as_ref()
            .and_then(|m| m.gpu_type_id.as_deref())
    }

    /// Checks if the pod is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.desired_status, PodStatus::Running)
    }
}

impl PodStatus {
    /// Returns true if the pod can no longer become RUNNING.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Exited | Self::Terminated)
    }
}

impl CreatePodRequest {
    /// Builds a creation request from pod sizing, a template and a GPU type.
    #[must_use]
    pub fn from_spec(spec: &PodSpec, template_id: &str, gpu_type_id: &str) -> Self {
        Self {
            name: spec.name.clone(),
            template_id: template_id.to_string(),
            gpu_type_id: gpu_type_id.to_string(),
            gpu_count: spec.gpu_count,
            volume_in_gb: spec.volume_gb,
            container_disk_in_gb: spec.container_disk_gb,
            cloud_type: spec.cloud_type,
            image_name: None,
        }
    }

    /// Sets the container image override.
    #[must_use]
    pub fn with_image(mut self, image: &str) -> Self {
        self.image_name = Some(image.to_string());
        self
    }
}

impl std::fmt::Display for PodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Restarting => "RESTARTING",
            Self::Exited => "EXITED",
            Self::Terminated => "TERMINATED",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{status}")
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::NoStock => "No-Stock",
            Self::Other => "Other",
        };
        write!(f, "{status}")
    }
}
