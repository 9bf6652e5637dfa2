//! `RunPod` API integration module.
//!
//! This module provides the API client, the GPU price catalog and the
//! template resolver.

mod api;
mod catalog;
mod client;
mod templates;
mod types;

pub use api::RunPodApi;
#[cfg(test)]
pub use api::MockRunPodApi;
pub use catalog::{PriceCatalog, eligible_offers, is_eligible, select_cheapest};
pub use client::RunPodClient;
pub use templates::{ResolvedTemplate, Resolution, TemplateResolver};
pub use types::{
    CreatePodRequest, GpuOffer, LowestPrice, Pod, PodMachine, PodStatus, PodTemplate, StockStatus,
};
