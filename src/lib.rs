// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Tests assert with unwrap/expect freely
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Podrun
//!
//! Provision the cheapest qualifying `RunPod` GPU pod, wait for it to run,
//! hand it to your work, and tear it down.
//!
//! ## Overview
//!
//! A run goes through a fixed sequence:
//!
//! 1. **Template**: reuse a launch template whose spec hash matches, or
//!    create one and record it locally
//! 2. **GPU**: pick the cheapest in-stock offer with enough VRAM
//! 3. **Pod**: create the pod and poll until it reports RUNNING
//! 4. **Work**: hand the running pod to the caller
//! 5. **Teardown**: terminate the pod, on success and on failure alike
//!
//! ## Modules
//!
//! - [`config`]: Run configuration, credentials and validation
//! - [`runpod`]: `RunPod` API client, price catalog and template resolver
//! - [`state`]: Local template store
//! - [`lifecycle`]: Pod lifecycle orchestration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! template:
//!   name: comic-gen-template
//!   image: runpod/pytorch:2.1.0-py3.10-cuda11.8.0-devel-ubuntu22.04
//!   ports: ["8888/http", "666/tcp"]
//!
//! pod:
//!   name: ComicGenPod
//!   min_memory_gb: 24
//!
//! lifecycle:
//!   ready_timeout_secs: 1800
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod runpod;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, Credentials, RunConfig, SpecHasher};
pub use error::{PodrunError, Result};
pub use lifecycle::{LifecyclePhase, PodLifecycleOrchestrator, ReadyPod, RunOutcome};
pub use runpod::{PriceCatalog, RunPodApi, RunPodClient, TemplateResolver};
pub use state::{LocalTemplateStore, TemplateStore};
