//! CLI module for podrun.
//!
//! This module provides the command-line interface for provisioning
//! and cleaning up `RunPod` pods.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, TemplateCommands};
pub use output::{OutputFormatter, RunSummary};
