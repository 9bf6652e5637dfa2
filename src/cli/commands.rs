//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Podrun - provision the cheapest `RunPod` GPU pod, use it, tear it down.
#[derive(Parser, Debug)]
#[command(name = "podrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "PODRUN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the run configuration.
    Validate {
        /// Show warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// List GPU offers that qualify for the configured memory floor.
    Gpus {
        /// Override the minimum VRAM in GB.
        #[arg(long)]
        min_memory: Option<u32>,
    },

    /// Manage launch templates.
    Templates {
        /// Template subcommand.
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// Provision a pod, wait for it to run, then terminate it.
    Run {
        /// Seconds to wait for RUNNING (0 waits indefinitely).
        #[arg(long)]
        timeout: Option<u64>,

        /// Seconds to keep the pod running before terminating it.
        #[arg(long, default_value = "0")]
        hold: u64,
    },

    /// Terminate a pod by ID.
    Terminate {
        /// ID of the pod to terminate.
        pod_id: String,
    },
}

/// Template management subcommands.
#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List templates owned by the account.
    List,

    /// Resolve the configured template, creating it if needed.
    Resolve,

    /// Delete a template by ID.
    Delete {
        /// ID of the template to delete.
        template_id: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
