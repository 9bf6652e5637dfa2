//! Podrun CLI entrypoint.
//!
//! This is the main entrypoint for the podrun command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use podrun::cli::{Cli, Commands, OutputFormatter, RunSummary, TemplateCommands};
use podrun::config::{
    ConfigParser, ConfigValidator, Credentials, RunConfig, ValidationResult, find_config_file,
};
use podrun::error::Result;
use podrun::lifecycle::PodLifecycleOrchestrator;
use podrun::runpod::{PriceCatalog, RunPodApi, RunPodClient, TemplateResolver};
use podrun::state::LocalTemplateStore;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_leaked_pod() => {
            eprintln!("{} {e}", "LEAKED POD:".red().bold());
            eprintln!("The pod may still be billing. Retry with 'podrun terminate <pod-id>'.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = resolve_config_path(cli.config.as_ref());
    let config_path = config_path.as_deref();

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Gpus { min_memory } => cmd_gpus(config_path, min_memory, &formatter).await,
        Commands::Templates { command } => cmd_templates(config_path, command, &formatter).await,
        Commands::Run { timeout, hold } => cmd_run(config_path, timeout, hold, &formatter).await,
        Commands::Terminate { pod_id } => cmd_terminate(config_path, &pod_id).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&Path>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, result) = load_config(config_path)?;

    if let Err(e) = Credentials::from_env() {
        warn!("{e}");
    }

    eprintln!("{}", formatter.format_validation(&config, &result, show_warnings));
    Ok(())
}

/// List eligible GPU offers.
async fn cmd_gpus(
    config_path: Option<&Path>,
    min_memory: Option<u32>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = create_runpod_client(&config)?;

    let min_memory_gb = min_memory.unwrap_or(config.pod.min_memory_gb);
    let offers = PriceCatalog::new(&client).list_eligible(min_memory_gb).await?;

    eprintln!("{}", formatter.format_offers(&offers, min_memory_gb));
    Ok(())
}

/// Template management commands.
async fn cmd_templates(
    config_path: Option<&Path>,
    command: TemplateCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = create_runpod_client(&config)?;
    let store = LocalTemplateStore::with_base_dir(&config.store.dir);
    let resolver = TemplateResolver::new(&client, &store);

    match command {
        TemplateCommands::List => {
            let templates = resolver.list_remote().await?;
            eprintln!("{}", formatter.format_templates(&templates));
        }
        TemplateCommands::Resolve => {
            let resolved = resolver.resolve_template(&config.template).await?;
            eprintln!("{}", formatter.format_resolved(&resolved));
        }
        TemplateCommands::Delete { template_id } => {
            resolver.delete(&template_id).await?;
            eprintln!("Template {template_id} deleted.");
        }
    }

    Ok(())
}

/// Provision a pod, hold it, then terminate it.
async fn cmd_run(
    config_path: Option<&Path>,
    timeout: Option<u64>,
    hold: u64,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (mut config, _) = load_config(config_path)?;
    if let Some(secs) = timeout {
        config.lifecycle.ready_timeout_secs = Some(secs);
    }

    let client = create_runpod_client(&config)?;
    let store = LocalTemplateStore::with_base_dir(&config.store.dir);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let orchestrator = PodLifecycleOrchestrator::new(&client, &store, &config);
    let result = orchestrator
        .run(&cancel, |pod| async move {
            info!("Pod {} is ready on {}", pod.id, pod.gpu_type_id().unwrap_or("unknown GPU"));
            if hold > 0 {
                info!("Holding pod for {hold}s");
                tokio::time::sleep(Duration::from_secs(hold)).await;
            }
            Ok(hold)
        })
        .await;
    watcher.abort();

    let outcome = result?;
    let summary = RunSummary {
        pod_id: outcome.pod_id,
        gpu_type_id: outcome.gpu_type_id,
        template_id: outcome.template_id,
        held_secs: outcome.output,
        phases: orchestrator.phases().iter().map(ToString::to_string).collect(),
    };

    eprintln!("{}", formatter.format_run(&summary));
    Ok(())
}

/// Terminate a pod by ID.
async fn cmd_terminate(config_path: Option<&Path>, pod_id: &str) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let client = create_runpod_client(&config)?;

    client.terminate_pod(pod_id).await?;
    eprintln!("Pod {pod_id} terminated.");
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path, if any.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Option<PathBuf> {
    config_path.cloned().or_else(|| find_config_file("."))
}

/// Loads and validates the configuration.
fn load_config(config_path: Option<&Path>) -> Result<(RunConfig, ValidationResult)> {
    let base = config_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    match config_path {
        Some(path) => debug!("Loading configuration from: {}", path.display()),
        None => debug!("No configuration file found, using defaults"),
    }
    let config = parser.load_with_env(config_path)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        debug!("Configuration warning: {warning}");
    }

    Ok((config, result))
}

/// Creates a `RunPod` API client from the environment credential.
fn create_runpod_client(config: &RunConfig) -> Result<RunPodClient> {
    let credentials = Credentials::from_env()?;
    RunPodClient::new(credentials, &config.api)
}
