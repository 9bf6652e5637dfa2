//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{RunConfig, ValidationResult};
use crate::runpod::{GpuOffer, PodTemplate, ResolvedTemplate, Resolution, StockStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Summary of a completed `run` command.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Terminated pod.
    pub pod_id: String,
    /// GPU type the pod ran on.
    pub gpu_type_id: String,
    /// Template the pod was launched from.
    pub template_id: String,
    /// Seconds the pod was held after becoming ready.
    pub held_secs: u64,
    /// Lifecycle phases, in order.
    pub phases: Vec<String>,
}

/// GPU offer row for table display.
#[derive(Tabled)]
struct OfferRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "GPU")]
    id: String,
    #[tabled(rename = "VRAM")]
    memory: String,
    #[tabled(rename = "$/hr")]
    price: String,
    #[tabled(rename = "Stock")]
    stock: String,
}

/// Template row for table display.
#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Disk")]
    disk: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats eligible GPU offers, cheapest first.
    #[must_use]
    pub fn format_offers(&self, offers: &[GpuOffer], min_memory_gb: u32) -> String {
        let mut sorted: Vec<&GpuOffer> = offers.iter().collect();
        sorted.sort_by(|a, b| {
            let a = a.uninterruptible_price().unwrap_or(f64::INFINITY);
            let b = b.uninterruptible_price().unwrap_or(f64::INFINITY);
            a.total_cmp(&b)
        });

        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&sorted).unwrap_or_default(),
            OutputFormat::Text => {
                if sorted.is_empty() {
                    return format!(
                        "{} No GPU with at least {min_memory_gb} GB of VRAM is available.\n",
                        "✗".red()
                    );
                }

                let rows: Vec<OfferRow> = sorted
                    .iter()
                    .enumerate()
                    .map(|(i, offer)| OfferRow {
                        index: i + 1,
                        id: offer.id.clone(),
                        memory: format!("{} GB", offer.memory_in_gb.unwrap_or_default()),
                        price: offer
                            .uninterruptible_price()
                            .map_or_else(|| String::from("-"), |p| format!("{p:.2}")),
                        stock: Self::format_stock(offer.stock_status()),
                    })
                    .collect();

                let mut output = format!(
                    "\nGPUs with at least {min_memory_gb} GB of VRAM ({} eligible)\n\n",
                    rows.len()
                );
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats the templates owned by the account.
    #[must_use]
    pub fn format_templates(&self, templates: &[PodTemplate]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(templates).unwrap_or_default(),
            OutputFormat::Text => {
                if templates.is_empty() {
                    return String::from("   No templates found.\n");
                }

                let rows: Vec<TemplateRow> = templates
                    .iter()
                    .map(|t| TemplateRow {
                        name: t.name.clone(),
                        image: Self::truncate(&t.image_name, 40),
                        disk: format!("{}/{} GB", t.container_disk_in_gb, t.volume_in_gb),
                        id: t.id.clone(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a resolved template.
    #[must_use]
    pub fn format_resolved(&self, resolved: &ResolvedTemplate) -> String {
        let how = match resolved.resolution {
            Resolution::Stored => "stored",
            Resolution::Adopted => "adopted",
            Resolution::Created => "created",
        };

        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "id": resolved.id(),
                "name": resolved.template.name,
                "spec_hash": resolved.spec_hash,
                "resolution": how,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => format!(
                "{} Template {} ({how}): {}\n",
                "✓".green(),
                resolved.template.name.bold(),
                resolved.id()
            ),
        }
    }

    /// Formats a completed run.
    #[must_use]
    pub fn format_run(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Run complete\n\n", "✓".green());
                let _ = writeln!(output, "   Pod: {} (terminated)", summary.pod_id);
                let _ = writeln!(output, "   GPU: {}", summary.gpu_type_id);
                let _ = writeln!(output, "   Template: {}", summary.template_id);
                let _ = writeln!(output, "   Held: {}s", summary.held_secs);
                let _ = writeln!(output, "   Phases: {}", summary.phases.join(" -> ").dimmed());
                output
            }
        }
    }

    /// Formats a validation outcome with a configuration summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &RunConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "warnings": result.warnings,
                "config": config,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "   Template: {} ({})", config.template.name, config.template.image);
                let _ = writeln!(output, "   Ports: {}", config.template.ports_string());
                let _ = writeln!(output, "   Pod: {}", config.pod.name);
                let _ = writeln!(output, "   Min VRAM: {} GB", config.pod.min_memory_gb);
                let _ = writeln!(output, "   Cloud: {}", config.pod.cloud_type);
                let timeout = config
                    .lifecycle
                    .ready_timeout()
                    .map_or_else(|| String::from("none"), |t| format!("{}s", t.as_secs()));
                let _ = writeln!(output, "   Ready timeout: {timeout}");
                output
            }
        }
    }

    /// Formats a stock status with color.
    fn format_stock(status: Option<StockStatus>) -> String {
        match status {
            Some(StockStatus::High) => "high".green().to_string(),
            Some(StockStatus::Medium) => "medium".yellow().to_string(),
            Some(StockStatus::Low) => "low".red().to_string(),
            Some(StockStatus::NoStock) => "none".red().to_string(),
            Some(StockStatus::Other) | None => "unknown".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runpod::LowestPrice;

    fn offer(id: &str, price: f64) -> GpuOffer {
        GpuOffer {
            id: id.to_string(),
            display_name: id.to_string(),
            memory_in_gb: Some(24),
            lowest_price: Some(LowestPrice {
                uninterruptable_price: Some(price),
                minimum_bid_price: None,
                stock_status: Some(StockStatus::High),
            }),
        }
    }

    #[test]
    fn test_offers_sorted_by_price() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_offers(&[offer("pricey", 2.0), offer("cheap", 0.4)], 24);

        let cheap = output.find("cheap").expect("cheap listed");
        let pricey = output.find("pricey").expect("pricey listed");
        assert!(cheap < pricey);
        assert!(output.contains("0.40"));
    }

    #[test]
    fn test_empty_offers_message() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        assert!(formatter.format_offers(&[], 64).contains("64 GB"));
    }

    #[test]
    fn test_run_summary_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let summary = RunSummary {
            pod_id: String::from("pod-1"),
            gpu_type_id: String::from("NVIDIA RTX A5000"),
            template_id: String::from("tmpl-1"),
            held_secs: 0,
            phases: vec![String::from("READY"), String::from("TERMINATED")],
        };

        let value: serde_json::Value =
            serde_json::from_str(&formatter.format_run(&summary)).expect("valid json");
        assert_eq!(value["pod_id"], "pod-1");
        assert_eq!(value["phases"][1], "TERMINATED");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("ééééééééééé", 6), "ééé...");
    }
}
