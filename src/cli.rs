//! Command-line interface

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::auth;
use crate::client::{GmailClient, LabelInfo, ProductionGmailClient};
use crate::config::Config;
use crate::error::{AutoLabelError, Result};
use crate::extractor;
use crate::llm::{build_completion_client, CompletionClient};
use crate::models::{EmailContent, LabelCatalog, ProcessingStatus, RawMessage};
use crate::processor::{run_batch_with_report, BatchReport, BatchSettings};

#[derive(Parser, Debug)]
#[command(name = "gmail-autolabel")]
#[command(version = "0.1.0")]
#[command(about = "Label incoming Gmail messages with an LLM", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file (overrides auth.credentials)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Path to token cache file (overrides auth.token_cache)
    #[arg(long)]
    pub token_cache: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Classify and label the most recent messages
    Run {
        /// Print the raw result log as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the account's custom labels
    Labels,

    /// Show what the extractor makes of a message saved as Gmail API JSON
    Extract {
        /// Path to a `users.messages.get` (format=full) JSON response
        file: PathBuf,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Delete the cached OAuth2 token
    Logout,
}

impl Cli {
    pub fn credentials_path<'a>(&'a self, config: &'a Config) -> &'a Path {
        self.credentials
            .as_deref()
            .unwrap_or(config.auth.credentials.as_path())
    }

    pub fn token_cache_path<'a>(&'a self, config: &'a Config) -> &'a Path {
        self.token_cache
            .as_deref()
            .unwrap_or(config.auth.token_cache.as_path())
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        println!("  ✓ {}", msg);
    }
}

/// Build the production mail client, running the OAuth flow if needed
pub async fn connect_gmail(credentials: &Path, token_cache: &Path) -> Result<Box<dyn GmailClient>> {
    let hub = auth::initialize_gmail_hub(credentials, token_cache).await?;
    Ok(Box::new(ProductionGmailClient::new(hub)))
}

/// Completion client and batch settings for a `run`
///
/// An unusable configuration becomes a `Config` error on both, so the batch
/// aborts with a single `CONFIG_ERROR` entry.
pub fn batch_inputs(
    config: &Result<Config>,
) -> (Result<Box<dyn CompletionClient>>, Result<BatchSettings>) {
    match config {
        Ok(config) => (build_completion_client(&config.llm), config.batch_settings()),
        Err(e) => {
            let reason = match e {
                AutoLabelError::Config(msg) => msg.clone(),
                other => other.to_string(),
            };
            (
                Err(AutoLabelError::Config(reason.clone())),
                Err(AutoLabelError::Config(reason)),
            )
        }
    }
}

/// The `run` command: one batch over the most recent messages
pub async fn run_autolabel(cli: &Cli, config: &Result<Config>, multi: MultiProgress) -> BatchReport {
    let progress = ProgressReporter::new(multi);

    // Auth paths still resolve from defaults and flags without a config file
    let fallback = Config::default();
    let paths = config.as_ref().unwrap_or(&fallback);

    let spinner = progress.add_spinner("Connecting to Gmail...");
    let mail = connect_gmail(cli.credentials_path(paths), cli.token_cache_path(paths)).await;
    match &mail {
        Ok(_) => progress.finish_spinner(&spinner, "Connected to Gmail"),
        Err(_) => spinner.finish_and_clear(),
    }

    let (completion, settings) = batch_inputs(config);

    let spinner = progress.add_spinner(&format!(
        "Labelling up to {} messages with {}...",
        paths.batch.max_results, paths.llm.model
    ));
    let report = run_batch_with_report(mail, completion, settings).await;
    progress.finish_spinner(
        &spinner,
        &format!("Processed {} log entries", report.entries.len()),
    );

    report
}

/// The `labels` command: custom labels of the account, system labels excluded
pub async fn list_custom_labels(mail: &dyn GmailClient) -> Result<LabelCatalog> {
    let labels: Vec<LabelInfo> = mail.list_labels().await?;
    Ok(LabelCatalog::from_pairs(
        labels.into_iter().map(|label| (label.name, label.id)),
    ))
}

/// The `extract` command: parse a saved Gmail JSON message and extract it
pub async fn extract_file(path: &Path) -> anyhow::Result<EmailContent> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let raw: RawMessage = serde_json::from_str(&content)
        .with_context(|| format!("{:?} is not a Gmail message JSON document", path))?;

    info!("Loaded message {} from {:?}", raw.id, path);
    Ok(extractor::extract(&raw)?)
}

/// Render a batch report as a plain-text table with a summary footer
pub fn render_report(report: &BatchReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{:<18} {:<40} {:<16} {:<22} {}\n",
        "ID", "SUBJECT", "LABEL", "STATUS", "REASON"
    ));
    out.push_str(&format!("{}\n", "-".repeat(110)));
    for entry in &report.entries {
        out.push_str(&format!(
            "{:<18} {:<40} {:<16} {:<22} {}\n",
            truncate_string(&entry.id, 18),
            truncate_string(&entry.subject, 40),
            truncate_string(&entry.label, 16),
            entry.status,
            entry.reason
        ));
    }

    out.push_str("\n========================================\n");
    out.push_str("Batch Summary\n");
    out.push_str("========================================\n");
    out.push_str(&format!("Run ID: {}\n", report.run_id));
    out.push_str(&format!(
        "Started: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "Duration: {:.1} seconds\n",
        report.duration().num_milliseconds() as f64 / 1000.0
    ));
    out.push_str(&format!(
        "Labeled: {} ({} with a new label)\n",
        report.labeled(),
        report.count(ProcessingStatus::SuccessLabelCreated)
    ));
    out.push_str(&format!("Failed: {}\n", report.count(ProcessingStatus::Failed)));
    if report.labels_created.is_empty() {
        out.push_str("Labels created: none\n");
    } else {
        out.push_str(&format!(
            "Labels created: {}\n",
            report.labels_created.join(", ")
        ));
    }
    out.push_str("========================================\n");
    out
}
