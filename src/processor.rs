//! Batch orchestration: fetch, extract, classify, label, record

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::LabelClassifier;
use crate::client::GmailClient;
use crate::config::validate_batch;
use crate::error::{AutoLabelError, Result};
use crate::extractor;
use crate::label_manager::LabelManager;
use crate::llm::CompletionClient;
use crate::models::{LabelMapping, ProcessingLogEntry, ProcessingStatus};

pub const AUTH_ERROR_ID: &str = "AUTH_ERROR";
pub const CONFIG_ERROR_ID: &str = "CONFIG_ERROR";
pub const PROCESSING_ERROR_ID: &str = "PROCESSING_ERROR";
pub const INFO_ID: &str = "INFO";
pub const NO_NEW_EMAILS: &str = "No new emails found to process.";

/// Body length cap used when settings do not name one
pub const DEFAULT_MAX_BODY_CHARS: usize = 8000;

/// Inputs of one batch, fixed for its duration
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub user_info: String,
    pub label_mapping: LabelMapping,
    pub max_results: u32,
    pub max_body_chars: usize,
}

impl BatchSettings {
    pub fn new(user_info: impl Into<String>, label_mapping: LabelMapping, max_results: u32) -> Self {
        Self {
            user_info: user_info.into(),
            label_mapping,
            max_results,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_batch(self.max_results, &self.label_mapping)?;
        if self.max_body_chars == 0 {
            return Err(AutoLabelError::Config(
                "max_body_chars must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ProcessingLogEntry>,
    pub labels_created: Vec<String>,
}

impl BatchReport {
    pub fn count(&self, status: ProcessingStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Messages that ended up labeled, with or without creating the label
    pub fn labeled(&self) -> usize {
        self.count(ProcessingStatus::Success) + self.count(ProcessingStatus::SuccessLabelCreated)
    }

    /// True when the batch was aborted before any message was processed
    pub fn aborted(&self) -> bool {
        self.entries.len() == 1 && self.entries[0].status == ProcessingStatus::Error
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Drives a batch over one mailbox, strictly one message at a time
pub struct BatchProcessor {
    mail: Arc<dyn GmailClient>,
    labels: LabelManager,
    classifier: LabelClassifier,
    settings: BatchSettings,
}

impl BatchProcessor {
    pub fn new(
        mail: Box<dyn GmailClient>,
        completion: Box<dyn CompletionClient>,
        settings: BatchSettings,
    ) -> Self {
        let mail: Arc<dyn GmailClient> = Arc::from(mail);
        Self {
            labels: LabelManager::new(Box::new(Arc::clone(&mail))),
            classifier: LabelClassifier::new(completion, settings.max_body_chars),
            mail,
            settings,
        }
    }

    /// Process the most recent messages, returning one log entry per message
    ///
    /// Listing failures and empty mailboxes yield a single sentinel entry.
    pub async fn run(&mut self) -> Vec<ProcessingLogEntry> {
        if self.settings.max_results == 0 {
            info!("max_results is 0, nothing to fetch");
            return vec![no_new_emails()];
        }

        let ids = match self.mail.list_message_ids(self.settings.max_results).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to list messages: {}", e);
                return vec![ProcessingLogEntry::sentinel(
                    PROCESSING_ERROR_ID,
                    "General Processing",
                    format!("An error occurred during email processing: {}", e),
                    ProcessingStatus::Error,
                )];
            }
        };

        if ids.is_empty() {
            info!("{}", NO_NEW_EMAILS);
            return vec![no_new_emails()];
        }

        info!("Processing {} messages", ids.len());
        let mut entries = Vec::with_capacity(ids.len());
        for id in &ids {
            let entry = self.process_message(id).await;
            debug!("Message {} -> {}", id, entry.status);
            entries.push(entry);
        }
        entries
    }

    /// Run one message through extract, classify and label
    pub async fn process_message(&mut self, message_id: &str) -> ProcessingLogEntry {
        let mut entry = ProcessingLogEntry::pending(message_id);

        let raw = match self.mail.get_message(message_id).await {
            Ok(raw) => raw,
            Err(e) => return failed(entry, e),
        };
        if let Some(subject) = raw.header("Subject") {
            entry.subject = subject.to_string();
        }

        let content = match extractor::extract(&raw) {
            Ok(content) => content,
            Err(e) => return failed(entry, e),
        };

        let classification = match self
            .classifier
            .classify(
                &self.settings.user_info,
                &self.settings.label_mapping,
                &content.body,
            )
            .await
        {
            Ok(classification) => classification,
            Err(e) => return failed(entry, e),
        };
        entry.label = classification.label;
        entry.reason = classification.reason;

        match self.apply_label(message_id, &entry.label).await {
            Ok(status) => {
                entry.status = status;
                entry
            }
            Err(e) => failed(entry, e),
        }
    }

    /// Apply an existing label; a missing one is created and the apply retried once
    async fn apply_label(&mut self, message_id: &str, label: &str) -> Result<ProcessingStatus> {
        match self.labels.apply_existing(message_id, label).await {
            Ok(()) => Ok(ProcessingStatus::Success),
            Err(AutoLabelError::LabelNotFound(_)) => {
                self.labels.create_if_missing(label).await?;
                self.labels.apply_existing(message_id, label).await?;
                Ok(ProcessingStatus::SuccessLabelCreated)
            }
            Err(e) => Err(e),
        }
    }

    /// Labels this processor created so far
    pub fn created_labels(&self) -> &[String] {
        self.labels.get_created_labels()
    }
}

fn failed(mut entry: ProcessingLogEntry, error: AutoLabelError) -> ProcessingLogEntry {
    warn!("Message {} failed: {}", entry.id, error);
    entry.fail(error.to_string());
    entry
}

fn no_new_emails() -> ProcessingLogEntry {
    ProcessingLogEntry::sentinel(INFO_ID, "Email Fetch", NO_NEW_EMAILS, ProcessingStatus::Info)
}

fn auth_error(error: AutoLabelError) -> ProcessingLogEntry {
    ProcessingLogEntry::sentinel(
        AUTH_ERROR_ID,
        "Authentication",
        format!("Authentication failed. Please login or re-login. ({})", error),
        ProcessingStatus::Error,
    )
}

fn config_error(error: AutoLabelError) -> ProcessingLogEntry {
    ProcessingLogEntry::sentinel(
        CONFIG_ERROR_ID,
        "Configuration",
        error.to_string(),
        ProcessingStatus::Error,
    )
}

/// Run one batch and summarise it
pub async fn run_batch_with_report(
    mail: Result<Box<dyn GmailClient>>,
    completion: Result<Box<dyn CompletionClient>>,
    settings: Result<BatchSettings>,
) -> BatchReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!("Starting batch {}", run_id);

    let checked = match (mail, completion, settings) {
        (Err(e), _, _) => Err(auth_error(e)),
        (_, Err(e), _) | (_, _, Err(e)) => Err(config_error(e)),
        (Ok(mail), Ok(completion), Ok(settings)) => match settings.validate() {
            Ok(()) => Ok(BatchProcessor::new(mail, completion, settings)),
            Err(e) => Err(config_error(e)),
        },
    };

    let (entries, labels_created) = match checked {
        Ok(mut processor) => {
            let entries = processor.run().await;
            (entries, processor.created_labels().to_vec())
        }
        Err(entry) => {
            warn!("Batch {} aborted: {}", run_id, entry.reason);
            (vec![entry], Vec::new())
        }
    };

    let report = BatchReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        entries,
        labels_created,
    };

    info!(
        "Batch {} finished: {} labeled, {} failed, {} labels created",
        run_id,
        report.labeled(),
        report.count(ProcessingStatus::Failed),
        report.labels_created.len()
    );
    report
}

/// Run one batch; the returned log is the only error channel
pub async fn run_batch(
    mail: Result<Box<dyn GmailClient>>,
    completion: Result<Box<dyn CompletionClient>>,
    settings: Result<BatchSettings>,
) -> Vec<ProcessingLogEntry> {
    run_batch_with_report(mail, completion, settings).await.entries
}
