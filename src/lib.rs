//! Gmail Auto-Labelling
//!
//! Classifies recent Gmail messages into a small, user-defined set of labels
//! with a large-language-model completion call and applies the chosen label,
//! creating it on first use.
//!
//! # Overview
//!
//! - **Extraction**: readable text from nested multipart MIME payloads
//! - **Classification**: bounded-vocabulary prompt, JSON answer
//! - **Label Management**: live label lookup with lazy creation
//! - **Orchestration**: sequential batch with a per-message result log
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_autolabel::{cli, config::Config, llm, processor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let mail = cli::connect_gmail(
//!         &config.auth.credentials,
//!         &config.auth.token_cache,
//!     ).await;
//!     let completion = llm::build_completion_client(&config.llm);
//!
//!     let log = processor::run_batch(mail, completion, config.batch_settings()).await;
//!     for entry in log {
//!         println!("{} {} {}", entry.id, entry.label, entry.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`client`] - Gmail API client trait and production implementation
//! - [`extractor`] - Sender, subject and body extraction
//! - [`llm`] - Completion back-ends (OpenAI-compatible, Ollama)
//! - [`classifier`] - Prompt construction and answer parsing
//! - [`label_manager`] - Label resolution, creation and application
//! - [`processor`] - Batch orchestration and reporting
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod label_manager;
pub mod llm;
pub mod models;
pub mod processor;

// Re-export commonly used types for convenience
pub use error::{AutoLabelError, Result};

// Core data models
pub use models::{
    ClassificationResult, EmailContent, LabelCatalog, LabelMapping, MimeNode, ProcessingLogEntry,
    ProcessingStatus, RawMessage,
};

// Config types
pub use config::{AuthConfig, BatchConfig, Config, LlmConfig, LlmProvider};

// Client traits
pub use client::{GmailClient, LabelInfo, ProductionGmailClient};
pub use llm::CompletionClient;

// Pipeline
pub use classifier::LabelClassifier;
pub use extractor::extract;
pub use label_manager::LabelManager;
pub use processor::{run_batch, run_batch_with_report, BatchProcessor, BatchReport, BatchSettings};
