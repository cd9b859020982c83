//! Label resolution, lazy creation and application
use crate::client::GmailClient;
use crate::error::{AutoLabelError, Result};
use crate::models::LabelCatalog;
use tracing::{debug, info};

/// Maps label names to Gmail label ids and applies them to messages
///
/// The catalog is read fresh from Gmail on every lookup. Lookups and
/// creations are only race-free because messages are processed one at a
/// time by a single owner.
pub struct LabelManager {
    client: Box<dyn GmailClient>,
    created_labels: Vec<String>,
}

impl LabelManager {
    /// Creates a new LabelManager instance
    pub fn new(client: Box<dyn GmailClient>) -> Self {
        Self {
            client,
            created_labels: Vec::new(),
        }
    }

    /// Current custom labels of the account
    pub async fn fetch_catalog(&self) -> Result<LabelCatalog> {
        let labels = self.client.list_labels().await?;
        let catalog = LabelCatalog::from_pairs(labels.into_iter().map(|l| (l.name, l.id)));
        debug!("Loaded {} custom labels", catalog.len());
        Ok(catalog)
    }

    /// Look up a label id by name
    pub async fn resolve(&self, name: &str) -> Result<String> {
        self.fetch_catalog()
            .await?
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| AutoLabelError::LabelNotFound(name.to_string()))
    }

    /// Returns the id of `name`, creating the label first if the account lacks it
    pub async fn create_if_missing(&mut self, name: &str) -> Result<String> {
        match self.resolve(name).await {
            Ok(id) => {
                debug!("Label '{}' already exists", name);
                return Ok(id);
            }
            Err(AutoLabelError::LabelNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        info!("Creating label: {}", name);
        let label_id = self.client.create_label(name).await.map_err(|e| {
            AutoLabelError::ProviderWrite(format!("Failed to create label '{}': {}", name, e))
        })?;

        self.created_labels.push(name.to_string());
        info!("Created label '{}' with ID: {}", name, label_id);
        Ok(label_id)
    }

    /// Resolve-or-create `name`, then add it to the message
    pub async fn apply(&mut self, message_id: &str, name: &str) -> Result<()> {
        let label_id = self.create_if_missing(name).await?;
        self.add_label(message_id, name, label_id).await
    }

    /// Add an existing label to the message; `LabelNotFound` if the account lacks it
    pub async fn apply_existing(&self, message_id: &str, name: &str) -> Result<()> {
        let label_id = self.resolve(name).await?;
        self.add_label(message_id, name, label_id).await
    }

    async fn add_label(&self, message_id: &str, name: &str, label_id: String) -> Result<()> {
        self.client
            .modify_message(message_id, &[label_id])
            .await
            .map_err(|e| {
                AutoLabelError::ProviderWrite(format!(
                    "Failed to add label '{}' to message {}: {}",
                    name, message_id, e
                ))
            })?;

        debug!("Applied label '{}' to message {}", name, message_id);
        Ok(())
    }

    /// Returns the list of labels created by this manager
    pub fn get_created_labels(&self) -> &[String] {
        &self.created_labels
    }
}
