//! Gmail API client

use async_trait::async_trait;
use google_gmail1::api::{Label, Message, MessagePart, ModifyMessageRequest};
use std::sync::Arc;
use tracing::debug;

use crate::auth::GmailHub;
use crate::error::{AutoLabelError, Result};
use crate::models::{MimeNode, RawMessage};

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";

/// Gmail caps a single list page at 500 ids
pub const MAX_LIST_RESULTS: u32 = 500;

/// Label info returned from Gmail API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// Trait defining Gmail client operations for easier testing
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List the ids of the most recent messages, newest first
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>>;

    /// Fetch a full message payload
    async fn get_message(&self, id: &str) -> Result<RawMessage>;

    /// List all labels in the account, system labels included
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a new label and return its id
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Add labels to a message
    async fn modify_message(&self, message_id: &str, add_label_ids: &[String]) -> Result<()>;
}

#[async_trait]
impl<T: GmailClient + ?Sized> GmailClient for Arc<T> {
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>> {
        (**self).list_message_ids(max_results).await
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage> {
        (**self).get_message(id).await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        (**self).list_labels().await
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        (**self).create_label(name).await
    }

    async fn modify_message(&self, message_id: &str, add_label_ids: &[String]) -> Result<()> {
        (**self).modify_message(message_id, add_label_ids).await
    }
}

/// Production Gmail client backed by the `google-gmail1` hub
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let (_, response) = self
            .hub
            .users()
            .messages_list("me")
            .max_results(max_results.min(MAX_LIST_RESULTS))
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        debug!("Listed {} message ids", ids.len());
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage> {
        let (_, message) = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;

        Ok(parse_raw_message(id, message))
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        debug!("Calling Gmail API to list labels...");
        let (_, response) = self
            .hub
            .users()
            .labels_list("me")
            .add_scope(LABELS_SCOPE)
            .doit()
            .await?;

        let labels: Vec<LabelInfo> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                _ => None,
            })
            .collect();

        debug!("Successfully parsed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let label = Label {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let (_, created_label) = self
            .hub
            .users()
            .labels_create(label, "me")
            .add_scope(LABELS_SCOPE)
            .doit()
            .await?;

        created_label
            .id
            .ok_or_else(|| AutoLabelError::Api(format!("Created label '{}' has no ID", name)))
    }

    async fn modify_message(&self, message_id: &str, add_label_ids: &[String]) -> Result<()> {
        let modify_request = ModifyMessageRequest {
            add_label_ids: Some(add_label_ids.to_vec()),
            remove_label_ids: None,
        };

        self.hub
            .users()
            .messages_modify(modify_request, "me", message_id)
            .add_scope(MODIFY_SCOPE)
            .doit()
            .await?;

        Ok(())
    }
}

/// Convert a Gmail API message (format `full`) into a `RawMessage`
///
/// `google-gmail1` has already decoded the base64url body data.
pub fn parse_raw_message(id: &str, message: Message) -> RawMessage {
    let mut payload = message.payload.unwrap_or_default();

    let headers = payload
        .headers
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| Some((h.name?, h.value.unwrap_or_default())))
        .collect();

    RawMessage {
        id: message.id.unwrap_or_else(|| id.to_string()),
        snippet: message.snippet.unwrap_or_default(),
        headers,
        payload: convert_part(payload),
    }
}

fn convert_part(part: MessagePart) -> MimeNode {
    let mime_type = part.mime_type.unwrap_or_default();
    match part.parts {
        Some(parts) if !parts.is_empty() => MimeNode::Multipart {
            mime_type,
            parts: parts.into_iter().map(convert_part).collect(),
        },
        _ => MimeNode::Leaf {
            mime_type,
            data: part.body.and_then(|body| body.data),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::{MessagePartBody, MessagePartHeader};

    fn header(name: &str, value: &str) -> MessagePartHeader {
        MessagePartHeader {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }

    fn text_part(mime_type: &str, data: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: Some(MessagePartBody {
                data: Some(data.as_bytes().to_vec()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_raw_message_multipart() {
        let message = Message {
            id: Some("abc".to_string()),
            snippet: Some("Quarterly numbers".to_string()),
            payload: Some(MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                headers: Some(vec![
                    header("From", "cfo@example.com"),
                    header("Subject", "Q3"),
                ]),
                parts: Some(vec![
                    text_part("text/plain", "numbers"),
                    text_part("text/html", "<b>numbers</b>"),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let raw = parse_raw_message("abc", message);
        assert_eq!(raw.id, "abc");
        assert_eq!(raw.snippet, "Quarterly numbers");
        assert_eq!(raw.header("subject"), Some("Q3"));
        assert_eq!(
            raw.payload,
            MimeNode::multipart(
                "multipart/alternative",
                vec![
                    MimeNode::leaf("text/plain", "numbers"),
                    MimeNode::leaf("text/html", "<b>numbers</b>"),
                ]
            )
        );
    }

    #[test]
    fn test_parse_raw_message_single_part() {
        let message = Message {
            payload: Some(text_part("text/plain", "Meeting at 3pm")),
            ..Default::default()
        };

        let raw = parse_raw_message("fallback-id", message);
        assert_eq!(raw.id, "fallback-id");
        assert!(raw.headers.is_empty());
        assert_eq!(raw.payload, MimeNode::leaf("text/plain", "Meeting at 3pm"));
    }

    #[test]
    fn test_empty_parts_list_is_a_leaf() {
        let part = MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(
            convert_part(part),
            MimeNode::Leaf {
                mime_type: "multipart/mixed".to_string(),
                data: None
            }
        );
    }
}
