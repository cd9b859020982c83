//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use gmail_autolabel::client::{GmailClient, LabelInfo};
use gmail_autolabel::error::{AutoLabelError, Result};
use gmail_autolabel::llm::CompletionClient;
use gmail_autolabel::models::{LabelMapping, MimeNode, RawMessage};
use mockall::mock;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Build a raw message with From/Subject headers
pub fn raw_message(id: &str, from: &str, subject: &str, payload: MimeNode) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        snippet: format!("snippet of {}", id),
        headers: vec![
            ("From".to_string(), from.to_string()),
            ("Subject".to_string(), subject.to_string()),
        ],
        payload,
    }
}

/// Single-part text/plain message
pub fn plain_message(id: &str, subject: &str, body: &str) -> RawMessage {
    raw_message(
        id,
        "Sender <sender@example.com>",
        subject,
        MimeNode::leaf("text/plain", body),
    )
}

/// Message without a Subject header
pub fn message_without_subject(id: &str) -> RawMessage {
    let mut message = plain_message(id, "ignored", "body");
    message.headers.retain(|(name, _)| name != "Subject");
    message
}

pub fn label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Gmail's system labels as `users.labels.list` returns them
pub fn system_labels() -> Vec<LabelInfo> {
    ["INBOX", "SENT", "TRASH", "SPAM", "UNREAD", "CATEGORY_PROMOTIONS"]
        .iter()
        .map(|name| label_info(name, name))
        .collect()
}

pub fn test_mapping() -> LabelMapping {
    let mut mapping = LabelMapping::new();
    mapping.insert("Work".to_string(), "Colleagues and projects".to_string());
    mapping.insert("Finance".to_string(), "Invoices, receipts and bank mail".to_string());
    mapping
}

/// base64url without padding, the way Gmail usually sends body data
pub fn b64url(text: &str) -> String {
    URL_SAFE_NO_PAD.encode(text.as_bytes())
}

/// Mock Gmail API message response (format=full)
pub fn mock_gmail_message_response(
    id: &str,
    from: &str,
    subject: &str,
    parts: serde_json::Value,
) -> serde_json::Value {
    json!({
        "id": id,
        "threadId": format!("thread_{}", id),
        "labelIds": ["INBOX", "UNREAD"],
        "snippet": "Email snippet...",
        "payload": {
            "mimeType": "multipart/mixed",
            "headers": [
                {"name": "From", "value": from},
                {"name": "To", "value": "me@example.com"},
                {"name": "Subject", "value": subject}
            ],
            "body": {"size": 0},
            "parts": parts
        }
    })
}

/// In-memory mailbox; labels created through it show up in later listings
#[derive(Default)]
pub struct FakeMailbox {
    pub messages: Vec<RawMessage>,
    pub labels: Mutex<Vec<LabelInfo>>,
    /// (message id, label ids) per modify call
    pub applied: Mutex<Vec<(String, Vec<String>)>>,
    pub list_error: Option<String>,
    /// Message ids whose modify call fails
    pub reject_modify_for: Vec<String>,
    pub create_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
}

impl FakeMailbox {
    pub fn new(messages: Vec<RawMessage>, labels: Vec<LabelInfo>) -> Self {
        Self {
            messages,
            labels: Mutex::new(labels),
            ..Default::default()
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<(String, Vec<String>)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn label_id(&self, name: &str) -> Option<String> {
        self.labels
            .lock()
            .unwrap()
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.id.clone())
    }
}

#[async_trait]
impl GmailClient for FakeMailbox {
    async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>> {
        if let Some(err) = &self.list_error {
            return Err(AutoLabelError::Network(err.clone()));
        }
        Ok(self
            .messages
            .iter()
            .take(max_results as usize)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| AutoLabelError::NotFound(format!("message {}", id)))
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("Label_new_{}", n + 1);
        self.labels.lock().unwrap().push(label_info(&id, name));
        Ok(id)
    }

    async fn modify_message(&self, message_id: &str, add_label_ids: &[String]) -> Result<()> {
        if self.reject_modify_for.iter().any(|id| id == message_id) {
            return Err(AutoLabelError::Auth("HTTP 403: Forbidden".to_string()));
        }
        self.applied
            .lock()
            .unwrap()
            .push((message_id.to_string(), add_label_ids.to_vec()));
        Ok(())
    }
}

mock! {
    pub GmailClient {}

    #[async_trait]
    impl GmailClient for GmailClient {
        async fn list_message_ids(&self, max_results: u32) -> Result<Vec<String>>;
        async fn get_message(&self, id: &str) -> Result<RawMessage>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<String>;
        async fn modify_message(&self, message_id: &str, add_label_ids: &[String]) -> Result<()>;
    }
}

mock! {
    pub Completion {}

    #[async_trait]
    impl CompletionClient for Completion {
        async fn complete(&self, prompt: &str) -> Result<String>;
    }
}

/// Completion mock that answers every prompt with `reply`
pub fn completion_replying(reply: &'static str) -> MockCompletion {
    let mut completion = MockCompletion::new();
    completion
        .expect_complete()
        .returning(move |_| Ok(reply.to_string()));
    completion
}

/// Completion mock that must never be called
pub fn completion_never_called() -> MockCompletion {
    let mut completion = MockCompletion::new();
    completion.expect_complete().times(0);
    completion
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_headers() {
        let message = plain_message("m1", "Hello", "Body");
        assert_eq!(message.header("subject"), Some("Hello"));
        assert!(message.header("From").is_some());
    }

    #[test]
    fn test_mock_gmail_message_response_parses() {
        let value = mock_gmail_message_response(
            "m2",
            "a@example.com",
            "Hi",
            json!([{"mimeType": "text/plain", "body": {"data": b64url("hey")}}]),
        );
        let message: RawMessage = serde_json::from_value(value).unwrap();
        assert_eq!(message.id, "m2");
    }
}
