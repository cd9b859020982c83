//! LLM-backed label classification over a bounded vocabulary

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{AutoLabelError, Result};
use crate::llm::CompletionClient;
use crate::models::{ClassificationResult, LabelMapping};

/// Markdown code fence some models wrap their JSON in
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").unwrap());

/// Classifies email bodies into one of the configured labels
pub struct LabelClassifier {
    client: Box<dyn CompletionClient>,
    max_body_chars: usize,
}

impl LabelClassifier {
    pub fn new(client: Box<dyn CompletionClient>, max_body_chars: usize) -> Self {
        Self {
            client,
            max_body_chars,
        }
    }

    /// Ask the model for a label; no retries
    ///
    /// The returned label is not checked against `mapping`; a label the
    /// account does not have yet is created downstream.
    pub async fn classify(
        &self,
        user_info: &str,
        mapping: &LabelMapping,
        body: &str,
    ) -> Result<ClassificationResult> {
        let body = truncate_chars(body, self.max_body_chars);
        let prompt = build_prompt(user_info, mapping, body);

        let reply = self
            .client
            .complete(&prompt)
            .await
            .map_err(|e| AutoLabelError::Classification(format!("completion call failed: {}", e)))?;

        debug!("Model reply: {}", reply);
        parse_classification(&reply)
    }
}

/// Build the classification prompt
///
/// Labels are listed one per line as `name: description`, in mapping order.
pub fn build_prompt(user_info: &str, mapping: &LabelMapping, body: &str) -> String {
    let vocabulary = mapping
        .iter()
        .map(|(name, description)| format!("{}: {}", name, description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You sort incoming email for the following person:\n\
         {user_info}\n\
         \n\
         Pick exactly one label for the email below from this list:\n\
         {vocabulary}\n\
         \n\
         Respond only with a JSON object of the form \
         {{\"label\": \"<label name>\", \"reason\": \"<one short sentence>\"}}.\n\
         \n\
         Email:\n\
         {body}"
    )
}

/// Parse the model's reply into a classification
pub fn parse_classification(reply: &str) -> Result<ClassificationResult> {
    let json_text = match CODE_FENCE.captures(reply) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => reply.trim(),
    };

    let value: Value = serde_json::from_str(json_text).map_err(|e| {
        AutoLabelError::Classification(format!("reply is not valid JSON ({}): {}", e, reply))
    })?;

    let label = value
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .ok_or_else(|| {
            AutoLabelError::Classification(format!("reply has no usable 'label' field: {}", reply))
        })?;

    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(ClassificationResult {
        label: label.to_string(),
        reason: reason.to_string(),
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
