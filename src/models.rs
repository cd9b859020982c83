use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping from label name to the description shown to the classifier
pub type LabelMapping = IndexMap<String, String>;

/// Placeholder used in log entries for fields that were never filled in
pub const NOT_AVAILABLE: &str = "N/A";

/// A message payload as delivered by the mail provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "deserializers::GmailMessageJson")]
pub struct RawMessage {
    pub id: String,
    pub snippet: String,
    pub headers: Vec<(String, String)>,
    pub payload: MimeNode,
}

impl RawMessage {
    /// Case-insensitive header lookup, first match wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One node of a message's MIME tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    /// A content-carrying part; `data` holds the already-decoded body bytes
    Leaf {
        mime_type: String,
        data: Option<Vec<u8>>,
    },
    /// A container of further parts
    Multipart {
        mime_type: String,
        parts: Vec<MimeNode>,
    },
}

impl MimeNode {
    pub fn leaf(mime_type: &str, data: impl Into<Vec<u8>>) -> Self {
        MimeNode::Leaf {
            mime_type: mime_type.to_string(),
            data: Some(data.into()),
        }
    }

    pub fn multipart(mime_type: &str, parts: Vec<MimeNode>) -> Self {
        MimeNode::Multipart {
            mime_type: mime_type.to_string(),
            parts,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            MimeNode::Leaf { mime_type, .. } | MimeNode::Multipart { mime_type, .. } => mime_type,
        }
    }
}

/// System labels Gmail owns; never part of the custom catalog
pub const DEFAULT_LABELS: &[&str] = &[
    "CHAT",
    "SENT",
    "INBOX",
    "IMPORTANT",
    "TRASH",
    "DRAFT",
    "SPAM",
    "CATEGORY_FORUMS",
    "CATEGORY_UPDATES",
    "CATEGORY_PERSONAL",
    "CATEGORY_PROMOTIONS",
    "CATEGORY_SOCIAL",
    "STARRED",
    "UNREAD",
];

/// Custom label name -> provider label id, as currently present in the account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: IndexMap<String, String>,
}

impl LabelCatalog {
    /// Build a catalog from `(name, id)` pairs, dropping the system labels
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let labels = pairs
            .into_iter()
            .filter(|(name, _)| !DEFAULT_LABELS.contains(&name.as_str()))
            .collect();
        Self { labels }
    }

    /// Exact match first, then case-insensitive
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(id) = self.labels.get(name) {
            return Some(id);
        }
        self.labels
            .iter()
            .find(|(existing, _)| existing.to_lowercase() == name.to_lowercase())
            .map(|(_, id)| id.as_str())
    }

    pub fn insert(&mut self, name: String, id: String) {
        self.labels.insert(name, id);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Human-readable content of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// Label decision returned by the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub reason: String,
}

/// Outcome of processing one message (or of a whole batch, for ERROR/INFO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Success,
    SuccessLabelCreated,
    Failed,
    Error,
    Info,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Success => "SUCCESS",
            ProcessingStatus::SuccessLabelCreated => "SUCCESS_LABEL_CREATED",
            ProcessingStatus::Failed => "FAILED",
            ProcessingStatus::Error => "ERROR",
            ProcessingStatus::Info => "INFO",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One row of the batch result log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub id: String,
    pub subject: String,
    pub label: String,
    pub reason: String,
    pub status: ProcessingStatus,
}

impl ProcessingLogEntry {
    /// A fresh entry for a message about to be processed
    pub fn pending(message_id: &str) -> Self {
        Self {
            id: message_id.to_string(),
            subject: NOT_AVAILABLE.to_string(),
            label: NOT_AVAILABLE.to_string(),
            reason: NOT_AVAILABLE.to_string(),
            status: ProcessingStatus::Pending,
        }
    }

    /// A batch-level sentinel entry
    pub fn sentinel(id: &str, subject: &str, reason: impl Into<String>, status: ProcessingStatus) -> Self {
        Self {
            id: id.to_string(),
            subject: subject.to_string(),
            label: NOT_AVAILABLE.to_string(),
            reason: reason.into(),
            status,
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
        self.status = ProcessingStatus::Failed;
    }
}

/// Custom deserializers for Gmail API JSON
pub mod deserializers {
    use base64::{
        alphabet,
        engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
        Engine as _,
    };
    use serde::{de::{self, Deserializer}, Deserialize};

    use super::{MimeNode, RawMessage};

    /// Gmail emits base64url both with and without padding
    const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
        &alphabet::URL_SAFE,
        GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
    );

    /// Decode a base64url string, padded or not
    pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_LENIENT.decode(encoded.trim())
    }

    /// Deserialize base64url encoded data
    pub fn deserialize_base64url<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => decode_base64url(&s).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessageJson {
        #[serde(default)]
        id: String,
        #[serde(default)]
        snippet: String,
        #[serde(default)]
        payload: Option<GmailPartJson>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailPartJson {
        #[serde(default)]
        mime_type: String,
        #[serde(default)]
        headers: Vec<GmailHeaderJson>,
        #[serde(default)]
        body: Option<GmailBodyJson>,
        #[serde(default)]
        parts: Vec<GmailPartJson>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GmailHeaderJson {
        name: String,
        #[serde(default)]
        value: String,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct GmailBodyJson {
        #[serde(default, deserialize_with = "deserialize_base64url")]
        data: Option<Vec<u8>>,
    }

    impl From<GmailPartJson> for MimeNode {
        fn from(part: GmailPartJson) -> Self {
            if part.parts.is_empty() {
                MimeNode::Leaf {
                    mime_type: part.mime_type,
                    data: part.body.and_then(|b| b.data),
                }
            } else {
                MimeNode::Multipart {
                    mime_type: part.mime_type,
                    parts: part.parts.into_iter().map(MimeNode::from).collect(),
                }
            }
        }
    }

    impl From<GmailMessageJson> for RawMessage {
        fn from(msg: GmailMessageJson) -> Self {
            let mut payload = msg.payload.unwrap_or_default();
            let headers = std::mem::take(&mut payload.headers)
                .into_iter()
                .map(|h| (h.name, h.value))
                .collect();

            RawMessage {
                id: msg.id,
                snippet: msg.snippet,
                headers,
                payload: payload.into(),
            }
        }
    }
}
