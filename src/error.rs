use thiserror::Error;

/// Type alias for Result with AutoLabelError
pub type Result<T> = std::result::Result<T, AutoLabelError>;

/// Error types for the auto-labelling pipeline
///
/// The first six variants make up the pipeline taxonomy: configuration and
/// authentication errors abort a batch before any message is touched, the
/// message-level errors fail a single message and are recorded in its log entry.
#[derive(Error, Debug)]
pub enum AutoLabelError {
    /// Missing or invalid batch inputs
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mail provider client is unusable
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Required headers missing or body undecodable
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Completion call failed or returned an unusable answer
    #[error("Classification failed: {0}")]
    Classification(String),

    /// Label name absent from the account's label catalog
    #[error("Label not found: {0}")]
    LabelNotFound(String),

    /// Provider rejected a label write
    #[error("Failed to apply label: {0}")]
    ProviderWrite(String),

    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    Api(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AutoLabelError {
    /// Errors that abort a whole batch rather than a single message
    pub fn is_batch_level(&self) -> bool {
        matches!(self, AutoLabelError::Config(_) | AutoLabelError::Auth(_))
    }
}

impl From<google_gmail1::Error> for AutoLabelError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // HTTP response with status code (non-success responses)
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    400 => AutoLabelError::BadRequest(message),
                    401 | 403 => AutoLabelError::Auth(message),
                    404 => AutoLabelError::NotFound(message),
                    500..=599 => AutoLabelError::Server {
                        status: status_code,
                        message,
                    },
                    _ => AutoLabelError::Api(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => {
                AutoLabelError::BadRequest(format!("{}", err))
            }
            google_gmail1::Error::HttpError(ref err) => {
                AutoLabelError::Network(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => AutoLabelError::Network(err.to_string()),
            google_gmail1::Error::MissingToken(err) => AutoLabelError::Auth(err.to_string()),
            _ => AutoLabelError::Api(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for AutoLabelError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => AutoLabelError::Api(format!("HTTP {}: {}", status.as_u16(), error)),
            None => AutoLabelError::Network(error.to_string()),
        }
    }
}
