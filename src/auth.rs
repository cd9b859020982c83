//! OAuth2 authentication management for Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AutoLabelError, Result};

/// Gmail API scopes required for labelling
///
/// - gmail.modify: read messages and add labels (no permanent deletion)
/// - gmail.labels: list and create labels
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.labels",
];

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Initialize Gmail API hub with OAuth2 authentication
///
/// Runs the installed-app flow (a browser window opens on first use) and
/// persists tokens to `token_cache_path` for automatic refresh.
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<GmailHub> {
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| AutoLabelError::Auth(format!("Failed to read credentials: {}", e)))?;

    if let Some(parent) = token_cache_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| AutoLabelError::Auth(format!("Failed to build authenticator: {}", e)))?;

    // Obtain the token up front so it is cached with every scope we need
    let _token = auth
        .token(REQUIRED_SCOPES)
        .await
        .map_err(|e| AutoLabelError::Auth(format!("Failed to obtain token: {}", e)))?;

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }

    // HTTP/1 works better with google-gmail1
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| AutoLabelError::Auth(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    debug!("Gmail hub initialized");
    Ok(Gmail::new(client, auth))
}

/// Whether a non-empty token cache exists
///
/// Only checks that a token was stored; it may still be expired or revoked.
pub fn is_authenticated(token_cache_path: &Path) -> bool {
    std::fs::read_to_string(token_cache_path)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .map(|value| match value {
            serde_json::Value::Array(tokens) => !tokens.is_empty(),
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => false,
        })
        .unwrap_or(false)
}

/// Remove the token cache; returns whether a token was removed
pub async fn logout(token_cache_path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(token_cache_path).await {
        Ok(()) => {
            info!("Removed token cache {:?}", token_cache_path);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Restrict token file permissions to the owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs instead of mode bits; nothing to do
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_secure_token_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "test content")
            .await
            .unwrap();

        secure_token_file(temp_file.path()).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = tokio::fs::metadata(temp_file.path()).await.unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn test_is_authenticated() {
        let dir = TempDir::new().unwrap();
        let token = dir.path().join("token.json");

        assert!(!is_authenticated(&token));

        std::fs::write(&token, "[]").unwrap();
        assert!(!is_authenticated(&token));

        std::fs::write(&token, "not json").unwrap();
        assert!(!is_authenticated(&token));

        std::fs::write(
            &token,
            r#"[{"scopes": ["https://www.googleapis.com/auth/gmail.modify"], "token": {"access_token": "ya29"}}]"#,
        )
        .unwrap();
        assert!(is_authenticated(&token));
    }

    #[tokio::test]
    async fn test_logout_removes_token() {
        let dir = TempDir::new().unwrap();
        let token = dir.path().join("token.json");
        tokio::fs::write(&token, "[{}]").await.unwrap();

        assert!(logout(&token).await.unwrap());
        assert!(!token.exists());
        assert!(!logout(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_credentials_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let result = initialize_gmail_hub(
            &dir.path().join("missing-credentials.json"),
            &dir.path().join("token.json"),
        )
        .await;
        assert!(matches!(result, Err(AutoLabelError::Auth(_))));
    }

    #[test]
    fn test_scopes_constants() {
        assert_eq!(REQUIRED_SCOPES.len(), 2);
        assert!(REQUIRED_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.modify"));
        assert!(REQUIRED_SCOPES.contains(&"https://www.googleapis.com/auth/gmail.labels"));
    }
}
