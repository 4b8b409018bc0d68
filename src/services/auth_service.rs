use async_trait::async_trait;

use crate::error::AppError;

/// Bearer credential for the listing capability. Never inspected, only passed
/// through; `Debug` keeps it out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self, AppError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(AppError::Auth("access token is empty".to_string()));
        }
        Ok(Self(token))
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn request_access_token(&self, interactive: bool) -> Result<Credential, AppError>;
}

#[async_trait]
pub trait FolderPicker: Send + Sync {
    async fn select_folder(&self) -> Result<String, AppError>;
}

/// Hands out a token obtained out of band (environment or command line).
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn request_access_token(&self, interactive: bool) -> Result<Credential, AppError> {
        let Some(token) = self.token.as_deref() else {
            tracing::debug!(interactive, "no access token configured");
            return Err(AppError::Auth(
                "no access token; set DRIVE_ACCESS_TOKEN or pass --token".to_string(),
            ));
        };
        Credential::new(token)
    }
}

/// Picker for a folder chosen up front, given as an id or a Drive folder URL.
#[derive(Debug, Clone)]
pub struct FixedFolderPicker {
    folder_id: String,
}

impl FixedFolderPicker {
    pub fn new(folder: &str) -> Result<Self, AppError> {
        let folder_id = parse_folder_id(folder)
            .ok_or_else(|| AppError::General(format!("not a folder id or URL: {folder:?}")))?;
        Ok(Self { folder_id })
    }
}

#[async_trait]
impl FolderPicker for FixedFolderPicker {
    async fn select_folder(&self) -> Result<String, AppError> {
        Ok(self.folder_id.clone())
    }
}

/// Accepts a bare id or a `https://drive.google.com/drive/folders/<id>` URL.
pub fn parse_folder_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let candidate = match trimmed.split_once("/folders/") {
        Some((_, rest)) => rest
            .split(['?', '/', '#'])
            .next()
            .unwrap_or_default(),
        None => trimmed,
    };

    let valid = !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| candidate.to_string())
}
