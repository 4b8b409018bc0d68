use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::DriveConfig;
use crate::error::AppError;
use crate::models::listing::ListingPage;
use crate::services::auth_service::Credential;
use crate::services::traversal_service::ListChildren;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, md5Checksum)";

/// Google Drive v3 `files.list` client.
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    credential: Credential,
    api_base: String,
    page_size: u32,
}

impl DriveClient {
    pub fn new(credential: Credential, config: &DriveConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("drive-registry/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            credential,
            api_base: config.api_base.clone(),
            page_size: config.page_size,
        })
    }
}

/// Query selecting direct, non-trashed children of `folder_id`.
pub fn children_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}

/// Pulls `error.message` out of a Drive error body, falling back to the raw body.
fn drive_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ListChildren for DriveClient {
    #[tracing::instrument(skip(self))]
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListingPage, AppError> {
        let url = format!("{}/files", self.api_base);
        let mut query = vec![
            ("q", children_query(folder_id)),
            ("fields", LIST_FIELDS.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.credential.secret())
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Listing(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = drive_error_message(&body);
            tracing::warn!(%status, %message, "Drive listing failed");
            return Err(if status == StatusCode::UNAUTHORIZED {
                AppError::Auth(format!("Drive rejected the access token: {message}"))
            } else {
                AppError::Listing(format!("Drive returned {status}: {message}"))
            });
        }

        let page: ListingPage = response
            .json()
            .await
            .map_err(|e| AppError::Listing(format!("malformed listing response: {e}")))?;
        tracing::debug!(
            entries = page.entries.len(),
            more = page.continuation().is_some(),
            "listed folder page"
        );
        Ok(page)
    }
}
