use serde::{Deserialize, Serialize};

/// Type marker Drive reports for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// One direct child of a folder, as returned by the listing capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Decimal byte count; Drive omits it for some file kinds.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub md5_checksum: Option<String>,
}

impl ChildEntry {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// A page of children plus the cursor for the next page, shaped like a Drive
/// `files.list` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    #[serde(rename = "files", default)]
    pub entries: Vec<ChildEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl ListingPage {
    /// The continuation token, treating an empty string as absent.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}
