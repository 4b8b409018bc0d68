use serde::{Deserialize, Serialize};

const UNKNOWN_INDEXING_ERROR: &str = "Unknown error during indexing";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexingStatus {
    #[default]
    Idle,
    Loading,
    Indexing,
    Completed,
    Error,
}

impl std::fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Indexing => write!(f, "indexing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Live view of one indexing run. A fresh value is created per run; counters
/// only move forward until the run reaches `Completed` or `Error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingProgress {
    pub status: IndexingStatus,
    pub files_processed: u64,
    pub folders_processed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexingProgress {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Restarts the machine for a new run.
    pub fn begin_loading(&mut self) {
        *self = Self {
            status: IndexingStatus::Loading,
            ..Self::default()
        };
    }

    pub fn begin_indexing(&mut self) {
        self.status = IndexingStatus::Indexing;
    }

    pub fn record_file(&mut self, name: &str) {
        self.files_processed += 1;
        self.current_file = Some(name.to_string());
    }

    pub fn record_folder(&mut self) {
        self.folders_processed += 1;
    }

    pub fn complete(&mut self) {
        self.status = IndexingStatus::Completed;
        self.current_file = None;
    }

    pub fn fail(&mut self, message: &str) {
        let message = message.trim();
        self.status = IndexingStatus::Error;
        self.current_file = None;
        self.error = Some(if message.is_empty() {
            UNKNOWN_INDEXING_ERROR.to_string()
        } else {
            message.to_string()
        });
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.status,
            IndexingStatus::Loading | IndexingStatus::Indexing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            IndexingStatus::Completed | IndexingStatus::Error
        )
    }
}
