use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::data::{self, repository};
use crate::error::AppError;
use crate::models::media_file::MediaFileRecord;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Change notification published after each successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Upserted(MediaFileRecord),
    Cleared,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    pub file_count: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Failed(String),
    Closed,
}

/// Local keyed store of discovered media files.
///
/// Every operation waits for the underlying database to be open. A registry
/// whose open failed, or that has been closed, rejects operations with
/// [`AppError::PersistenceUnavailable`] instead of dropping them.
#[derive(Clone)]
pub struct Registry {
    db: Arc<Mutex<Option<Connection>>>,
    readiness: Arc<watch::Sender<Readiness>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    fn with_state(conn: Option<Connection>, readiness: Readiness) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (readiness, _) = watch::channel(readiness);
        Self {
            db: Arc::new(Mutex::new(conn)),
            readiness: Arc::new(readiness),
            events,
        }
    }

    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = data::open_connection(path)?;
        tracing::info!(path = %path.display(), "opened media registry");
        Ok(Self::with_state(Some(conn), Readiness::Ready))
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = data::open_in_memory()?;
        Ok(Self::with_state(Some(conn), Readiness::Ready))
    }

    /// Returns at once and opens the database on a blocking task. Must be
    /// called from within a tokio runtime.
    pub fn open_deferred(path: PathBuf) -> Self {
        let registry = Self::with_state(None, Readiness::Pending);
        let db = registry.db.clone();
        let readiness = registry.readiness.clone();

        tokio::task::spawn_blocking(move || {
            let outcome = match data::open_connection(&path) {
                Ok(conn) => match db.lock() {
                    Ok(mut guard) => {
                        *guard = Some(conn);
                        tracing::info!(path = %path.display(), "opened media registry");
                        Readiness::Ready
                    }
                    Err(e) => Readiness::Failed(e.to_string()),
                },
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to open media registry");
                    Readiness::Failed(e.to_string())
                }
            };
            readiness.send_replace(outcome);
        });

        registry
    }

    /// Waits until the database is open.
    pub async fn ready(&self) -> Result<(), AppError> {
        let mut rx = self.readiness.subscribe();
        let state = rx
            .wait_for(|state| *state != Readiness::Pending)
            .await
            .map_err(|_| {
                AppError::PersistenceUnavailable("registry initialization was abandoned".into())
            })?;

        match &*state {
            Readiness::Failed(message) => Err(AppError::PersistenceUnavailable(message.clone())),
            Readiness::Closed => Err(AppError::PersistenceUnavailable(
                "registry is closed".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.readiness.borrow() == Readiness::Ready
    }

    fn with_conn<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let guard = self
            .db
            .lock()
            .map_err(|e| AppError::General(e.to_string()))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| AppError::PersistenceUnavailable("registry is closed".into()))?;
        op(conn)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RegistryEvent) {
        // No receivers is fine; listings can always be re-read.
        let _ = self.events.send(event);
    }

    /// Writes `record`, replacing any record with the same id.
    pub async fn upsert(&self, record: MediaFileRecord) -> Result<(), AppError> {
        self.ready().await?;
        self.with_conn(|conn| repository::upsert_media_file(conn, &record))?;
        self.publish(RegistryEvent::Upserted(record));
        Ok(())
    }

    /// Every stored record, in no particular order.
    pub async fn get_all(&self) -> Result<Vec<MediaFileRecord>, AppError> {
        self.ready().await?;
        self.with_conn(repository::get_all_media_files)
    }

    pub async fn get(&self, id: &str) -> Result<Option<MediaFileRecord>, AppError> {
        self.ready().await?;
        self.with_conn(|conn| repository::get_media_file(conn, id))
    }

    pub async fn clear(&self) -> Result<usize, AppError> {
        self.ready().await?;
        let removed = self.with_conn(repository::clear_media_files)?;
        tracing::info!(removed, "cleared media registry");
        self.publish(RegistryEvent::Cleared);
        Ok(removed)
    }

    pub async fn summary(&self) -> Result<RegistrySummary, AppError> {
        let records = self.get_all().await?;
        Ok(RegistrySummary {
            file_count: records.len(),
            total_bytes: records
                .iter()
                .fold(0u64, |acc, record| acc.saturating_add(record.size)),
        })
    }

    /// Closes the database. Later operations fail with `PersistenceUnavailable`.
    pub fn close(&self) -> Result<(), AppError> {
        let mut guard = self
            .db
            .lock()
            .map_err(|e| AppError::General(e.to_string()))?;
        guard.take();
        self.readiness.send_replace(Readiness::Closed);
        Ok(())
    }
}
