use crate::error::AppError;
use crate::models::progress::IndexingProgress;
use crate::services::auth_service::{FolderPicker, TokenProvider};
use crate::services::drive_service::DriveClient;
use crate::services::indexing_service;
use crate::services::traversal_service::{ListChildren, TraversalOptions, TraversalSummary};
use crate::state::AppState;

/// Authenticates, asks the picker for a root folder and indexes it through
/// Drive. Without a credential nothing is listed or written.
pub async fn start_indexing<T, F, P>(
    state: &AppState,
    tokens: &T,
    picker: &F,
    on_progress: P,
) -> Result<TraversalSummary, AppError>
where
    T: TokenProvider + ?Sized,
    F: FolderPicker + ?Sized,
    P: FnMut(&IndexingProgress),
{
    let credential = tokens.request_access_token(false).await?;
    let root_folder_id = picker.select_folder().await?;
    let client = DriveClient::new(credential, &state.config.drive)?;
    index_folder(state, &client, &root_folder_id, on_progress).await
}

/// Indexes `root_folder_id` with any listing capability, mirroring progress
/// into `state.indexing_status`.
pub async fn index_folder<L, P>(
    state: &AppState,
    lister: &L,
    root_folder_id: &str,
    mut on_progress: P,
) -> Result<TraversalSummary, AppError>
where
    L: ListChildren + ?Sized,
    P: FnMut(&IndexingProgress),
{
    let cancel_flag = state.begin_indexing()?;
    let options = TraversalOptions {
        page_timeout: state.config.drive.page_timeout,
        cancel_flag,
    };

    indexing_service::run_indexing(&state.registry, lister, root_folder_id, &options, |p| {
        state.publish_progress(p);
        on_progress(p);
    })
    .await
}

pub fn get_indexing_status(state: &AppState) -> IndexingProgress {
    state.current_progress()
}

pub fn stop_indexing(state: &AppState) {
    state.mark_cancelled();
}

/// Stops any run in flight and empties the registry. A run that is mid-page
/// when this lands writes nothing further once its listing returns.
pub async fn clear_registry(state: &AppState) -> Result<usize, AppError> {
    stop_indexing(state);
    state.registry.clear().await
}
