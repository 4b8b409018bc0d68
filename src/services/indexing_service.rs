use tracing::Instrument;

use crate::error::AppError;
use crate::models::progress::IndexingProgress;
use crate::services::registry_service::Registry;
use crate::services::traversal_service::{self, ListChildren, TraversalOptions, TraversalSummary};

/// One indexing run: walks `root_folder_id` and upserts every media file into
/// `registry`. Progress starts fresh at `Loading` and always ends in
/// `Completed` or `Error`, reported through `on_progress`.
pub async fn run_indexing<L, P>(
    registry: &Registry,
    lister: &L,
    root_folder_id: &str,
    options: &TraversalOptions,
    mut on_progress: P,
) -> Result<TraversalSummary, AppError>
where
    L: ListChildren + ?Sized,
    P: FnMut(&IndexingProgress),
{
    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("indexing", %run_id, root = %root_folder_id);

    async move {
        let mut progress = IndexingProgress::idle();
        progress.begin_loading();
        on_progress(&progress);

        if let Err(e) = registry.ready().await {
            tracing::error!(error = %e, "registry not available, indexing aborted");
            progress.fail(&e.to_string());
            on_progress(&progress);
            return Err(e);
        }

        tracing::info!("indexing started");
        traversal_service::traverse(
            root_folder_id,
            lister,
            options,
            &mut progress,
            move |record| registry.upsert(record),
            on_progress,
        )
        .await
    }
    .instrument(span)
    .await
}
