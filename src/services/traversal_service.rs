use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;
use crate::models::listing::{ChildEntry, ListingPage};
use crate::models::media_file::{parse_size, MediaFileRecord, MediaKind};
use crate::models::progress::IndexingProgress;

pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Paginated "list direct, non-trashed children of a folder" capability.
#[async_trait]
pub trait ListChildren: Send + Sync {
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListingPage, AppError>;
}

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Deadline for each listing call. `None` waits indefinitely.
    pub page_timeout: Option<Duration>,
    /// Checked before every listing call.
    pub cancel_flag: Arc<AtomicBool>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            page_timeout: Some(DEFAULT_PAGE_TIMEOUT),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalSummary {
    pub files_found: u64,
    pub folders_processed: u64,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn media_record(
    entry: ChildEntry,
    parent_folder_id: &str,
    indexed_at: i64,
) -> Result<MediaFileRecord, AppError> {
    // Drive omits the size of some files; that is not an error.
    let size = match entry.size.as_deref() {
        Some(raw) => parse_size(raw).inspect_err(|e| {
            tracing::warn!(id = %entry.id, name = %entry.name, error = %e, "unreadable size");
        })?,
        None => 0,
    };

    Ok(MediaFileRecord {
        id: entry.id,
        name: entry.name,
        mime_type: entry.mime_type,
        size,
        md5_checksum: entry.md5_checksum,
        parent_folder_id: Some(parent_folder_id.to_string()),
        indexed_at,
    })
}

fn ensure_not_cancelled(options: &TraversalOptions) -> Result<(), AppError> {
    if options.cancel_flag.load(Ordering::Relaxed) {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

async fn fetch_page<L>(
    lister: &L,
    folder_id: &str,
    page_token: Option<&str>,
    page_timeout: Option<Duration>,
) -> Result<ListingPage, AppError>
where
    L: ListChildren + ?Sized,
{
    let call = lister.list_children(folder_id, page_token);
    match page_timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AppError::Timeout(limit))?,
        None => call.await,
    }
}

/// Breadth-first discovery of every media file below `root_folder_id`.
///
/// Each folder's pages are drained before the next queued folder is listed.
/// Folders are queued, `video/*`, `audio/*` and `image/*` entries go to
/// `on_media_found`, everything else is skipped. `progress` moves to
/// `Indexing` on entry and ends in `Completed` or `Error`; `on_progress` sees
/// every change. The first failure aborts the walk; files already handed to
/// `on_media_found` stay where they went.
pub async fn traverse<L, F, Fut, P>(
    root_folder_id: &str,
    lister: &L,
    options: &TraversalOptions,
    progress: &mut IndexingProgress,
    mut on_media_found: F,
    mut on_progress: P,
) -> Result<TraversalSummary, AppError>
where
    L: ListChildren + ?Sized,
    F: FnMut(MediaFileRecord) -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
    P: FnMut(&IndexingProgress),
{
    progress.begin_indexing();
    on_progress(progress);

    let result = walk(
        root_folder_id,
        lister,
        options,
        progress,
        &mut on_media_found,
        &mut on_progress,
    )
    .await;

    match &result {
        Ok(summary) => {
            tracing::info!(
                files = summary.files_found,
                folders = summary.folders_processed,
                "traversal completed"
            );
            progress.complete();
        }
        Err(e) => {
            tracing::warn!(error = %e, "traversal aborted");
            progress.fail(&e.to_string());
        }
    }
    on_progress(progress);

    result
}

async fn walk<L, F, Fut, P>(
    root_folder_id: &str,
    lister: &L,
    options: &TraversalOptions,
    progress: &mut IndexingProgress,
    on_media_found: &mut F,
    on_progress: &mut P,
) -> Result<TraversalSummary, AppError>
where
    L: ListChildren + ?Sized,
    F: FnMut(MediaFileRecord) -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
    P: FnMut(&IndexingProgress),
{
    let mut queue = VecDeque::from([root_folder_id.to_string()]);
    let mut visited: HashSet<String> = HashSet::new();
    let mut summary = TraversalSummary::default();
    let mut last_stamp = i64::MIN;

    while let Some(folder_id) = queue.pop_front() {
        if !visited.insert(folder_id.clone()) {
            tracing::debug!(folder_id = %folder_id, "folder already visited, skipping");
            continue;
        }
        summary.folders_processed += 1;
        progress.record_folder();

        let mut page_token: Option<String> = None;
        loop {
            ensure_not_cancelled(options)?;
            let page = fetch_page(
                lister,
                &folder_id,
                page_token.as_deref(),
                options.page_timeout,
            )
            .await?;
            // A stop can land while the page is in flight.
            ensure_not_cancelled(options)?;
            let next_token = page.continuation().map(str::to_string);

            for entry in page.entries {
                if entry.is_folder() {
                    queue.push_back(entry.id);
                    continue;
                }
                if MediaKind::from_mime_type(&entry.mime_type).is_none() {
                    continue;
                }

                last_stamp = last_stamp.max(now_millis());
                let record = media_record(entry, &folder_id, last_stamp)?;
                tracing::debug!(name = %record.name, mime_type = %record.mime_type, "file discovered");

                let name = record.name.clone();
                ensure_not_cancelled(options)?;
                on_media_found(record).await?;
                summary.files_found += 1;
                progress.record_file(&name);
                on_progress(progress);
            }

            match next_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        on_progress(progress);
    }

    ensure_not_cancelled(options)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::FOLDER_MIME_TYPE;
    use crate::models::progress::IndexingStatus;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn folder(id: &str) -> ChildEntry {
        ChildEntry {
            id: id.to_string(),
            name: format!("{id}-folder"),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
            md5_checksum: None,
        }
    }

    fn file(id: &str, mime_type: &str) -> ChildEntry {
        ChildEntry {
            id: id.to_string(),
            name: format!("{id}.bin"),
            mime_type: mime_type.to_string(),
            size: Some("10".to_string()),
            md5_checksum: Some(format!("md5-{id}")),
        }
    }

    /// In-memory folder tree keyed by (folder id, page token).
    #[derive(Default)]
    struct ScriptedDrive {
        pages: HashMap<(String, Option<String>), ListingPage>,
        failing: HashSet<String>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedDrive {
        fn folder(mut self, id: &str, entries: Vec<ChildEntry>) -> Self {
            self.pages.insert(
                (id.to_string(), None),
                ListingPage {
                    entries,
                    next_page_token: None,
                },
            );
            self
        }

        fn page(
            mut self,
            id: &str,
            token: Option<&str>,
            entries: Vec<ChildEntry>,
            next: Option<&str>,
        ) -> Self {
            self.pages.insert(
                (id.to_string(), token.map(str::to_string)),
                ListingPage {
                    entries,
                    next_page_token: next.map(str::to_string),
                },
            );
            self
        }

        fn failing_on(mut self, id: &str) -> Self {
            self.failing.insert(id.to_string());
            self
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }

        fn dequeued(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|(_, token)| token.is_none())
                .map(|(id, _)| id)
                .collect()
        }
    }

    #[async_trait]
    impl ListChildren for ScriptedDrive {
        async fn list_children(
            &self,
            folder_id: &str,
            page_token: Option<&str>,
        ) -> Result<ListingPage, AppError> {
            self.calls
                .lock()
                .unwrap()
                .push((folder_id.to_string(), page_token.map(str::to_string)));
            if self.failing.contains(folder_id) {
                return Err(AppError::Listing("rate limit exceeded".to_string()));
            }
            Ok(self
                .pages
                .get(&(folder_id.to_string(), page_token.map(str::to_string)))
                .cloned()
                .unwrap_or_default())
        }
    }

    struct StalledDrive;

    #[async_trait]
    impl ListChildren for StalledDrive {
        async fn list_children(
            &self,
            _folder_id: &str,
            _page_token: Option<&str>,
        ) -> Result<ListingPage, AppError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ListingPage::default())
        }
    }

    struct Run {
        result: Result<TraversalSummary, AppError>,
        found: Vec<MediaFileRecord>,
        updates: Vec<IndexingProgress>,
        progress: IndexingProgress,
    }

    async fn run<L: ListChildren>(lister: &L, options: &TraversalOptions) -> Run {
        let found = Mutex::new(Vec::new());
        let mut updates = Vec::new();
        let mut progress = IndexingProgress::idle();
        progress.begin_loading();

        let result = traverse(
            "root",
            lister,
            options,
            &mut progress,
            |record| {
                found.lock().unwrap().push(record);
                async { Ok::<(), AppError>(()) }
            },
            |p| updates.push(p.clone()),
        )
        .await;

        Run {
            result,
            found: found.into_inner().unwrap(),
            updates,
            progress,
        }
    }

    #[tokio::test]
    async fn emits_only_media_entries() {
        let drive = ScriptedDrive::default()
            .folder(
                "root",
                vec![
                    file("clip", "video/mp4"),
                    file("song", "audio/mpeg"),
                    file("photo", "image/heic"),
                    file("doc", "application/pdf"),
                    file("sheet", "application/vnd.google-apps.spreadsheet"),
                    file("notes", "text/plain"),
                    folder("sub"),
                ],
            )
            .folder("sub", vec![file("deep", "image/png")]);

        let run = run(&drive, &TraversalOptions::default()).await;
        let summary = run.result.unwrap();

        let mut ids: Vec<_> = run.found.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["clip", "deep", "photo", "song"]);
        assert_eq!(summary.files_found, 4);
        assert_eq!(summary.folders_processed, 2);
        assert_eq!(run.progress.files_processed, 4);
        assert_eq!(run.progress.folders_processed, 2);
        assert_eq!(run.progress.status, IndexingStatus::Completed);
        assert!(run.progress.current_file.is_none());
    }

    #[tokio::test]
    async fn records_carry_metadata_and_parent() {
        let mut song = file("song", "audio/flac");
        song.md5_checksum = None;
        let mut sizeless = file("sizeless", "image/png");
        sizeless.size = None;
        let drive = ScriptedDrive::default()
            .folder("root", vec![folder("album")])
            .folder("album", vec![song, sizeless]);

        let run = run(&drive, &TraversalOptions::default()).await;
        run.result.unwrap();

        let song = run.found.iter().find(|r| r.id == "song").unwrap();
        assert_eq!(song.parent_folder_id.as_deref(), Some("album"));
        assert_eq!(song.size, 10);
        assert_eq!(song.md5_checksum, None);
        assert!(song.indexed_at > 0);

        let sizeless = run.found.iter().find(|r| r.id == "sizeless").unwrap();
        assert_eq!(sizeless.size, 0);
    }

    #[tokio::test]
    async fn drains_all_pages_before_next_folder() {
        let drive = ScriptedDrive::default()
            .folder("root", vec![folder("A"), folder("B")])
            .page(
                "A",
                None,
                vec![
                    file("a1", "video/mp4"),
                    file("a2", "video/mp4"),
                    file("a3", "video/mp4"),
                ],
                Some("A-page-2"),
            )
            .page(
                "A",
                Some("A-page-2"),
                vec![file("a4", "audio/ogg"), file("a5", "image/gif")],
                None,
            )
            .folder("B", vec![file("b1", "video/webm")]);

        let run = run(&drive, &TraversalOptions::default()).await;
        run.result.unwrap();

        assert_eq!(
            drive.calls(),
            vec![
                ("root".to_string(), None),
                ("A".to_string(), None),
                ("A".to_string(), Some("A-page-2".to_string())),
                ("B".to_string(), None),
            ]
        );
        let ids: Vec<_> = run.found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a3", "a4", "a5", "b1"]);
    }

    #[tokio::test]
    async fn dequeues_breadth_first() {
        let drive = ScriptedDrive::default()
            .folder("root", vec![folder("F1"), folder("F2")])
            .folder("F1", vec![folder("F3")])
            .folder("F2", vec![]);

        let run = run(&drive, &TraversalOptions::default()).await;
        let summary = run.result.unwrap();

        assert_eq!(drive.dequeued(), vec!["root", "F1", "F2", "F3"]);
        assert_eq!(summary.folders_processed, 4);
        assert_eq!(summary.files_found, 0);
    }

    #[tokio::test]
    async fn listing_failure_aborts_and_keeps_earlier_files() {
        let drive = ScriptedDrive::default()
            .folder("root", vec![file("first", "image/jpeg"), folder("broken"), folder("later")])
            .folder("later", vec![file("never", "image/jpeg")])
            .failing_on("broken");

        let run = run(&drive, &TraversalOptions::default()).await;

        assert!(matches!(run.result, Err(AppError::Listing(_))));
        assert_eq!(run.found.len(), 1);
        assert_eq!(run.found[0].id, "first");
        assert_eq!(drive.dequeued(), vec!["root", "broken"]);
        assert_eq!(run.progress.status, IndexingStatus::Error);
        assert!(run
            .progress
            .error
            .as_deref()
            .is_some_and(|m| m.contains("rate limit")));
        assert!(run.progress.current_file.is_none());
    }

    #[tokio::test]
    async fn revisited_folders_are_skipped() {
        let drive = ScriptedDrive::default()
            .folder("root", vec![folder("A"), folder("A")])
            .folder("A", vec![folder("root"), file("x", "video/mp4")]);

        let run = run(&drive, &TraversalOptions::default()).await;
        let summary = run.result.unwrap();

        assert_eq!(summary.folders_processed, 2);
        assert_eq!(summary.files_found, 1);
        assert_eq!(drive.dequeued(), vec!["root", "A"]);
    }

    #[tokio::test]
    async fn exact_size_past_2_pow_53() {
        let mut huge = file("huge", "video/x-matroska");
        huge.size = Some("9007199254740993".to_string());
        let drive = ScriptedDrive::default().folder("root", vec![huge]);

        let run = run(&drive, &TraversalOptions::default()).await;
        run.result.unwrap();
        assert_eq!(run.found[0].size, 9_007_199_254_740_993);
    }

    #[tokio::test]
    async fn malformed_size_fails_the_run() {
        let mut bad = file("bad", "video/mp4");
        bad.size = Some("1.5e3".to_string());
        let drive = ScriptedDrive::default().folder("root", vec![bad]);

        let run = run(&drive, &TraversalOptions::default()).await;
        assert!(matches!(run.result, Err(AppError::InvalidRecord(_))));
        assert_eq!(run.progress.status, IndexingStatus::Error);
    }

    #[tokio::test]
    async fn progress_is_live_and_monotonic() {
        let drive = ScriptedDrive::default()
            .folder("root", vec![file("one", "video/mp4"), folder("sub")])
            .folder("sub", vec![file("two", "audio/aac")]);

        let run = run(&drive, &TraversalOptions::default()).await;
        run.result.unwrap();

        assert_eq!(run.updates.first().unwrap().status, IndexingStatus::Indexing);
        assert_eq!(run.updates.last().unwrap().status, IndexingStatus::Completed);
        assert!(run
            .updates
            .iter()
            .any(|u| u.status == IndexingStatus::Indexing
                && u.current_file.as_deref() == Some("one.bin")));
        for pair in run.updates.windows(2) {
            assert!(pair[1].files_processed >= pair[0].files_processed);
            assert!(pair[1].folders_processed >= pair[0].folders_processed);
        }
    }

    #[tokio::test]
    async fn discovery_stamps_never_go_backwards() {
        let entries = (0..20).map(|i| file(&format!("f{i}"), "image/png")).collect();
        let drive = ScriptedDrive::default().folder("root", entries);

        let run = run(&drive, &TraversalOptions::default()).await;
        run.result.unwrap();
        for pair in run.found.windows(2) {
            assert!(pair[1].indexed_at >= pair[0].indexed_at);
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_lists_nothing() {
        let drive = ScriptedDrive::default().folder("root", vec![file("a", "video/mp4")]);
        let options = TraversalOptions::default();
        options.cancel_flag.store(true, Ordering::Relaxed);

        let run = run(&drive, &options).await;
        assert!(matches!(run.result, Err(AppError::Cancelled)));
        assert!(drive.calls().is_empty());
        assert_eq!(run.progress.error.as_deref(), Some("indexing cancelled"));
    }

    /// Raises the cancel flag while answering one particular listing call.
    struct StoppingDrive {
        inner: ScriptedDrive,
        stop_on: (String, Option<String>),
        cancel_flag: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ListChildren for StoppingDrive {
        async fn list_children(
            &self,
            folder_id: &str,
            page_token: Option<&str>,
        ) -> Result<ListingPage, AppError> {
            if (folder_id, page_token) == (self.stop_on.0.as_str(), self.stop_on.1.as_deref()) {
                self.cancel_flag.store(true, Ordering::Relaxed);
            }
            self.inner.list_children(folder_id, page_token).await
        }
    }

    #[tokio::test]
    async fn stop_between_folders_keeps_earlier_files() {
        let options = TraversalOptions::default();
        let drive = StoppingDrive {
            inner: ScriptedDrive::default()
                .folder("root", vec![file("a", "image/png"), folder("sub")])
                .folder("sub", vec![file("b", "image/png")]),
            stop_on: ("sub".to_string(), None),
            cancel_flag: options.cancel_flag.clone(),
        };

        let run = run(&drive, &options).await;

        assert!(matches!(run.result, Err(AppError::Cancelled)));
        let ids: Vec<_> = run.found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(run.progress.status, IndexingStatus::Error);
        assert_eq!(run.progress.error.as_deref(), Some("indexing cancelled"));
        assert_eq!(run.progress.files_processed, 1);
    }

    #[tokio::test]
    async fn stop_during_last_page_is_not_completed() {
        let options = TraversalOptions::default();
        let drive = StoppingDrive {
            inner: ScriptedDrive::default()
                .page("root", None, vec![file("a", "video/mp4")], Some("p2"))
                .page("root", Some("p2"), vec![file("b", "video/mp4")], None),
            stop_on: ("root".to_string(), Some("p2".to_string())),
            cancel_flag: options.cancel_flag.clone(),
        };

        let run = run(&drive, &options).await;

        assert!(matches!(run.result, Err(AppError::Cancelled)));
        assert_eq!(run.found.len(), 1);
        assert_eq!(run.found[0].id, "a");
        assert_eq!(run.progress.status, IndexingStatus::Error);
        assert_eq!(run.updates.last().unwrap().status, IndexingStatus::Error);
    }

    #[tokio::test]
    async fn stalled_listing_times_out() {
        let options = TraversalOptions {
            page_timeout: Some(Duration::from_millis(20)),
            ..TraversalOptions::default()
        };

        let run = run(&StalledDrive, &options).await;
        assert!(matches!(run.result, Err(AppError::Timeout(_))));
        assert_eq!(run.progress.status, IndexingStatus::Error);
    }

    #[tokio::test]
    async fn sink_failure_aborts_traversal() {
        let drive = ScriptedDrive::default()
            .folder("root", vec![file("a", "video/mp4"), file("b", "video/mp4")]);
        let mut progress = IndexingProgress::idle();

        let result = traverse(
            "root",
            &drive,
            &TraversalOptions::default(),
            &mut progress,
            |_record| async {
                Err::<(), AppError>(AppError::PersistenceUnavailable("registry is closed".into()))
            },
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(AppError::PersistenceUnavailable(_))));
        assert_eq!(progress.files_processed, 0);
        assert_eq!(progress.status, IndexingStatus::Error);
    }
}
