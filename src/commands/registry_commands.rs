use crate::error::AppError;
use crate::models::media_file::MediaFileRecord;
use crate::services::registry_service::RegistrySummary;
use crate::services::search_service::{abbreviate_checksum, filter_and_sort, format_size};
use crate::state::AppState;

const NAME_COLUMN_WIDTH: usize = 40;
const TYPE_COLUMN_WIDTH: usize = 24;
const KIND_COLUMN_WIDTH: usize = 5;

pub async fn list_media(state: &AppState) -> Result<Vec<MediaFileRecord>, AppError> {
    search_media(state, "").await
}

pub async fn search_media(state: &AppState, query: &str) -> Result<Vec<MediaFileRecord>, AppError> {
    let records = state.registry.get_all().await?;
    Ok(filter_and_sort(records, query))
}

pub async fn registry_stats(state: &AppState) -> Result<RegistrySummary, AppError> {
    state.registry.summary().await
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Plain-text table of name, kind, type, size and checksum.
pub fn render_table(records: &[MediaFileRecord]) -> String {
    let mut out = format!(
        "{:<name_w$}  {:<kind_w$}  {:<type_w$}  {:>10}  {}\n",
        "NAME",
        "KIND",
        "TYPE",
        "SIZE",
        "CHECKSUM",
        name_w = NAME_COLUMN_WIDTH,
        kind_w = KIND_COLUMN_WIDTH,
        type_w = TYPE_COLUMN_WIDTH,
    );

    if records.is_empty() {
        out.push_str("No files indexed yet.\n");
        return out;
    }

    for record in records {
        let kind = record
            .kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<name_w$}  {:<kind_w$}  {:<type_w$}  {:>10}  {}\n",
            truncate(&record.name, NAME_COLUMN_WIDTH),
            kind,
            truncate(&record.mime_type, TYPE_COLUMN_WIDTH),
            format_size(record.size),
            abbreviate_checksum(record.md5_checksum.as_deref()),
            name_w = NAME_COLUMN_WIDTH,
            kind_w = KIND_COLUMN_WIDTH,
            type_w = TYPE_COLUMN_WIDTH,
        ));
    }
    out
}
