use crate::models::media_file::MediaFileRecord;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const CHECKSUM_PREFIX_CHARS: usize = 12;

fn matches(record: &MediaFileRecord, needle: &str) -> bool {
    record.name.to_lowercase().contains(needle) || record.mime_type.to_lowercase().contains(needle)
}

/// Records whose name or content type contains `query` (case-insensitive),
/// most recently discovered first. An empty query keeps everything.
pub fn filter_and_sort(records: Vec<MediaFileRecord>, query: &str) -> Vec<MediaFileRecord> {
    let needle = query.to_lowercase();
    let mut matched: Vec<MediaFileRecord> = records
        .into_iter()
        .filter(|record| matches(record, &needle))
        .collect();
    matched.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
    matched
}

/// Human-readable byte count in 1024 steps, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", SIZE_UNITS[unit])
}

pub fn abbreviate_checksum(checksum: Option<&str>) -> String {
    match checksum {
        Some(sum) if !sum.is_empty() => {
            let prefix: String = sum.chars().take(CHECKSUM_PREFIX_CHARS).collect();
            format!("{}...", prefix.to_uppercase())
        }
        _ => "N/A".to_string(),
    }
}
