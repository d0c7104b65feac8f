use preview_proto::protocol::{DetailsRow, TrackRecord};
use thiserror::Error;

/// A record lacked a field the details table needs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("track {title:?} is missing {field}")]
pub struct PartialTrackRecord {
    pub title: Option<String>,
    pub field: &'static str,
}

/// Format whole seconds as `MM:SS`.  Minutes are not capped at 59.
pub fn format_duration(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Flatten a record into the five details columns.
pub fn project(record: &TrackRecord) -> Result<DetailsRow, PartialTrackRecord> {
    let missing = |field| PartialTrackRecord {
        title: record.title.clone(),
        field,
    };

    Ok(DetailsRow {
        title: record.title.clone().ok_or_else(|| missing("title"))?,
        artist_name: record
            .artist_name
            .clone()
            .ok_or_else(|| missing("artist name"))?,
        album_title: record
            .album_title
            .clone()
            .ok_or_else(|| missing("album title"))?,
        formatted_duration: record
            .duration_seconds
            .map(format_duration)
            .ok_or_else(|| missing("duration"))?,
        release_date: record
            .release_date
            .clone()
            .ok_or_else(|| missing("release date"))?,
    })
}
