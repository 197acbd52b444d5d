//! Conversion between the ordered field layout and [`InfoRecord`].
//!
//! Field order is fixed: catalog id, episode name, title, season, episode, year.
//! Lookup results carry the fields from index 0; persisted rows carry the path
//! first, so their fields start at index 1.

use crate::protocol::InfoRecord;

/// Number of logical fields in one record.
pub const RECORD_FIELD_COUNT: usize = 6;
/// Offset of the first record field in a raw lookup result.
pub const LOOKUP_RECORD_OFFSET: usize = 0;
/// Offset of the first record field in a persisted row (`[path, fields..]`).
pub const STORE_RECORD_OFFSET: usize = 1;

/// Returns the field at `index`, or an empty string when the input is too short.
pub fn safe_field<S: AsRef<str>>(fields: &[S], index: usize) -> String {
    fields
        .get(index)
        .map(|value| value.as_ref().to_string())
        .unwrap_or_default()
}

/// Reads six fields starting at `offset`. Short input never fails.
pub fn decode<S: AsRef<str>>(fields: &[S], offset: usize) -> InfoRecord {
    InfoRecord {
        catalog_id: safe_field(fields, offset),
        episode_name: safe_field(fields, offset + 1),
        title: safe_field(fields, offset + 2),
        season: safe_field(fields, offset + 3),
        episode: safe_field(fields, offset + 4),
        year: safe_field(fields, offset + 5),
    }
}

pub fn encode(record: &InfoRecord) -> [String; RECORD_FIELD_COUNT] {
    [
        record.catalog_id.clone(),
        record.episode_name.clone(),
        record.title.clone(),
        record.season.clone(),
        record.episode.clone(),
        record.year.clone(),
    ]
}
