//! `MediaFile`: a file on disk associated with a `MediaItem`.

use sqlx::FromRow;

/// A file on disk that satisfies a `MediaItem`, placed there by the importer.
///
/// `path` is unique across the catalog: two items can never claim the same
/// file, mirroring the natural-key uniqueness enforced on `media_items`.
#[derive(Debug, Clone, FromRow)]
pub struct MediaFile {
    /// Unique identifier.
    pub id: i64,
    /// Owning media item.
    pub media_item_id: i64,
    /// Absolute filesystem path.
    pub path: String,
    /// File size in bytes.
    pub size: i64,
    /// Content hash, when computed (not required for import).
    pub content_hash: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_file_fields_are_plain_data() {
        let file = MediaFile {
            id: 1,
            media_item_id: 2,
            path: "/movies/Arrival (2016)/Arrival.mkv".to_string(),
            size: 1024,
            content_hash: None,
            created_at: "now".to_string(),
            updated_at: "now".to_string(),
        };
        assert_eq!(file.media_item_id, 2);
        assert!(file.content_hash.is_none());
    }
}
