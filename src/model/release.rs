//! `Release`: a transient search result surfaced by an indexer plugin.

use super::value::ValueMap;

/// A single candidate release returned by an indexer, before any grab
/// decision has been made.
///
/// Unlike the other model types, a `Release` is never persisted on its own;
/// it lives only as long as a search and is consumed by the quality engine.
/// `attributes` carries indexer-specific facets (seeders, freeleech, group)
/// that the core never interprets directly.
#[derive(Debug, Clone)]
pub struct Release {
    /// Globally-unique identifier for this release, as assigned by its indexer.
    pub guid: String,
    /// Id of the indexer plugin that returned this release.
    pub plugin_id: String,
    /// Raw release title, as published by the indexer.
    pub title: String,
    /// Download URI or magnet link.
    pub download_uri: String,
    /// Size in bytes, when reported.
    pub size_bytes: Option<i64>,
    /// Publish timestamp, when reported.
    pub published_at: Option<String>,
    /// Number of seeders, when this is a torrent-style release.
    pub seeders: Option<i64>,
    /// Indexer-reported category (e.g. `movies`, `tv`, `tv-hd`), used to
    /// select a downloader advertising the matching category.
    pub category: Option<String>,
    /// Opaque indexer-specific facets.
    pub attributes: ValueMap,
}

impl Release {
    /// Returns a normalized form of the title used for dedupe comparisons:
    /// lowercased, with runs of non-alphanumeric characters collapsed to a
    /// single space.
    #[must_use]
    pub fn normalized_title(&self) -> String {
        let mut normalized = String::with_capacity(self.title.len());
        let mut last_was_space = false;
        for ch in self.title.chars() {
            if ch.is_alphanumeric() {
                normalized.push(ch.to_ascii_lowercase());
                last_was_space = false;
            } else if !last_was_space {
                normalized.push(' ');
                last_was_space = true;
            }
        }
        normalized.trim().to_string()
    }

    /// Returns a dedupe key combining the normalized title and size, since
    /// indexers frequently republish the same release under cosmetically
    /// different titles.
    #[must_use]
    pub fn dedupe_key(&self) -> (String, Option<i64>) {
        (self.normalized_title(), self.size_bytes)
    }

    /// Returns `true` if `self` and `other` are the same underlying
    /// release: either they carry an identical GUID, or they collide on the
    /// normalized-title+size dedupe key.
    #[must_use]
    pub fn is_duplicate_of(&self, other: &Release) -> bool {
        self.guid == other.guid || self.dedupe_key() == other.dedupe_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str) -> Release {
        Release {
            guid: "guid-1".to_string(),
            plugin_id: "indexer-a".to_string(),
            title: title.to_string(),
            download_uri: "magnet:?xt=urn:btih:abc".to_string(),
            size_bytes: Some(1_000_000),
            published_at: None,
            seeders: Some(10),
            category: None,
            attributes: ValueMap::new(),
        }
    }

    #[test]
    fn normalized_title_collapses_punctuation_and_case() {
        let release = sample("Arrival.2016.1080p.WEB-DL");
        assert_eq!(release.normalized_title(), "arrival 2016 1080p web dl");
    }

    #[test]
    fn cosmetically_different_titles_with_same_size_share_a_dedupe_key() {
        let a = sample("Arrival 2016 1080p WEB-DL");
        let b = sample("Arrival.2016.1080p.WEB.DL");
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn same_guid_is_a_duplicate_even_with_a_different_title() {
        let mut a = sample("Arrival 2016 1080p WEB-DL");
        let mut b = sample("Arrival.2016.1080p.WEBRip-OtherGroup");
        a.guid = "shared-guid".to_string();
        b.guid = "shared-guid".to_string();
        assert!(a.is_duplicate_of(&b));
    }

    #[test]
    fn different_guid_and_dedupe_key_is_not_a_duplicate() {
        let mut a = sample("Arrival 2016 1080p WEB-DL");
        a.guid = "guid-a".to_string();
        let mut b = sample("Severance 2022 1080p WEB-DL");
        b.guid = "guid-b".to_string();
        b.size_bytes = Some(2_000_000);
        assert!(!a.is_duplicate_of(&b));
    }
}
