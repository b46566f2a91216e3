//! Importer: turns a completed download's files into a placed, catalogued
//! media file, per the destination and naming policy in [`crate::config`].

mod error;
mod placement;
mod template;

pub use error::ImportError;
pub use placement::{ImportJournal, apply_permissions, ensure_dir, find_extras, place_file};
pub use template::{ColonReplacement, ImportContext, expand_template, sanitize_path_segment};

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::config::{DownloadsConfig, LibraryConfig};
use crate::db::Catalog;
use crate::model::{MediaItem, MediaKind};

/// What the importer produced, for the caller to log and persist onto the
/// originating `Download` row.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub final_path: PathBuf,
    pub media_item_id: i64,
    pub created_folders: Vec<PathBuf>,
    pub imported_extras: Vec<PathBuf>,
}

#[derive(Clone)]
pub struct Importer {
    catalog: Catalog,
    library: LibraryConfig,
    downloads: DownloadsConfig,
}

impl Importer {
    #[must_use]
    pub fn new(catalog: Catalog, library: LibraryConfig, downloads: DownloadsConfig) -> Self {
        Self { catalog, library, downloads }
    }

    /// Imports the file at `source_path` into the library as the given
    /// media item, as the final step of a grabbed download's lifecycle.
    ///
    /// The filesystem work happens first and is rolled back on any
    /// failure; the catalog is updated in a single call only after the
    /// file is durably in place, so a crash never leaves the catalog
    /// pointing at a file that was never written.
    #[instrument(skip(self, source_path), fields(%media_item_id))]
    pub async fn import(
        &self,
        source_path: &Path,
        media_item_id: i64,
        quality_label: Option<&str>,
    ) -> Result<ImportOutcome, ImportError> {
        if !source_path.exists() {
            return Err(ImportError::SourceMissing(source_path.to_path_buf()));
        }

        let chain = self.catalog.media_items().parent_chain(media_item_id).await?;
        let leaf = chain.first().ok_or_else(|| ImportError::SourceMissing(source_path.to_path_buf()))?;
        let mut context = build_context(&chain);
        context.quality = quality_label.map(str::to_string);

        if leaf.kind() == MediaKind::TvEpisode && (context.season.is_none() || context.episode.is_none()) {
            return Err(ImportError::MissingSeasonEpisode);
        }

        let destination_root = self.library.destination_root(leaf.kind());
        if !self.downloads.skip_free_space_check {
            check_free_space(destination_root, self.downloads.minimum_free_space_mb)?;
        }

        let extension = source_path.extension().and_then(|ext| ext.to_str()).unwrap_or("").to_string();
        let (destination_dir, file_stem) = self.render_destination(leaf.kind(), destination_root, &context);
        let destination = destination_dir.join(with_extension(&file_stem, &extension));

        let mut journal = ImportJournal::new();
        ensure_dir(&destination_dir, &mut journal)?;
        if self.downloads.set_permissions {
            if let Some(mode) = self.downloads.chmod_folder {
                if let Err(error) = apply_permissions(&destination_dir, mode) {
                    warn!(%error, path = %destination_dir.display(), "failed to apply configured folder permissions");
                }
            }
        }

        if let Err(error) = place_file(source_path, &destination, self.downloads.use_hardlinks, &mut journal) {
            journal.rollback();
            return Err(error);
        }
        self.apply_file_permissions(&destination);

        let mut imported_extras = Vec::new();
        if self.downloads.import_extra_files {
            for extra_source in find_extras(source_path, &self.downloads.extra_file_extensions) {
                let extra_extension = extra_source.extension().and_then(|ext| ext.to_str()).unwrap_or("");
                let extra_destination = destination_dir.join(with_extension(&file_stem, extra_extension));
                if let Err(error) = place_file(&extra_source, &extra_destination, self.downloads.use_hardlinks, &mut journal) {
                    warn!(%error, path = %extra_source.display(), "failed to import extra file, continuing without it");
                    continue;
                }
                self.apply_file_permissions(&extra_destination);
                imported_extras.push(extra_destination);
            }
        }

        let size = match std::fs::metadata(&destination) {
            Ok(metadata) => metadata.len() as i64,
            Err(error) => {
                journal.rollback();
                return Err(ImportError::Filesystem(error));
            }
        };

        let destination_str = destination.to_string_lossy().into_owned();
        if let Err(error) = self.catalog.media_items().add_file(media_item_id, &destination_str, size).await {
            journal.rollback();
            return Err(ImportError::RolledBack(Box::new(ImportError::Catalog(error))));
        }

        info!(path = %destination.display(), "imported media file");

        Ok(ImportOutcome {
            final_path: destination,
            media_item_id,
            created_folders: vec![destination_dir],
            imported_extras,
        })
    }

    fn apply_file_permissions(&self, path: &Path) {
        if !self.downloads.set_permissions {
            return;
        }
        if let Some(mode) = self.downloads.chmod_file {
            if let Err(error) = apply_permissions(path, mode) {
                warn!(%error, path = %path.display(), "failed to apply configured file permissions");
            }
        }
    }

    fn render_destination(
        &self,
        kind: MediaKind,
        destination_root: &Path,
        context: &ImportContext,
    ) -> (PathBuf, String) {
        let colon_mode = self.downloads.colon_replacement;

        if kind == MediaKind::TvEpisode {
            let series_folder = sanitize_segment(&expand_template("{Series Title}", context), colon_mode);
            let mut dir = destination_root.join(series_folder);
            if self.library.create_tv_season_folder {
                let season_folder =
                    sanitize_segment(&expand_template(&self.library.tv_season_folder_format, context), colon_mode);
                dir = dir.join(season_folder);
            }
            let file_stem = sanitize_segment(&expand_template(&self.library.tv_episode_file_format, context), colon_mode);
            (dir, file_stem)
        } else {
            let mut dir = destination_root.to_path_buf();
            if self.library.create_movie_folder {
                let movie_folder = sanitize_segment(&expand_template(&self.library.movie_folder_format, context), colon_mode);
                dir = dir.join(movie_folder);
            }
            let file_stem = sanitize_segment(&expand_template(&self.library.movie_file_format, context), colon_mode);
            (dir, file_stem)
        }
    }
}

fn sanitize_segment(rendered: &str, colon_mode: ColonReplacement) -> String {
    sanitize_path_segment(rendered, colon_mode)
}

fn with_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() { stem.to_string() } else { format!("{stem}.{extension}") }
}

/// Builds an [`ImportContext`] from a media item's parent chain, as
/// returned by [`crate::db::MediaItemsRepository::parent_chain`] (leaf
/// first, root last).
///
/// Season and episode numbers live in the episode item's metadata bag
/// rather than dedicated columns, consistent with every other per-kind
/// attribute on `MediaItem`.
fn build_context(chain: &[MediaItem]) -> ImportContext {
    let mut context = ImportContext::default();
    let Some(leaf) = chain.first() else {
        return context;
    };
    context.media_kind = Some(leaf.kind());

    match leaf.kind() {
        MediaKind::Movie => {
            context.movie_title = Some(leaf.title.clone());
            context.release_year = leaf.year;
            context.imdb_id = leaf.external_ids().get("imdb_id").and_then(|v| v.as_str()).map(str::to_string);
        }
        MediaKind::TvEpisode => {
            context.episode_title = Some(leaf.title.clone());
            let metadata = leaf.metadata();
            context.season = metadata.get("season_number").and_then(|v| v.as_i64());
            context.episode = metadata.get("episode_number").and_then(|v| v.as_i64());
            context.release_date = metadata.get("air_date").and_then(|v| v.as_str()).map(str::to_string);

            if let Some(series) = chain.iter().find(|item| item.kind() == MediaKind::TvSeries) {
                context.series_title = Some(series.title.clone());
                context.tvdb_id =
                    series.external_ids().get("tvdb_id").and_then(|v| v.as_i64()).map(|id| id.to_string());
            }
        }
        _ => {}
    }

    context
}

/// Returns an error if the destination's filesystem has less than
/// `minimum_free_space_mb` available.
fn check_free_space(destination_root: &Path, minimum_free_space_mb: u64) -> Result<(), ImportError> {
    // A destination directory that doesn't exist yet is created before any
    // file is placed, so there's nothing to measure free space against
    // until then; skip the check rather than fail a first-ever import.
    if !destination_root.exists() {
        return Ok(());
    }
    match available_space_mb(destination_root) {
        Some(available_mb) if available_mb < minimum_free_space_mb => {
            Err(ImportError::InsufficientFreeSpace { needed_mb: minimum_free_space_mb })
        }
        _ => Ok(()),
    }
}

fn available_space_mb(path: &Path) -> Option<u64> {
    fs2::available_space(path).ok().map(|bytes| bytes / (1024 * 1024))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaKind, NewMediaItem, ValueMap, Value};

    fn library_config(root: &Path) -> LibraryConfig {
        LibraryConfig { root_path: root.to_path_buf(), ..LibraryConfig::default() }
    }

    async fn seed_movie(catalog: &Catalog) -> i64 {
        let mut external_ids = ValueMap::new();
        external_ids.insert("imdb_id".to_string(), Value::from("tt2543164"));
        catalog
            .media_items()
            .insert(&NewMediaItem {
                kind: MediaKind::Movie,
                title: "Arrival".to_string(),
                sort_title: "Arrival".to_string(),
                year: Some(2016),
                parent_id: None,
                external_ids,
                metadata: ValueMap::new(),
            })
            .await
            .unwrap()
    }

    async fn seed_episode(catalog: &Catalog, series_title: &str) -> i64 {
        let series_id = catalog
            .media_items()
            .insert(&NewMediaItem {
                kind: MediaKind::TvSeries,
                title: series_title.to_string(),
                sort_title: series_title.to_string(),
                year: Some(2021),
                parent_id: None,
                external_ids: ValueMap::new(),
                metadata: ValueMap::new(),
            })
            .await
            .unwrap();
        let season_id = catalog
            .media_items()
            .insert(&NewMediaItem {
                kind: MediaKind::TvSeason,
                title: "Season 1".to_string(),
                sort_title: "Season 1".to_string(),
                year: None,
                parent_id: Some(series_id),
                external_ids: ValueMap::new(),
                metadata: ValueMap::new(),
            })
            .await
            .unwrap();

        let mut metadata = ValueMap::new();
        metadata.insert("season_number".to_string(), Value::from(1_i64));
        metadata.insert("episode_number".to_string(), Value::from(3_i64));
        catalog
            .media_items()
            .insert(&NewMediaItem {
                kind: MediaKind::TvEpisode,
                title: "Good News About Hell".to_string(),
                sort_title: "Good News About Hell".to_string(),
                year: None,
                parent_id: Some(season_id),
                external_ids: ValueMap::new(),
                metadata,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn imports_a_movie_file_into_a_titled_folder() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let media_item_id = seed_movie(&catalog).await;

        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("Arrival.2016.1080p.WEB-DL.mkv");
        std::fs::write(&source, b"movie bytes").unwrap();

        let library_root = temp.path().join("movies");
        let library = library_config(&library_root);
        let downloads = DownloadsConfig::default();
        let importer = Importer::new(catalog.clone(), library, downloads);

        let outcome = importer.import(&source, media_item_id, Some("1080p")).await.unwrap();

        assert!(outcome.final_path.starts_with(library_root.join("Arrival (2016)")));
        assert!(outcome.final_path.exists());
        assert_eq!(catalog.media_items().files(media_item_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn imports_a_tv_episode_with_colon_replaced_in_series_title() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let media_item_id = seed_episode(&catalog, "Doctor: Who").await;

        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("DoctorWho.S01E03.mkv");
        std::fs::write(&source, b"episode bytes").unwrap();

        let library_root = temp.path().join("tv");
        let library = library_config(&library_root);
        let downloads = DownloadsConfig { colon_replacement: ColonReplacement::Dash, ..DownloadsConfig::default() };
        let importer = Importer::new(catalog.clone(), library, downloads);

        let outcome = importer.import(&source, media_item_id, Some("1080p")).await.unwrap();

        assert!(outcome.final_path.starts_with(library_root.join("Doctor- Who")));
        assert!(outcome.final_path.to_string_lossy().contains("S01E03"));
    }

    #[tokio::test]
    async fn rejects_a_tv_import_missing_season_and_episode() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let series_id = catalog
            .media_items()
            .insert(&NewMediaItem {
                kind: MediaKind::TvSeries,
                title: "Severance".to_string(),
                sort_title: "Severance".to_string(),
                year: None,
                parent_id: None,
                external_ids: ValueMap::new(),
                metadata: ValueMap::new(),
            })
            .await
            .unwrap();
        let media_item_id = catalog
            .media_items()
            .insert(&NewMediaItem {
                kind: MediaKind::TvEpisode,
                title: "Untitled".to_string(),
                sort_title: "Untitled".to_string(),
                year: None,
                parent_id: Some(series_id),
                external_ids: ValueMap::new(),
                metadata: ValueMap::new(),
            })
            .await
            .unwrap();

        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("episode.mkv");
        std::fs::write(&source, b"x").unwrap();

        let library = library_config(temp.path());
        let downloads = DownloadsConfig::default();
        let importer = Importer::new(catalog.clone(), library, downloads);

        let error = importer.import(&source, media_item_id, None).await.unwrap_err();
        assert!(matches!(error, ImportError::MissingSeasonEpisode));
    }

    #[tokio::test]
    async fn skips_extras_when_import_extra_files_is_disabled() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let media_item_id = seed_movie(&catalog).await;

        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("Arrival.2016.1080p.WEB-DL.mkv");
        std::fs::write(&source, b"movie bytes").unwrap();
        std::fs::write(temp.path().join("Arrival.2016.1080p.WEB-DL.srt"), b"subs").unwrap();

        let library = library_config(&temp.path().join("movies"));
        let downloads = DownloadsConfig { import_extra_files: false, ..DownloadsConfig::default() };
        let importer = Importer::new(catalog.clone(), library, downloads);

        let outcome = importer.import(&source, media_item_id, Some("1080p")).await.unwrap();
        assert!(outcome.imported_extras.is_empty());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn applies_configured_permissions_to_the_imported_file() {
        use std::os::unix::fs::PermissionsExt;

        let catalog = Catalog::new_in_memory().await.unwrap();
        let media_item_id = seed_movie(&catalog).await;

        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("Arrival.2016.1080p.WEB-DL.mkv");
        std::fs::write(&source, b"movie bytes").unwrap();

        let library = library_config(&temp.path().join("movies"));
        let downloads =
            DownloadsConfig { set_permissions: true, chmod_file: Some(0o640), ..DownloadsConfig::default() };
        let importer = Importer::new(catalog.clone(), library, downloads);

        let outcome = importer.import(&source, media_item_id, Some("1080p")).await.unwrap();

        let mode = std::fs::metadata(&outcome.final_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[tokio::test]
    async fn rejects_an_import_whose_source_is_missing() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let media_item_id = seed_movie(&catalog).await;

        let temp = tempfile::tempdir().unwrap();
        let library = library_config(temp.path());
        let downloads = DownloadsConfig::default();
        let importer = Importer::new(catalog.clone(), library, downloads);

        let error = importer.import(&temp.path().join("missing.mkv"), media_item_id, None).await.unwrap_err();
        assert!(matches!(error, ImportError::SourceMissing(_)));
    }
}
