//! Job scheduler: ticks registered jobs on their own interval, using the
//! catalog's `scheduler_jobs` table as the run-guard so only one process
//! (and only one tick) ever runs a given job at a time.

mod backoff;
mod error;

pub use error::SchedulerError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::aggregator::AggregateSearch;
use crate::db::Catalog;
use crate::dispatcher::{media_item_tag, Dispatcher};
use crate::model::{MediaItem, MonitorMode, MonitoringRule, QualityProfile, QualityProfileItem, Release};
use crate::plugin::PluginRegistry;
use crate::quality::{self, Decision};

/// Name the monitored-search job is registered under in `scheduler_jobs`.
const MONITORED_SEARCH_JOB: &str = "monitored_search";

/// Cap passed to `release_failure` for the monitored-search job's own backoff.
const MAX_JOB_BACKOFF_SECS: i64 = backoff::MAX_DELAY_SECS as i64;

/// Drives scheduled jobs against the catalog, the plugin registry, and the
/// dispatcher.
///
/// Mirrors the upstream's tick-and-claim loop, but cancellation is a
/// `tokio::sync::watch<bool>` rather than a cooperative `select!` over a
/// single in-process future, since a scheduler tick here fans out across
/// several catalog calls rather than one transfer task.
pub struct Scheduler {
    catalog: Catalog,
    plugins: Arc<PluginRegistry>,
    dispatcher: Arc<Dispatcher>,
    tick_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    /// Creates a scheduler and its shutdown handle. Dropping or sending
    /// `true` on the returned sender stops the next [`Self::run`] iteration.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        plugins: Arc<PluginRegistry>,
        dispatcher: Arc<Dispatcher>,
        tick_interval: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self { catalog, plugins, dispatcher, tick_interval, shutdown: rx },
            tx,
        )
    }

    /// Runs the tick loop until shutdown is signalled.
    ///
    /// Registers the monitored-search job on first run. A catalog error
    /// while ticking backs off the next attempt using the same
    /// exponential-with-jitter schedule as a failed job, rather than
    /// retrying on the fixed `tick_interval`, since a failing catalog
    /// connection is unlikely to recover within one interval.
    #[instrument(skip(self))]
    pub async fn run(&mut self) {
        if let Err(error) = self.catalog.scheduler().ensure_registered(MONITORED_SEARCH_JOB, self.tick_interval.as_secs() as i64).await {
            warn!(%error, "failed to register monitored_search job, scheduler will retry ticks anyway");
        }

        let mut consecutive_tick_failures: u32 = 0;
        loop {
            let sleep_for = if consecutive_tick_failures == 0 {
                self.tick_interval
            } else {
                backoff::delay_for(consecutive_tick_failures)
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("scheduler received shutdown signal");
                        return;
                    }
                }
            }

            match self.tick().await {
                Ok(()) => consecutive_tick_failures = 0,
                Err(error) => {
                    consecutive_tick_failures = consecutive_tick_failures.saturating_add(1);
                    warn!(%error, consecutive_tick_failures, "scheduler tick failed");
                }
            }
        }
    }

    /// Runs a media item's monitoring rule immediately, bypassing
    /// `next_search_at`, if the rule has `search_on_add` enabled.
    ///
    /// Meant to be called right after a monitoring rule is created, so a
    /// newly monitored item doesn't sit idle until the next scheduled tick.
    /// A no-op if the item has no rule yet.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if running the rule fails.
    pub async fn search_on_add(&self, media_item_id: i64) -> Result<(), SchedulerError> {
        let Some(rule) = self.catalog.monitoring().for_media_item(media_item_id).await? else {
            return Ok(());
        };
        if rule.search_on_add() {
            self.run_rule(&rule).await?;
        }
        Ok(())
    }

    /// Runs a single tick immediately, outside the [`Self::run`] loop.
    ///
    /// Useful for a one-shot invocation (e.g. a CLI command) or a test that
    /// wants to drive exactly one monitored-search pass without waiting on
    /// `tick_interval`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if claiming or running the job fails.
    pub async fn tick_once(&self) -> Result<(), SchedulerError> {
        self.tick().await
    }

    async fn tick(&self) -> Result<(), SchedulerError> {
        if self.catalog.scheduler().try_claim(MONITORED_SEARCH_JOB).await? {
            let started = Instant::now();
            let result = self.run_monitored_search_job().await;
            let duration_ms = started.elapsed().as_millis() as i64;

            match result {
                Ok(()) => self.catalog.scheduler().release_success(MONITORED_SEARCH_JOB, duration_ms).await?,
                Err(error) => {
                    warn!(%error, "monitored_search job failed");
                    self.catalog
                        .scheduler()
                        .release_failure(MONITORED_SEARCH_JOB, &error.to_string(), MAX_JOB_BACKOFF_SECS)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Claims every monitoring rule due for an automatic search this tick and
    /// runs each one to completion, grabbing any release the quality engine
    /// accepts or upgrades to.
    #[instrument(skip(self))]
    async fn run_monitored_search_job(&self) -> Result<(), SchedulerError> {
        loop {
            let Some(rule) = self.catalog.monitoring().claim_due_rule().await? else {
                return Ok(());
            };
            if let Err(error) = self.run_rule(&rule).await {
                warn!(rule_id = rule.id, %error, "monitored search failed for rule");
            }
        }
    }

    /// Runs one monitoring rule to completion: resolves its search targets
    /// per `monitor_mode`, searches and evaluates each, and grabs the
    /// best-ranked accepted release per target.
    async fn run_rule(&self, rule: &MonitoringRule) -> Result<(), SchedulerError> {
        let targets = self.resolve_targets(rule).await?;

        let profile = self
            .catalog
            .quality()
            .profile(rule.profile_id)
            .await?
            .ok_or(SchedulerError::MissingQualityProfile(rule.profile_id))?;
        let profile_items = self.catalog.quality().profile_items(rule.profile_id).await?;
        let definitions = self.catalog.quality().all_definitions().await?;

        let mut items_found = 0;
        let mut items_grabbed = 0;

        for target in &targets {
            let aggregator = AggregateSearch::new(&self.catalog, &self.plugins);
            let mut releases = match aggregator.search(target.id, rule.minimum_seeders).await {
                Ok(result) => result.releases,
                Err(error) => {
                    warn!(media_item_id = target.id, %error, "search failed for monitoring target");
                    continue;
                }
            };
            items_found += releases.len() as i64;

            if rule.prefer_season_packs() {
                releases.sort_by_key(|release| !quality::parse_facets(&release.title).is_season_pack);
            }

            let current_state = self.catalog.quality().state(target.id).await?;

            let mut candidates: Vec<(Decision, &Release)> = Vec::new();
            for release in &releases {
                let decision = quality::evaluate(release, &profile, &profile_items, &definitions, current_state.as_ref())?;
                match decision {
                    Decision::Accept { .. } | Decision::Upgrade { .. } => candidates.push((decision, release)),
                    Decision::Reject { reason } => {
                        info!(release = %release.title, reason, "release rejected by quality engine");
                    }
                }
            }

            let Some((decision, winner)) = select_winner(candidates, &profile_items, &profile) else {
                continue;
            };
            let quality_id = match decision {
                Decision::Accept { quality_id } | Decision::Upgrade { quality_id, .. } => quality_id,
                Decision::Reject { .. } => unreachable!("reject decisions are filtered out before ranking"),
            };
            let quality_label = definitions
                .iter()
                .find(|definition| definition.id == quality_id)
                .map_or("unknown", |definition| definition.name.as_str());

            self.dispatcher
                .grab(
                    &winner.plugin_id,
                    &winner.title,
                    &winner.download_uri,
                    &winner.guid,
                    rule.minimum_seeders,
                    media_item_tag(target.id, quality_label, winner.category.as_deref()),
                )
                .await?;
            self.catalog.quality().record_quality(target.id, quality_id, false).await?;
            items_grabbed += 1;
        }

        self.catalog.monitoring().record_search_result(rule.id, items_found, items_grabbed).await?;
        Ok(())
    }

    /// Resolves the set of searchable media items a rule should search this
    /// run, per its `monitor_mode`.
    ///
    /// When the rule watches an organizational node (a series or season)
    /// rather than a searchable leaf, resolution walks its descendants and
    /// restricts candidates to [`MediaKind::is_searchable_leaf`] items.
    /// Unless the mode is `explicit_list` (an explicit user pick that
    /// shouldn't be second-guessed) or `future_only` (already date-gated),
    /// a rule with `backlog_search` disabled drops candidates that aired or
    /// released before the rule was created.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::MissingMediaItem`] if the rule's own
    /// `media_item_id` no longer resolves, or a catalog error if a lookup
    /// fails.
    async fn resolve_targets(&self, rule: &MonitoringRule) -> Result<Vec<MediaItem>, SchedulerError> {
        let item = self
            .catalog
            .media_items()
            .get(rule.media_item_id)
            .await?
            .ok_or(SchedulerError::MissingMediaItem(rule.media_item_id))?;

        let is_organizational_node = !item.kind().is_searchable_leaf();
        let candidates = if is_organizational_node {
            self.catalog
                .media_items()
                .descendants(rule.media_item_id)
                .await?
                .into_iter()
                .filter(|candidate| candidate.kind().is_searchable_leaf())
                .collect()
        } else {
            vec![item]
        };

        let mut targets = match rule.monitor_mode() {
            MonitorMode::All => candidates,
            MonitorMode::Missing => {
                let mut missing = Vec::new();
                for candidate in candidates {
                    if self.catalog.media_items().files(candidate.id).await?.is_empty() {
                        missing.push(candidate);
                    }
                }
                missing
            }
            MonitorMode::FutureOnly => {
                let threshold = created_at_year(&rule.created_at);
                candidates
                    .into_iter()
                    .filter(|candidate| threshold.is_none_or(|threshold| candidate.year.is_none_or(|year| year >= threshold)))
                    .collect()
            }
            MonitorMode::ExplicitList => {
                let wanted = rule.tag_media_item_ids();
                candidates.into_iter().filter(|candidate| wanted.contains(&candidate.id)).collect()
            }
        };

        // Backlog filtering only makes sense for a hierarchy with its own
        // history (a TV series' earlier seasons); a rule watching a single
        // leaf item directly (a movie, a track) has no "backlog" to skip —
        // it's the one and only thing the rule exists to search for.
        if is_organizational_node
            && !rule.backlog_search()
            && !matches!(rule.monitor_mode(), MonitorMode::FutureOnly | MonitorMode::ExplicitList)
        {
            if let Some(threshold) = created_at_year(&rule.created_at) {
                targets.retain(|candidate| candidate.year.is_none_or(|year| year >= threshold));
            }
        }

        Ok(targets)
    }
}

/// Parses the leading 4-digit year out of a SQLite `datetime('now')`-style
/// timestamp (`YYYY-MM-DD HH:MM:SS`).
fn created_at_year(created_at: &str) -> Option<i64> {
    created_at.get(0..4)?.parse().ok()
}

/// Picks the release to grab among every `Accept`/`Upgrade` decision found
/// across a target's releases, ranking by (profile index descending, size
/// preference, publish date descending).
///
/// "Profile index" is the matched quality's `sort_order` within the
/// profile, which runs worst-to-best, so a higher index is a better
/// quality. Size preference follows [`QualityProfile::prefer_larger`]: among
/// releases matched to the same quality, the configured size direction
/// wins before falling back to the newer publish date.
fn select_winner<'a>(
    candidates: Vec<(Decision, &'a Release)>,
    profile_items: &[QualityProfileItem],
    profile: &QualityProfile,
) -> Option<(Decision, &'a Release)> {
    candidates.into_iter().max_by(|(decision_a, release_a), (decision_b, release_b)| {
        profile_index(decision_a, profile_items)
            .cmp(&profile_index(decision_b, profile_items))
            .then_with(|| size_rank(release_a, profile).cmp(&size_rank(release_b, profile)))
            .then_with(|| release_a.published_at.cmp(&release_b.published_at))
    })
}

fn profile_index(decision: &Decision, profile_items: &[QualityProfileItem]) -> i64 {
    let quality_id = match decision {
        Decision::Accept { quality_id } | Decision::Upgrade { quality_id, .. } => *quality_id,
        Decision::Reject { .. } => unreachable!("reject decisions are filtered out before ranking"),
    };
    profile_items.iter().find(|item| item.quality_id == quality_id).map_or(0, |item| item.sort_order)
}

fn size_rank(release: &Release, profile: &QualityProfile) -> i64 {
    let size = release.size_bytes.unwrap_or(0);
    if profile.prefer_larger() { size } else { -size }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Release, ValueMap};
    use crate::plugin::{IndexerCapability, PluginError, SearchRequest};
    use async_trait::async_trait;

    struct StubIndexer {
        releases: Vec<Release>,
    }

    #[async_trait]
    impl crate::plugin::Indexer for StubIndexer {
        fn id(&self) -> &str {
            "indexer-stub"
        }

        fn supports(&self, capability: IndexerCapability) -> bool {
            capability == IndexerCapability::Movie
        }

        async fn search(&self, _request: &SearchRequest) -> Result<Vec<Release>, PluginError> {
            Ok(self.releases.clone())
        }
    }

    struct StubDownloader;

    #[async_trait]
    impl crate::plugin::Downloader for StubDownloader {
        fn id(&self) -> &str {
            "downloader-stub"
        }

        fn can_handle(&self, _source: &str) -> bool {
            true
        }

        async fn start(&self, _source: &str) -> Result<String, PluginError> {
            Ok("ext-1".to_string())
        }

        async fn poll(&self, _external_download_id: &str) -> Result<crate::plugin::DownloadProgress, PluginError> {
            Ok(crate::plugin::DownloadProgress { percent: 0, downloaded_bytes: 0, total_bytes: None, local_path: None })
        }

        async fn cancel(&self, _external_download_id: &str) -> Result<(), PluginError> {
            Ok(())
        }
    }

    async fn seed_movie_with_profile(catalog: &Catalog) -> (i64, i64) {
        let item_id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title, year) VALUES ('movie', 'Arrival', 'Arrival', 2016) RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let quality_id: i64 = sqlx::query_scalar(
            "INSERT INTO quality_definitions (name, weight, resolution, source) VALUES ('HD-1080p', 2, 1080, 'web') RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let profile_id: i64 = sqlx::query_scalar(
            "INSERT INTO quality_profiles (name, cutoff_quality_id) VALUES ('Standard', ?) RETURNING id",
        )
        .bind(quality_id)
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO quality_profile_items (profile_id, quality_id, sort_order) VALUES (?, ?, 0)")
            .bind(profile_id)
            .bind(quality_id)
            .execute(catalog.pool())
            .await
            .unwrap();
        (item_id, profile_id)
    }

    fn release(guid: &str, title: &str) -> Release {
        Release {
            guid: guid.to_string(),
            plugin_id: "indexer-stub".to_string(),
            title: title.to_string(),
            download_uri: "magnet:?xt=urn:btih:abc".to_string(),
            size_bytes: Some(3_000 * 1024 * 1024),
            published_at: None,
            seeders: Some(20),
            category: None,
            attributes: ValueMap::new(),
        }
    }

    #[tokio::test]
    async fn run_rule_grabs_the_first_accepted_release() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (item_id, profile_id) = seed_movie_with_profile(&catalog).await;

        let mut registry = PluginRegistry::new();
        registry.register_indexer(Arc::new(StubIndexer { releases: vec![release("guid-1", "Arrival.2016.1080p.WEB-DL")] }));
        registry.register_downloader(Arc::new(StubDownloader));
        let plugins = Arc::new(registry);
        let library = crate::config::LibraryConfig::default();
        let importer = crate::importer::Importer::new(catalog.clone(), library, crate::config::DownloadsConfig::default());
        let dispatcher = Arc::new(Dispatcher::new(catalog.clone(), Arc::clone(&plugins), importer, 4));

        let rule_id = catalog.monitoring().create(item_id, profile_id, "all", 3600).await.unwrap();
        let rule = catalog.monitoring().for_media_item(item_id).await.unwrap().unwrap();
        assert_eq!(rule.id, rule_id);

        let (scheduler, _shutdown) = Scheduler::new(catalog.clone(), plugins, dispatcher, Duration::from_secs(60));
        scheduler.run_rule(&rule).await.unwrap();

        let state = catalog.quality().state(item_id).await.unwrap();
        assert!(state.is_some(), "quality state should be recorded after a grab");
    }

    async fn seed_series_with_two_episodes(catalog: &Catalog) -> (i64, i64, i64) {
        let series_id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title, year) VALUES ('tv_series', 'Severance', 'Severance', 2022) RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let season_id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title, parent_id) VALUES ('tv_season', 'Season 1', 'Season 1', ?) RETURNING id",
        )
        .bind(series_id)
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let episode_a: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title, parent_id) VALUES ('tv_episode', 'Good News About Hell', 'Good News About Hell', ?) RETURNING id",
        )
        .bind(season_id)
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let episode_b: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title, parent_id) VALUES ('tv_episode', 'Half Loop', 'Half Loop', ?) RETURNING id",
        )
        .bind(season_id)
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        (series_id, episode_a, episode_b)
    }

    #[tokio::test]
    async fn resolve_targets_all_mode_includes_items_with_existing_files() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (series_id, episode_a, episode_b) = seed_series_with_two_episodes(&catalog).await;
        catalog.media_items().add_file(episode_a, "/tv/ep1.mkv", 100).await.unwrap();

        let library = crate::config::LibraryConfig::default();
        let importer = crate::importer::Importer::new(catalog.clone(), library, crate::config::DownloadsConfig::default());
        let plugins = Arc::new(PluginRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(catalog.clone(), Arc::clone(&plugins), importer, 4));
        let quality_id: i64 = sqlx::query_scalar("INSERT INTO quality_definitions (name, weight) VALUES ('HD', 1) RETURNING id")
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        let profile_id: i64 = sqlx::query_scalar("INSERT INTO quality_profiles (name, cutoff_quality_id) VALUES ('Standard', ?) RETURNING id")
            .bind(quality_id)
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        catalog.monitoring().create(series_id, profile_id, "all", 3600).await.unwrap();
        let rule = catalog.monitoring().for_media_item(series_id).await.unwrap().unwrap();

        let (scheduler, _shutdown) = Scheduler::new(catalog.clone(), plugins, dispatcher, Duration::from_secs(60));
        let targets = scheduler.resolve_targets(&rule).await.unwrap();

        let target_ids: Vec<i64> = targets.iter().map(|item| item.id).collect();
        assert!(target_ids.contains(&episode_a));
        assert!(target_ids.contains(&episode_b));
    }

    #[tokio::test]
    async fn resolve_targets_missing_mode_excludes_items_with_existing_files() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (series_id, episode_a, episode_b) = seed_series_with_two_episodes(&catalog).await;
        catalog.media_items().add_file(episode_a, "/tv/ep1.mkv", 100).await.unwrap();

        let library = crate::config::LibraryConfig::default();
        let importer = crate::importer::Importer::new(catalog.clone(), library, crate::config::DownloadsConfig::default());
        let plugins = Arc::new(PluginRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(catalog.clone(), Arc::clone(&plugins), importer, 4));
        let quality_id: i64 = sqlx::query_scalar("INSERT INTO quality_definitions (name, weight) VALUES ('HD', 1) RETURNING id")
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        let profile_id: i64 = sqlx::query_scalar("INSERT INTO quality_profiles (name, cutoff_quality_id) VALUES ('Standard', ?) RETURNING id")
            .bind(quality_id)
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        catalog.monitoring().create(series_id, profile_id, "missing", 3600).await.unwrap();
        let rule = catalog.monitoring().for_media_item(series_id).await.unwrap().unwrap();

        let (scheduler, _shutdown) = Scheduler::new(catalog.clone(), plugins, dispatcher, Duration::from_secs(60));
        let targets = scheduler.resolve_targets(&rule).await.unwrap();

        let target_ids: Vec<i64> = targets.iter().map(|item| item.id).collect();
        assert!(!target_ids.contains(&episode_a));
        assert!(target_ids.contains(&episode_b));
    }

    #[tokio::test]
    async fn search_on_add_runs_immediately_when_flag_is_set() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (item_id, profile_id) = seed_movie_with_profile(&catalog).await;

        let mut registry = PluginRegistry::new();
        registry.register_indexer(Arc::new(StubIndexer { releases: vec![release("guid-1", "Arrival.2016.1080p.WEB-DL")] }));
        registry.register_downloader(Arc::new(StubDownloader));
        let plugins = Arc::new(registry);
        let library = crate::config::LibraryConfig::default();
        let importer = crate::importer::Importer::new(catalog.clone(), library, crate::config::DownloadsConfig::default());
        let dispatcher = Arc::new(Dispatcher::new(catalog.clone(), Arc::clone(&plugins), importer, 4));

        catalog.monitoring().create(item_id, profile_id, "all", 3600).await.unwrap();

        let (scheduler, _shutdown) = Scheduler::new(catalog.clone(), plugins, dispatcher, Duration::from_secs(60));
        scheduler.search_on_add(item_id).await.unwrap();

        assert!(catalog.quality().state(item_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn run_rule_grabs_nothing_when_profile_rejects_every_release() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (item_id, profile_id) = seed_movie_with_profile(&catalog).await;
        sqlx::query("UPDATE quality_definitions SET min_size_mb = 500")
            .execute(catalog.pool())
            .await
            .unwrap();

        // Undersized for the profile's only allowed quality and carrying no
        // recognizable facet, so neither a direct match nor the lowest-weight
        // fallback can accept it.
        let mut oversized = release("guid-1", "Arrival.2016.CAM");
        oversized.size_bytes = Some(10 * 1024 * 1024);

        let mut registry = PluginRegistry::new();
        registry.register_indexer(Arc::new(StubIndexer { releases: vec![oversized] }));
        registry.register_downloader(Arc::new(StubDownloader));
        let plugins = Arc::new(registry);
        let library = crate::config::LibraryConfig::default();
        let importer = crate::importer::Importer::new(catalog.clone(), library, crate::config::DownloadsConfig::default());
        let dispatcher = Arc::new(Dispatcher::new(catalog.clone(), Arc::clone(&plugins), importer, 4));

        catalog.monitoring().create(item_id, profile_id, "all", 3600).await.unwrap();
        let rule = catalog.monitoring().for_media_item(item_id).await.unwrap().unwrap();

        let (scheduler, _shutdown) = Scheduler::new(catalog.clone(), plugins, dispatcher, Duration::from_secs(60));
        scheduler.run_rule(&rule).await.unwrap();

        assert!(catalog.quality().state(item_id).await.unwrap().is_none());
    }
}
