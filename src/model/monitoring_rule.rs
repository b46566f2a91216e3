//! `MonitoringRule`: per-item monitoring policy driving the scheduler.

use std::fmt;

use sqlx::FromRow;

/// Which members of a hierarchy a monitoring rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// Every item in the hierarchy, past and future.
    All,
    /// Only items that air/release after the rule was created.
    FutureOnly,
    /// Only items not yet satisfied by an imported file.
    Missing,
    /// Only items explicitly listed elsewhere (season/episode picks).
    ExplicitList,
}

impl MonitorMode {
    /// Returns the catalog string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::FutureOnly => "future_only",
            Self::Missing => "missing",
            Self::ExplicitList => "explicit_list",
        }
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MonitorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "future_only" => Ok(Self::FutureOnly),
            "missing" => Ok(Self::Missing),
            "explicit_list" => Ok(Self::ExplicitList),
            _ => Err(format!("invalid monitor mode: {s}")),
        }
    }
}

/// Monitoring policy attached to a single media item.
///
/// Drives the scheduler's monitored-search job: `next_search_at` is the
/// due-time the scheduler polls against, and the counters track search
/// history for observability.
#[derive(Debug, Clone, FromRow)]
pub struct MonitoringRule {
    /// Unique identifier.
    pub id: i64,
    /// The media item this rule watches.
    pub media_item_id: i64,
    /// Whether searches are currently enabled for this rule.
    #[sqlx(rename = "enabled")]
    pub enabled_flag: i64,
    /// Quality profile governing acceptable releases.
    pub profile_id: i64,
    /// Monitoring mode (stored as text, parsed via [`Self::monitor_mode`]).
    #[sqlx(rename = "monitor_mode")]
    pub monitor_mode_str: String,
    /// Whether a search should fire immediately on rule creation.
    #[sqlx(rename = "search_on_add")]
    pub search_on_add_flag: i64,
    /// Whether the scheduler should search this rule automatically.
    #[sqlx(rename = "automatic_search")]
    pub automatic_search_flag: i64,
    /// Whether backlog (past, already-aired) items should be searched.
    #[sqlx(rename = "backlog_search")]
    pub backlog_search_flag: i64,
    /// Whether a season pack should be preferred over individual episodes.
    #[sqlx(rename = "prefer_season_packs")]
    pub prefer_season_packs_flag: i64,
    /// Minimum seeders required to consider a release, 0 to disable.
    pub minimum_seeders: i64,
    /// Tag bag, stored as a JSON array of strings.
    pub tags: String,
    /// Base interval between automatic searches, in seconds.
    pub search_interval_secs: i64,
    /// Total number of searches performed.
    pub search_count: i64,
    /// Total number of releases found across all searches.
    pub items_found: i64,
    /// Total number of releases grabbed as a result of this rule.
    pub items_grabbed: i64,
    /// Timestamp of the last search, if any has run.
    pub last_search_at: Option<String>,
    /// Timestamp at which the next automatic search is due.
    pub next_search_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

impl MonitoringRule {
    /// Returns the parsed [`MonitorMode`].
    ///
    /// # Panics
    ///
    /// Panics if the stored mode string is not recognized; this can only
    /// happen if the catalog's `CHECK` constraint was bypassed.
    #[must_use]
    pub fn monitor_mode(&self) -> MonitorMode {
        self.monitor_mode_str
            .parse()
            .unwrap_or_else(|_| unreachable!("catalog CHECK constraint guarantees a valid mode"))
    }

    /// Returns `true` if the rule is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled_flag != 0
    }

    /// Returns `true` if automatic scheduler-driven searches are on.
    #[must_use]
    pub fn automatic_search(&self) -> bool {
        self.automatic_search_flag != 0
    }

    /// Returns `true` if season packs should be preferred over episodes.
    #[must_use]
    pub fn prefer_season_packs(&self) -> bool {
        self.prefer_season_packs_flag != 0
    }

    /// Returns `true` if the rule is both enabled and eligible for
    /// scheduler-driven automatic searching.
    #[must_use]
    pub fn is_due_for_automatic_search(&self) -> bool {
        self.is_enabled() && self.automatic_search()
    }

    /// Returns `true` if a search should fire immediately on rule creation.
    #[must_use]
    pub fn search_on_add(&self) -> bool {
        self.search_on_add_flag != 0
    }

    /// Returns `true` if backlog (already-aired/released) items should be
    /// included when resolving search targets.
    #[must_use]
    pub fn backlog_search(&self) -> bool {
        self.backlog_search_flag != 0
    }

    /// Parses `tags` as the explicit-list media item ids this rule watches,
    /// stored as a JSON array of string ids (e.g. `["12", "13"]`).
    ///
    /// Only meaningful under [`MonitorMode::ExplicitList`]; any tag entry
    /// that doesn't parse as an id is silently skipped.
    #[must_use]
    pub fn tag_media_item_ids(&self) -> Vec<i64> {
        serde_json::from_str::<Vec<String>>(&self.tags)
            .unwrap_or_default()
            .iter()
            .filter_map(|tag| tag.parse().ok())
            .collect()
    }
}
