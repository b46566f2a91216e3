//! Quality policy types: definitions, profiles, and per-item quality state.

use sqlx::FromRow;

/// A single named quality level (e.g. "WEB-1080p", "Bluray-2160p-Remux").
///
/// `weight` orders definitions from worst to best; ties are broken by
/// insertion order. `resolution`, `source` and `codec_hint` are advisory
/// facets matched against a parsed release title by the quality engine.
#[derive(Debug, Clone, FromRow)]
pub struct QualityDefinition {
    /// Unique identifier.
    pub id: i64,
    /// Human-readable name, unique across the catalog.
    pub name: String,
    /// Ordering weight; higher is better.
    pub weight: i64,
    /// Vertical resolution in pixels, when this definition names one.
    pub resolution: Option<i64>,
    /// Source facet (e.g. "web", "bluray", "hdtv").
    pub source: Option<String>,
    /// Codec hint facet (e.g. "x265", "h264").
    pub codec_hint: Option<String>,
    /// Minimum plausible release size in megabytes, for sanity filtering.
    pub min_size_mb: Option<i64>,
    /// Maximum plausible release size in megabytes, for sanity filtering.
    pub max_size_mb: Option<i64>,
}

/// A named, ordered set of allowed qualities plus a cutoff and upgrade policy.
#[derive(Debug, Clone, FromRow)]
pub struct QualityProfile {
    /// Unique identifier.
    pub id: i64,
    /// Human-readable name, unique across the catalog.
    pub name: String,
    /// Quality at which the profile considers an item satisfied.
    pub cutoff_quality_id: i64,
    /// Whether grabbing a higher quality than current is permitted.
    #[sqlx(rename = "upgrade_allowed")]
    pub upgrade_allowed_flag: i64,
    /// Whether, among equally-ranked qualities, a larger file is preferred.
    #[sqlx(rename = "prefer_larger")]
    pub prefer_larger_flag: i64,
}

impl QualityProfile {
    /// Returns `true` if upgrades above the current quality are permitted.
    #[must_use]
    pub fn upgrade_allowed(&self) -> bool {
        self.upgrade_allowed_flag != 0
    }

    /// Returns `true` if, among equally-ranked candidates, the larger file wins.
    #[must_use]
    pub fn prefer_larger(&self) -> bool {
        self.prefer_larger_flag != 0
    }
}

/// One quality membership row in a [`QualityProfile`]: whether a definition
/// is allowed, and where it sorts relative to the others in the profile.
#[derive(Debug, Clone, FromRow)]
pub struct QualityProfileItem {
    /// Unique identifier.
    pub id: i64,
    /// Owning profile.
    pub profile_id: i64,
    /// Referenced quality definition.
    pub quality_id: i64,
    /// Whether this quality may be grabbed under the profile.
    #[sqlx(rename = "allowed")]
    pub allowed_flag: i64,
    /// Position within the profile's ordering, ascending from worst to best.
    pub sort_order: i64,
}

impl QualityProfileItem {
    /// Returns `true` if this quality may be grabbed under the profile.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed_flag != 0
    }
}

/// The current quality held by a media item, and whether its profile's
/// cutoff has been met.
#[derive(Debug, Clone, FromRow)]
pub struct MediaQualityState {
    /// The media item this state describes.
    pub media_item_id: i64,
    /// Quality currently held on disk, if any file has been imported.
    pub current_quality_id: Option<i64>,
    /// Whether the owning profile's cutoff quality has been reached.
    #[sqlx(rename = "cutoff_met")]
    pub cutoff_met_flag: i64,
    /// Last update timestamp.
    pub updated_at: String,
}

impl MediaQualityState {
    /// Returns `true` if the cutoff has been met and no further upgrades
    /// should be searched for.
    #[must_use]
    pub fn cutoff_met(&self) -> bool {
        self.cutoff_met_flag != 0
    }
}
