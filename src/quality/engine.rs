//! Quality decision engine: maps a parsed release onto a profile's allowed
//! qualities and decides whether to accept, reject, or upgrade.

use tracing::{debug, instrument};

use crate::model::{MediaQualityState, QualityDefinition, QualityProfile, QualityProfileItem, Release};

use super::facets::{parse_facets, ReleaseFacets};
use super::QualityError;

/// The quality engine's verdict for a single release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The release should be grabbed; the media item has no quality yet.
    Accept {
        /// Matched quality definition id.
        quality_id: i64,
    },
    /// The release should be grabbed as an upgrade over the current quality.
    Upgrade {
        /// Matched quality definition id.
        quality_id: i64,
        /// Quality currently held, being replaced.
        previous_quality_id: i64,
    },
    /// The release should not be grabbed.
    Reject {
        /// Human-readable reason, for logging/UI.
        reason: String,
    },
}

/// Matches a release's parsed facets against a profile's allowed quality
/// definitions, returning the best-matching definition's id.
///
/// Matching prefers the definition with the most matching facets
/// (resolution, source, codec); ties break toward the higher-weighted
/// (better) definition.
#[must_use]
fn match_quality<'a>(
    facets: &ReleaseFacets,
    definitions: &'a [QualityDefinition],
    allowed_ids: &[i64],
) -> Option<&'a QualityDefinition> {
    definitions
        .iter()
        .filter(|def| allowed_ids.contains(&def.id))
        .map(|def| (facet_match_score(facets, def), def))
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, def)| (*score, def.weight))
        .map(|(_, def)| def)
}

/// Counts how many of a definition's declared facets match the release's
/// parsed facets.
fn facet_match_score(facets: &ReleaseFacets, def: &QualityDefinition) -> i64 {
    let mut score = 0;
    if let Some(resolution) = def.resolution {
        if facets.resolution == Some(resolution) {
            score += 1;
        }
    }
    if let Some(source) = &def.source {
        if facets.source.as_deref() == Some(source.as_str()) {
            score += 1;
        }
    }
    if let Some(codec) = &def.codec_hint {
        if facets.codec.as_deref() == Some(codec.as_str()) {
            score += 1;
        }
    }
    score
}

/// Returns `true` if the release's size falls within a definition's
/// plausible bounds, when the definition declares any.
fn passes_size_sanity(size_mb: Option<i64>, def: &QualityDefinition) -> bool {
    let Some(size_mb) = size_mb else { return true };
    if let Some(min) = def.min_size_mb {
        if size_mb < min {
            return false;
        }
    }
    if let Some(max) = def.max_size_mb {
        if size_mb > max {
            return false;
        }
    }
    true
}

/// Returns the lowest-weight allowed definition whose size bounds the
/// release still fits, used when the release's title carries no facet that
/// overlaps any allowed definition at all.
///
/// A title with no recognizable resolution/source/codec token (a CAM rip, a
/// foreign release using unfamiliar naming) isn't evidence the release is
/// bad quality, just that it's unclassified; parking it on the worst
/// allowed quality lets the profile still grab it rather than dropping it
/// on the floor.
fn fallback_quality<'a>(
    size_mb: Option<i64>,
    definitions: &'a [QualityDefinition],
    allowed_ids: &[i64],
) -> Option<&'a QualityDefinition> {
    definitions
        .iter()
        .filter(|def| allowed_ids.contains(&def.id))
        .filter(|def| passes_size_sanity(size_mb, def))
        .min_by_key(|def| def.weight)
}

/// Evaluates `release` against `profile`, returning an accept/upgrade/reject
/// [`Decision`].
///
/// # Errors
///
/// Returns [`QualityError::EmptyProfile`] if `profile_items` is empty.
#[instrument(skip(release, profile, profile_items, definitions, current_state), fields(release = %release.title))]
pub fn evaluate(
    release: &Release,
    profile: &QualityProfile,
    profile_items: &[QualityProfileItem],
    definitions: &[QualityDefinition],
    current_state: Option<&MediaQualityState>,
) -> Result<Decision, QualityError> {
    if profile_items.is_empty() {
        return Err(QualityError::EmptyProfile(profile.id));
    }

    if let Some(state) = current_state {
        if state.cutoff_met() {
            return Ok(Decision::Reject {
                reason: "cutoff already met; upgrades suppressed".to_string(),
            });
        }
    }

    let allowed_ids: Vec<i64> = profile_items.iter().filter(|item| item.is_allowed()).map(|item| item.quality_id).collect();
    if allowed_ids.is_empty() {
        return Err(QualityError::EmptyProfile(profile.id));
    }

    let facets = parse_facets(&release.title);
    let size_mb = release.size_bytes.map(|bytes| bytes / (1024 * 1024));
    let matched = match match_quality(&facets, definitions, &allowed_ids) {
        Some(matched) => matched,
        None => match fallback_quality(size_mb, definitions, &allowed_ids) {
            Some(fallback) => {
                debug!(quality = %fallback.name, "falling back to lowest-weight compatible quality");
                fallback
            }
            None => {
                return Ok(Decision::Reject {
                    reason: "release title matched no allowed quality and no compatible fallback exists".to_string(),
                });
            }
        },
    };

    if !passes_size_sanity(size_mb, matched) {
        return Ok(Decision::Reject {
            reason: format!("release size outside plausible bounds for {}", matched.name),
        });
    }

    let Some(current_quality_id) = current_state.and_then(|state| state.current_quality_id) else {
        debug!(quality = %matched.name, "accepting first grab");
        return Ok(Decision::Accept { quality_id: matched.id });
    };

    if current_quality_id == matched.id {
        return Ok(Decision::Reject {
            reason: "release matches the quality already held".to_string(),
        });
    }

    let current_weight = definitions.iter().find(|def| def.id == current_quality_id).map_or(i64::MIN, |def| def.weight);
    if matched.weight <= current_weight {
        return Ok(Decision::Reject {
            reason: "release quality is not higher than the quality already held".to_string(),
        });
    }

    if !profile.upgrade_allowed() {
        return Ok(Decision::Reject {
            reason: "profile does not permit upgrades".to_string(),
        });
    }

    debug!(quality = %matched.name, previous = current_quality_id, "accepting upgrade");
    Ok(Decision::Upgrade { quality_id: matched.id, previous_quality_id: current_quality_id })
}
