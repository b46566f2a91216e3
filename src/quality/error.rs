//! Errors raised while evaluating a release against quality policy.

use thiserror::Error;

/// Errors the quality engine can fail with.
#[derive(Error, Debug)]
pub enum QualityError {
    /// The release's title matched no quality definition in the profile.
    #[error("release title matched no known quality definition: {0}")]
    UnrecognizedQuality(String),

    /// The referenced profile has no membership rows.
    #[error("quality profile {0} has no allowed qualities configured")]
    EmptyProfile(i64),
}
