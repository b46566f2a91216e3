//! Quality facet parsing and the accept/upgrade/reject decision engine.

mod engine;
mod error;
mod facets;

pub use engine::{evaluate, Decision};
pub use error::QualityError;
pub use facets::{parse_facets, ReleaseFacets};
