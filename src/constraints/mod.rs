//! Constraint checkers.
//!
//! Pure predicates that prune candidate words: MPR feature requirements,
//! stem-name regions, allomorph/morpheme co-occurrence and allomorph
//! environments. None of them mutate their inputs.

mod cooccurrence;
mod environment;
mod mpr;
mod stem_name;

pub use cooccurrence::{check_co_occurrences, CoOccurrenceAdjacency, CoOccurrenceRule, ConstraintType};
pub use environment::{check_environments, AllomorphEnvironment};
pub use mpr::{
    MprFeature, MprFeatureGroup, MprFeatureGroupMatchType, MprFeatureGroupOutput, MprFeatureSet,
};
pub use stem_name::StemName;
